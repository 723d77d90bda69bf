use crate::{
    env::EnvManager,
    error::CliError,
    output::TaskListing,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use commands::Commands;
use connectors::factory::DataSourceFactory;
use engine_runtime::{service::MigrationService, settings::EngineSettings};
use model::{
    core::identifiers::TaskId,
    datasource::config::DataSourceConfig,
    migration::task::{MigrationRequest, TaskStatus},
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "datamigrate",
    version = "0.1.0",
    about = "Batch table migration between databases"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Load ${VAR} values for request and config files from this .env file"
    )]
    env_file: Option<String>,

    #[arg(
        long,
        global = true,
        help = "Task store directory (defaults to ~/.datamigrate/state)"
    )]
    state_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let mut env = EnvManager::new();
    if let Some(path) = &cli.env_file {
        env.load_from_file(path)?;
    }

    let service = open_service(cli.state_dir.as_deref()).await?;

    match cli.command {
        Commands::Run { request, interval } => {
            let request: MigrationRequest = env.read_json(&request)?;
            let id = service.create_task(request).await?;
            println!("Created task {id}");
            service.start_task(&id).await?;
            watch(&service, &id, interval).await
        }
        Commands::Create { request } => {
            let request: MigrationRequest = env.read_json(&request)?;
            let id = service.create_task(request).await?;
            println!("{id}");
            Ok(ExitCode::Success)
        }
        Commands::Start { task } => {
            let id = TaskId::new(task);
            service.start_task(&id).await?;
            watch(&service, &id, 2).await
        }
        Commands::Cancel { task } => {
            let id = TaskId::new(task);
            service.cancel_task(&id).await?;
            println!("Cancelled task {id}");
            Ok(ExitCode::Success)
        }
        Commands::Tasks { json } => {
            let tasks = service.list_tasks().await?;
            if json {
                let listing: Vec<TaskListing> = tasks.iter().map(TaskListing::from).collect();
                output::print_json(&listing)?;
            } else {
                output::print_tasks(&tasks);
            }
            Ok(ExitCode::Success)
        }
        Commands::Progress { task, json } => {
            let progress = service.get_progress(&TaskId::new(task)).await?;
            if json {
                output::print_json(&progress)?;
            } else {
                output::print_progress(&progress);
            }
            Ok(ExitCode::Success)
        }
        Commands::TestConn { config } => {
            let config: DataSourceConfig = env.read_json(&config)?;
            service.test_connection(&config).await?;
            println!("Connection OK");
            Ok(ExitCode::Success)
        }
        Commands::Databases { config } => {
            let config: DataSourceConfig = env.read_json(&config)?;
            for db in service.list_databases(&config).await? {
                println!("{db}");
            }
            Ok(ExitCode::Success)
        }
        Commands::Tables { config, database } => {
            let config: DataSourceConfig = env.read_json(&config)?;
            for table in service.list_tables(&config, &database).await? {
                println!("{table}");
            }
            Ok(ExitCode::Success)
        }
        Commands::Compare {
            source,
            target,
            database,
            tables,
            output,
        } => {
            let source: DataSourceConfig = env.read_json(&source)?;
            let target: DataSourceConfig = env.read_json(&target)?;
            let report = service
                .compare(&source, &target, &database, &tables)
                .await?;

            match output {
                Some(path) => output::write_json(&report, &path).await?,
                None => output::print_compare(&report),
            }
            Ok(ExitCode::Success)
        }
    }
}

async fn open_service(state_dir: Option<&str>) -> Result<MigrationService, CliError> {
    let settings = match state_dir {
        Some(dir) => EngineSettings::with_state_dir(dir),
        None => EngineSettings::from_home()?,
    };
    info!(state_dir = %settings.state_dir.display(), "Opening task store");
    Ok(MigrationService::open(settings, DataSourceFactory::with_defaults()).await?)
}

/// Prints progress until the task's execution unit exits. A signal cancels
/// the task; the loop still waits for the unit to stop at a batch boundary.
async fn watch(
    service: &MigrationService,
    id: &TaskId,
    interval_secs: u64,
) -> Result<ExitCode, CliError> {
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();
    let signalled = shutdown.cancel_token();

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    let wait = service.wait(id);
    tokio::pin!(wait);
    let mut cancel_sent = false;

    let finished = loop {
        tokio::select! {
            res = &mut wait => break res?,
            _ = signalled.cancelled(), if !cancel_sent => {
                cancel_sent = true;
                if let Err(e) = service.cancel_task(id).await {
                    warn!(task_id = %id, error = %e, "Cancel request rejected");
                }
            }
            _ = ticker.tick() => {
                let progress = service.get_progress(id).await?;
                println!("{}", output::progress_line(&progress));
            }
        }
    };

    output::print_progress(&finished);

    Ok(match finished.status {
        TaskStatus::Completed => ExitCode::Success,
        TaskStatus::Cancelled if shutdown.is_shutdown_requested() => ExitCode::ShutdownRequested,
        _ => ExitCode::GeneralError,
    })
}
