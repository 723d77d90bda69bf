use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Create a task from a request file, run it and wait for the outcome
    Run {
        #[arg(long, help = "Migration request file (JSON)")]
        request: String,

        #[arg(
            long,
            default_value_t = 2,
            help = "Seconds between progress lines while the task runs"
        )]
        interval: u64,
    },
    /// Create a pending task and print its id
    Create {
        #[arg(long, help = "Migration request file (JSON)")]
        request: String,
    },
    /// Start a pending task and wait for it to finish
    Start {
        #[arg(long, help = "Task ID")]
        task: String,
    },
    /// Cancel a pending task
    Cancel {
        #[arg(long, help = "Task ID")]
        task: String,
    },
    /// List every known task, newest first
    Tasks {
        #[arg(long, help = "Print the list as JSON instead of a table")]
        json: bool,
    },
    Progress {
        #[arg(long, help = "Task ID to inspect")]
        task: String,

        #[arg(
            long,
            help = "If set, prints the progress information as JSON instead of a table"
        )]
        json: bool,
    },
    /// Open a connection and ping it
    TestConn {
        #[arg(long, help = "Data source config file (JSON)")]
        config: String,
    },
    Databases {
        #[arg(long, help = "Data source config file (JSON)")]
        config: String,
    },
    Tables {
        #[arg(long, help = "Data source config file (JSON)")]
        config: String,

        #[arg(long, help = "Database to list")]
        database: String,
    },
    /// Compare table presence and row counts between two endpoints
    Compare {
        #[arg(long, help = "Source config file (JSON)")]
        source: String,

        #[arg(long, help = "Target config file (JSON)")]
        target: String,

        #[arg(long)]
        database: String,

        #[arg(
            long,
            value_delimiter = ',',
            help = "Comma-separated tables; all source tables when omitted"
        )]
        tables: Vec<String>,

        #[arg(
            long,
            help = "If specified, writes the JSON report to this file instead of stdout"
        )]
        output: Option<String>,
    },
}
