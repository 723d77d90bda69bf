// Runs against a live server: `cargo test -p engine-tests -- --ignored`.
// Expects user `user` / password `password` on localhost:3306 with rights to
// create databases.
#[cfg(test)]
mod tests {
    use crate::utils::{order_rows, orders_schema};
    use connectors::{datasource::DataSource, sql::mysql::adapter::MySqlDataSource};
    use model::{
        core::value::Value,
        datasource::{
            config::{DataSourceConfig, DataSourceType},
            options::{ReadOptions, WriteOptions},
        },
        records::row::Row,
    };
    use tracing_test::traced_test;

    const DATABASE: &str = "datamigrate_live";

    async fn connect() -> MySqlDataSource {
        let config = DataSourceConfig::new(DataSourceType::MySql, "localhost", 3306)
            .with_credentials("user", "password");
        let ds = MySqlDataSource::new();
        ds.connect(&config).await.expect("connect to local MySQL");
        ds.create_database_if_not_exists(DATABASE)
            .await
            .expect("create test database");
        ds
    }

    /// Fresh, empty orders table in the test database.
    async fn fresh_table(ds: &MySqlDataSource, table: &str) {
        ds.drop_table(DATABASE, table).await.unwrap();
        ds.create_table(DATABASE, &orders_schema(table)).await.unwrap();
    }

    // Scenario: batch_size 2 splits the page into two INSERTs and the second
    // hits a duplicate primary key.
    // Expected: the first INSERT is rolled back with it.
    #[traced_test]
    #[tokio::test]
    #[ignore = "requires a local MySQL server"]
    async fn failed_page_leaves_no_rows() {
        let ds = connect().await;
        fresh_table(&ds, "rollback_orders").await;

        let mut rows = order_rows(3);
        rows.push(
            Row::new()
                .with("id", 1i64)
                .with("customer", "duplicate")
                .with("amount", 0.0),
        );
        let opts = WriteOptions {
            batch_size: 2,
            truncate: false,
        };

        assert!(
            ds.write_rows(DATABASE, "rollback_orders", &rows, &opts)
                .await
                .is_err()
        );
        assert_eq!(ds.row_count(DATABASE, "rollback_orders").await.unwrap(), 0);

        // The same page minus the duplicate goes through on retry.
        rows.pop();
        ds.write_rows(DATABASE, "rollback_orders", &rows, &opts)
            .await
            .unwrap();
        assert_eq!(ds.row_count(DATABASE, "rollback_orders").await.unwrap(), 3);
        ds.close().await.unwrap();
    }

    #[traced_test]
    #[tokio::test]
    #[ignore = "requires a local MySQL server"]
    async fn write_maps_columns_by_name() {
        let ds = connect().await;
        fresh_table(&ds, "mapped_orders").await;

        // `note` is unknown to the target; `amount` is missing from both rows.
        let rows = vec![
            Row::new()
                .with("customer", "ada")
                .with("note", "dropped")
                .with("id", 1i64),
            Row::new().with("id", 2i64).with("customer", "grace"),
        ];
        ds.write_rows(DATABASE, "mapped_orders", &rows, &WriteOptions::default())
            .await
            .unwrap();

        let mut read = ds
            .read_rows(DATABASE, "mapped_orders", &ReadOptions::page(0, 10))
            .await
            .unwrap();
        read.sort_by_key(|row| row.get("customer").and_then(Value::as_string));
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].get("customer"), Some(&Value::from("ada")));
        assert_eq!(read[0].get("amount"), Some(&Value::Null));
        assert!(read[0].get("note").is_none());
        assert_eq!(read[1].get("customer"), Some(&Value::from("grace")));
        assert_eq!(read[1].get("amount"), Some(&Value::Null));

        // No row column matches the target at all.
        let stray = vec![Row::new().with("note", "x")];
        assert!(
            ds.write_rows(DATABASE, "mapped_orders", &stray, &WriteOptions::default())
                .await
                .is_err()
        );
        ds.close().await.unwrap();
    }

    #[traced_test]
    #[tokio::test]
    #[ignore = "requires a local MySQL server"]
    async fn native_ddl_copies_into_another_database() {
        let ds = connect().await;
        fresh_table(&ds, "ddl_orders").await;
        let copy_db = format!("{DATABASE}_copy");
        ds.create_database_if_not_exists(&copy_db).await.unwrap();
        ds.drop_table(&copy_db, "ddl_orders").await.unwrap();

        let ddl = ds.show_create_table(DATABASE, "ddl_orders").await.unwrap();
        assert!(ddl.starts_with("CREATE TABLE `ddl_orders`"));
        ds.execute_ddl(&copy_db, "ddl_orders", &ddl).await.unwrap();

        let copied = ds
            .table_schema(&copy_db, "ddl_orders")
            .await
            .unwrap()
            .expect("copied table exists");
        assert_eq!(copied.column_names(), vec!["id", "customer", "amount"]);
        assert!(logs_contain("Created table from native DDL"));
        ds.close().await.unwrap();
    }
}
