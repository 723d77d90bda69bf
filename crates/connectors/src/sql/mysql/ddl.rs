use crate::{
    error::DbError,
    sql::mysql::query::{escape_literal, qualified, quote_ident},
};
use model::datasource::schema::{ColumnInfo, TableSchema};

/// Renders a `CREATE TABLE` for `database` from an introspected schema.
pub fn build_create_table(database: &str, schema: &TableSchema) -> Result<String, DbError> {
    if schema.columns.is_empty() {
        return Err(DbError::InvalidSchema(format!(
            "table '{}' has no columns",
            schema.name
        )));
    }

    let mut defs: Vec<String> = schema.columns.iter().map(column_definition).collect();

    let pks = schema.primary_keys();
    if !pks.is_empty() {
        let keys = pks.iter().map(|k| quote_ident(k)).collect::<Vec<_>>().join(", ");
        defs.push(format!("PRIMARY KEY ({keys})"));
    }

    let mut sql = format!(
        "CREATE TABLE {} (\n  {}\n)",
        qualified(database, &schema.name),
        defs.join(",\n  ")
    );
    if !schema.comment.is_empty() {
        sql.push_str(&format!(" COMMENT='{}'", escape_literal(&schema.comment)));
    }
    Ok(sql)
}

fn column_definition(col: &ColumnInfo) -> String {
    let mut def = format!("{} {}", quote_ident(&col.name), col.data_type);
    if !col.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &col.default {
        def.push_str(" DEFAULT ");
        def.push_str(&render_default(default));
    }
    if !col.comment.is_empty() {
        def.push_str(&format!(" COMMENT '{}'", escape_literal(&col.comment)));
    }
    def
}

/// information_schema reports defaults unquoted; literals need quoting back,
/// while NULL, numbers and temporal functions must stay bare.
fn render_default(value: &str) -> String {
    let upper = value.trim().to_ascii_uppercase();
    let is_keyword = upper == "NULL"
        || upper.starts_with("CURRENT_TIMESTAMP")
        || upper.starts_with("NOW(")
        || upper.starts_with("LOCALTIMESTAMP");
    let is_expression = value.starts_with('(') && value.ends_with(')');
    if is_keyword || is_expression || value.parse::<f64>().is_ok() {
        value.to_string()
    } else {
        format!("'{}'", escape_literal(value))
    }
}

/// Re-targets exported `SHOW CREATE TABLE` output at `database`.
pub fn qualify_create_table(ddl: &str, table: &str, database: &str) -> Result<String, DbError> {
    let bare = format!("CREATE TABLE {}", quote_ident(table));
    if !ddl.contains(&bare) {
        return Err(DbError::InvalidSchema(format!(
            "unexpected DDL for table '{table}'"
        )));
    }
    Ok(ddl.replacen(
        &bare,
        &format!("CREATE TABLE {}", qualified(database, table)),
        1,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> TableSchema {
        let mut schema = TableSchema::new(
            "orders",
            vec![
                ColumnInfo::new("id", "bigint unsigned").primary_key(),
                ColumnInfo {
                    default: Some("new".into()),
                    comment: "order state".into(),
                    ..ColumnInfo::new("status", "varchar(16)").not_null()
                },
                ColumnInfo {
                    default: Some("CURRENT_TIMESTAMP".into()),
                    ..ColumnInfo::new("created_at", "datetime")
                },
            ],
        );
        schema.comment = "customer's orders".into();
        schema
    }

    #[test]
    fn renders_columns_keys_and_comments() {
        let sql = build_create_table("shop", &orders()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE `shop`.`orders` (\n  \
             `id` bigint unsigned NOT NULL,\n  \
             `status` varchar(16) NOT NULL DEFAULT 'new' COMMENT 'order state',\n  \
             `created_at` datetime DEFAULT CURRENT_TIMESTAMP,\n  \
             PRIMARY KEY (`id`)\n) COMMENT='customer''s orders'"
        );
    }

    #[test]
    fn rejects_schema_without_columns() {
        let err = build_create_table("shop", &TableSchema::new("empty", vec![])).unwrap_err();
        assert!(matches!(err, DbError::InvalidSchema(_)));
    }

    #[test]
    fn numeric_defaults_stay_bare() {
        assert_eq!(render_default("0"), "0");
        assert_eq!(render_default("1.50"), "1.50");
        assert_eq!(render_default("NULL"), "NULL");
        assert_eq!(render_default("it's"), "'it''s'");
    }

    #[test]
    fn qualifies_exported_ddl_once() {
        let ddl = "CREATE TABLE `orders` (\n  `id` int NOT NULL\n) ENGINE=InnoDB";
        let out = qualify_create_table(ddl, "orders", "archive").unwrap();
        assert!(out.starts_with("CREATE TABLE `archive`.`orders` ("));
        assert!(qualify_create_table("CREATE VIEW v AS SELECT 1", "orders", "x").is_err());
    }
}
