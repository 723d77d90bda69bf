/// MySQL caps prepared statements at 65535 placeholders.
pub const MAX_PLACEHOLDERS: usize = 65_535;

pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

pub fn qualified(database: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(database), quote_ident(table))
}

pub fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "''")
}

/// `SELECT *` page with `LIMIT ? OFFSET ?` placeholders. The filter is a raw
/// predicate. No ORDER BY is applied.
pub fn select_page(database: &str, table: &str, filter: Option<&str>) -> String {
    let mut sql = format!("SELECT * FROM {}", qualified(database, table));
    if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    sql.push_str(" LIMIT ? OFFSET ?");
    sql
}

pub fn count_rows(database: &str, table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", qualified(database, table))
}

pub fn insert_values(database: &str, table: &str, columns: &[String], row_count: usize) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![tuple.as_str(); row_count].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualified(database, table),
        cols,
        values
    )
}

/// Rows per INSERT so that `rows * columns` stays under the placeholder cap,
/// further bounded by the caller's batch size when one is given.
pub fn rows_per_statement(column_count: usize, batch_size: usize) -> usize {
    let cap = MAX_PLACEHOLDERS / column_count.max(1);
    let wanted = if batch_size == 0 { cap } else { batch_size };
    wanted.min(cap).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_backticks_in_identifiers() {
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
        assert_eq!(qualified("shop", "orders"), "`shop`.`orders`");
    }

    #[test]
    fn select_page_appends_filter_and_limit() {
        assert_eq!(
            select_page("shop", "orders", Some("id > 10")),
            "SELECT * FROM `shop`.`orders` WHERE id > 10 LIMIT ? OFFSET ?"
        );
        assert_eq!(
            select_page("shop", "orders", Some("  ")),
            "SELECT * FROM `shop`.`orders` LIMIT ? OFFSET ?"
        );
    }

    #[test]
    fn insert_has_one_tuple_per_row() {
        let sql = insert_values("shop", "orders", &["id".into(), "total".into()], 2);
        assert_eq!(
            sql,
            "INSERT INTO `shop`.`orders` (`id`, `total`) VALUES (?, ?), (?, ?)"
        );
    }

    #[test]
    fn statement_size_respects_placeholder_cap() {
        assert_eq!(rows_per_statement(10, 0), 6553);
        assert_eq!(rows_per_statement(10, 1000), 1000);
        assert_eq!(rows_per_statement(100_000, 1000), 1);
    }
}
