use connectors::error::DbError;
use engine_core::retry::RetryDisposition;
use mysql_async::{DriverError, Error as MySqlError};

/// Decides whether a failed write is worth a reconnect and another attempt.
/// Only connection-level failures qualify; statement errors are final.
pub fn classify_db_error(err: &DbError) -> RetryDisposition {
    match err {
        DbError::MySql(mysql_err) => classify_mysql_error(mysql_err),
        DbError::Connection(_) | DbError::NotConnected => RetryDisposition::Retry,
        DbError::Query(msg) if looks_like_dropped_connection(msg) => RetryDisposition::Retry,
        DbError::Query(_)
        | DbError::UnknownDatabase(_)
        | DbError::InvalidSchema(_)
        | DbError::Unsupported(_) => RetryDisposition::Stop,
    }
}

fn classify_mysql_error(err: &MySqlError) -> RetryDisposition {
    match err {
        MySqlError::Io(_) | MySqlError::Other(_) => RetryDisposition::Retry,
        MySqlError::Driver(driver_err) => classify_driver_error(driver_err),
        MySqlError::Server(server_err) => {
            if is_retryable_mysql_server_error(server_err.code, server_err.state.as_str()) {
                RetryDisposition::Retry
            } else {
                RetryDisposition::Stop
            }
        }
        _ => RetryDisposition::Stop,
    }
}

/// Driver errors that mean the connection itself is gone. Parameter and
/// packet-size errors come from the statement and would fail again.
fn classify_driver_error(err: &DriverError) -> RetryDisposition {
    match err {
        DriverError::ConnectionClosed
        | DriverError::PoolDisconnected
        | DriverError::PacketOutOfOrder => RetryDisposition::Retry,
        _ => RetryDisposition::Stop,
    }
}

fn is_retryable_mysql_server_error(code: u16, state: &str) -> bool {
    // Lock wait timeout, deadlock, lost/refused connections, too many connections.
    // See: https://dev.mysql.com/doc/mysql-errors/8.0/en/server-error-reference.html
    const RETRYABLE_CODES: [u16; 8] = [1205, 1213, 2002, 2003, 2006, 2013, 1040, 1042];
    if RETRYABLE_CODES.contains(&code) {
        return true;
    }

    matches!(state, "40001" | "HYT00" | "08S01")
}

fn looks_like_dropped_connection(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    ["broken pipe", "invalid connection", "connection reset", "bad connection"]
        .iter()
        .any(|needle| msg.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failures_are_retried() {
        assert_eq!(
            classify_db_error(&DbError::Connection("timeout".into())),
            RetryDisposition::Retry
        );
        assert_eq!(
            classify_db_error(&DbError::NotConnected),
            RetryDisposition::Retry
        );
        assert_eq!(
            classify_db_error(&DbError::Query("write: Broken pipe".into())),
            RetryDisposition::Retry
        );
    }

    #[test]
    fn statement_failures_stop() {
        assert_eq!(
            classify_db_error(&DbError::Query("Duplicate entry '1' for key 'PRIMARY'".into())),
            RetryDisposition::Stop
        );
        assert_eq!(
            classify_db_error(&DbError::InvalidSchema("no columns".into())),
            RetryDisposition::Stop
        );
        assert_eq!(
            classify_db_error(&DbError::UnknownDatabase("shop".into())),
            RetryDisposition::Stop
        );
    }

    #[test]
    fn driver_errors_retry_only_on_lost_connections() {
        let driver = |e: DriverError| classify_db_error(&DbError::MySql(MySqlError::Driver(e)));

        assert_eq!(driver(DriverError::ConnectionClosed), RetryDisposition::Retry);
        assert_eq!(driver(DriverError::PoolDisconnected), RetryDisposition::Retry);

        assert_eq!(driver(DriverError::MixedParams), RetryDisposition::Stop);
        assert_eq!(driver(DriverError::PacketTooLarge), RetryDisposition::Stop);
        assert_eq!(
            driver(DriverError::StmtParamsMismatch {
                required: 3,
                supplied: 2
            }),
            RetryDisposition::Stop
        );
    }

    #[test]
    fn mysql_server_codes() {
        assert!(is_retryable_mysql_server_error(1213, "40001"));
        assert!(is_retryable_mysql_server_error(2006, "HY000"));
        assert!(is_retryable_mysql_server_error(9999, "08S01"));
        assert!(!is_retryable_mysql_server_error(1062, "23000"));
    }
}
