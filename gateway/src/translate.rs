//! Driver error translation.
//!
//! Classifies `sqlx` failures by the driver's error family (SQLSTATE for
//! PostgreSQL, server error numbers for MySQL, primary result codes for
//! SQLite, transport variants for everything) and maps them onto the
//! gateway taxonomy. The driver message is preserved as the detail string.

use common::errors::AppError;
use sqlx::error::DatabaseError;
use sqlx::mysql::MySqlDatabaseError;
use sqlx::postgres::PgDatabaseError;
use sqlx::sqlite::SqliteError;

/// Coarse failure family of a driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFamily {
    Auth,
    Unreachable,
    BadRequest,
    Execution,
}

/// Translates a driver error into an [`AppError`].
pub fn translate(err: sqlx::Error) -> AppError {
    let family = classify(&err);
    let message = err.to_string();
    match family {
        ErrorFamily::Auth => AppError::DialectAuthFailed(message),
        ErrorFamily::Unreachable => AppError::DialectUnreachable(message),
        ErrorFamily::BadRequest => AppError::DialectBadRequest(message),
        ErrorFamily::Execution => AppError::ExecutionFailed(message),
    }
}

/// Determines the failure family of a driver error.
pub fn classify(err: &sqlx::Error) -> ErrorFamily {
    match err {
        sqlx::Error::Database(db) => classify_database(db.as_ref()),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => ErrorFamily::Unreachable,
        sqlx::Error::Configuration(_) => ErrorFamily::BadRequest,
        _ => ErrorFamily::Execution,
    }
}

fn classify_database(db: &(dyn DatabaseError + 'static)) -> ErrorFamily {
    if let Some(pg) = db.try_downcast_ref::<PgDatabaseError>() {
        return classify_sqlstate(pg.code());
    }
    if let Some(mysql) = db.try_downcast_ref::<MySqlDatabaseError>() {
        return classify_mysql(mysql.number());
    }
    if let Some(sqlite) = db.try_downcast_ref::<SqliteError>() {
        let code = sqlite
            .code()
            .and_then(|c| c.parse::<i32>().ok())
            .unwrap_or_default();
        return classify_sqlite(code);
    }
    ErrorFamily::Execution
}

/// PostgreSQL SQLSTATE classification.
pub fn classify_sqlstate(code: &str) -> ErrorFamily {
    match code {
        // invalid_catalog_name, invalid_schema_name
        "3D000" | "3F000" => ErrorFamily::BadRequest,
        // too_many_connections, admin/crash shutdown, cannot_connect_now
        "53300" | "57P01" | "57P02" | "57P03" => ErrorFamily::Unreachable,
        c if c.starts_with("28") => ErrorFamily::Auth,
        c if c.starts_with("08") => ErrorFamily::Unreachable,
        _ => ErrorFamily::Execution,
    }
}

/// MySQL server / client error number classification.
pub fn classify_mysql(number: u16) -> ErrorFamily {
    match number {
        // ER_DBACCESS_DENIED, ER_ACCESS_DENIED, ER_HOST_NOT_PRIVILEGED,
        // ER_NOT_SUPPORTED_AUTH_MODE, ER_ACCESS_DENIED_NO_PASSWORD, ER_MUST_CHANGE_PASSWORD_LOGIN
        1044 | 1045 | 1130 | 1251 | 1698 | 1862 => ErrorFamily::Auth,
        // ER_NO_DB_ERROR, ER_BAD_DB_ERROR
        1046 | 1049 => ErrorFamily::BadRequest,
        // too many connections, shutdown in progress, host blocked, CR_* transport errors
        1040 | 1053 | 1129 | 2002 | 2003 | 2006 | 2013 => ErrorFamily::Unreachable,
        _ => ErrorFamily::Execution,
    }
}

/// SQLite result code classification. Extended codes are reduced to their
/// primary code first.
pub fn classify_sqlite(code: i32) -> ErrorFamily {
    match code & 0xff {
        // SQLITE_PERM, SQLITE_AUTH
        3 | 23 => ErrorFamily::Auth,
        // SQLITE_BUSY, SQLITE_LOCKED, SQLITE_IOERR, SQLITE_CANTOPEN
        5 | 6 | 10 | 14 => ErrorFamily::Unreachable,
        // SQLITE_CORRUPT, SQLITE_NOTADB
        11 | 26 => ErrorFamily::BadRequest,
        _ => ErrorFamily::Execution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::{ConnectOptions, Connection, SqliteConnection};

    #[test]
    fn test_postgres_sqlstate_families() {
        assert_eq!(classify_sqlstate("28P01"), ErrorFamily::Auth);
        assert_eq!(classify_sqlstate("28000"), ErrorFamily::Auth);
        assert_eq!(classify_sqlstate("3D000"), ErrorFamily::BadRequest);
        assert_eq!(classify_sqlstate("08006"), ErrorFamily::Unreachable);
        assert_eq!(classify_sqlstate("57P03"), ErrorFamily::Unreachable);
        assert_eq!(classify_sqlstate("42P01"), ErrorFamily::Execution);
        assert_eq!(classify_sqlstate("23505"), ErrorFamily::Execution);
    }

    #[test]
    fn test_mysql_number_families() {
        assert_eq!(classify_mysql(1045), ErrorFamily::Auth);
        assert_eq!(classify_mysql(1049), ErrorFamily::BadRequest);
        assert_eq!(classify_mysql(2003), ErrorFamily::Unreachable);
        assert_eq!(classify_mysql(1064), ErrorFamily::Execution);
        assert_eq!(classify_mysql(1146), ErrorFamily::Execution);
    }

    #[test]
    fn test_sqlite_codes_use_primary_code() {
        assert_eq!(classify_sqlite(14), ErrorFamily::Unreachable);
        // SQLITE_CANTOPEN_ISDIR
        assert_eq!(classify_sqlite(14 | (2 << 8)), ErrorFamily::Unreachable);
        assert_eq!(classify_sqlite(26), ErrorFamily::BadRequest);
        assert_eq!(classify_sqlite(1), ErrorFamily::Execution);
        // SQLITE_CONSTRAINT_UNIQUE
        assert_eq!(classify_sqlite(2067), ErrorFamily::Execution);
    }

    #[test]
    fn test_transport_variants() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(matches!(translate(io), AppError::DialectUnreachable(_)));
        assert!(matches!(
            translate(sqlx::Error::PoolTimedOut),
            AppError::DialectUnreachable(_)
        ));
        assert!(matches!(
            translate(sqlx::Error::Configuration("bad url".into())),
            AppError::DialectBadRequest(_)
        ));
        assert!(matches!(
            translate(sqlx::Error::RowNotFound),
            AppError::ExecutionFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_sqlite_missing_table_is_execution_failure() {
        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        let err = sqlx::query("SELECT * FROM nonexistent_table_12345")
            .fetch_all(&mut conn)
            .await
            .err()
            .expect("query against a missing table must fail");
        match translate(err) {
            AppError::ExecutionFailed(message) => assert!(message.contains("no such table")),
            other => panic!("unexpected translation: {other:?}"),
        }
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_unopenable_file_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteConnectOptions::new()
            .filename(dir.path().join("missing").join("nested.db"))
            .create_if_missing(false)
            .connect()
            .await
            .unwrap_err();
        assert!(matches!(translate(err), AppError::DialectUnreachable(_)));
    }
}
