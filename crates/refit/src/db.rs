//! Short-lived SQLite connections.
//!
//! Every database access of a run opens its own connection and closes it
//! when the step is done; nothing is pooled.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection};
use tracing::debug;

use crate::error::Result;

/// Opens an existing database without write access.
pub async fn open_read_only(path: &Path) -> Result<SqliteConnection> {
    debug!(path = %path.display(), "Opening database read-only");
    let conn = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .disable_statement_logging()
        .connect()
        .await?;
    Ok(conn)
}

/// Opens the database under construction.
///
/// Foreign keys are not enforced so tables can be refilled in any order,
/// and the rollback journal is used so no `-wal` file outlives the
/// connection.
pub async fn open_build(path: &Path, create: bool) -> Result<SqliteConnection> {
    debug!(path = %path.display(), create, "Opening build database");
    let conn = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Delete)
        .foreign_keys(false)
        .disable_statement_logging()
        .connect()
        .await?;
    Ok(conn)
}

/// Runs a multi-statement script against the build database as one batch.
pub async fn execute_script(path: &Path, sql: &str, create: bool) -> Result<()> {
    let mut conn = open_build(path, create).await?;
    let executed = sqlx::raw_sql(sql).execute(&mut conn).await;
    conn.close().await?;
    executed?;
    Ok(())
}
