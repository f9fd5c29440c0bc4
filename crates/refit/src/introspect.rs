//! SQLite schema introspection.

use std::path::Path;

use refit_core::{quote_identifier, ColumnDef, Introspect, SchemaSnapshot, TableSchema};
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use tracing::debug;

use crate::db;
use crate::error::{MigrateError, Result};

/// Lists user tables in catalog (creation) order; SQLite's own `sqlite_*`
/// tables are left out. `AUTOINCREMENT` counters are carried separately.
const TABLE_NAMES_SQL: &str = r"
SELECT name FROM sqlite_master
WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
ORDER BY rowid
";

const TABLE_COLUMNS_SQL: &str = r#"
SELECT name, type, "notnull", dflt_value, pk
FROM pragma_table_info(?1)
ORDER BY cid
"#;

/// Reads a [`SchemaSnapshot`] from a database file.
#[derive(Debug, Clone, Copy)]
pub struct SqliteIntrospector<'a> {
    path: &'a Path,
}

impl<'a> SqliteIntrospector<'a> {
    /// Creates an introspector for the database at `path`.
    #[must_use]
    pub const fn new(path: &'a Path) -> Self {
        Self { path }
    }
}

impl Introspect for SqliteIntrospector<'_> {
    type Error = MigrateError;

    async fn introspect_schema(&self) -> Result<SchemaSnapshot> {
        let mut conn = db::open_read_only(self.path).await?;
        let snapshot = read_snapshot(&mut conn).await;
        conn.close().await?;
        snapshot
    }
}

/// Reads every user table with its columns and whether it holds a row.
pub async fn read_snapshot(conn: &mut SqliteConnection) -> Result<SchemaSnapshot> {
    let mut snapshot = SchemaSnapshot::new();
    for name in table_names(conn).await? {
        let columns = table_columns(conn, &name).await?;
        let has_data = has_rows(conn, &name).await?;
        debug!(table = %name, columns = columns.len(), has_data, "Read table");
        snapshot.insert(TableSchema::new(name, columns), has_data);
    }
    Ok(snapshot)
}

/// Names of the user tables.
pub async fn table_names(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    let names: Vec<(String,)> = sqlx::query_as(TABLE_NAMES_SQL)
        .fetch_all(&mut *conn)
        .await?;
    Ok(names.into_iter().map(|(name,)| name).collect())
}

/// Column metadata of `table`, in declaration order.
pub async fn table_columns(conn: &mut SqliteConnection, table: &str) -> Result<Vec<ColumnDef>> {
    let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(TABLE_COLUMNS_SQL)
        .bind(table)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(
            |(position, (name, declared_type, not_null, default_value, pk))| ColumnDef {
                name,
                declared_type,
                not_null: not_null != 0,
                default_value,
                primary_key: pk != 0,
                position,
            },
        )
        .collect())
}

/// Whether `table` holds at least one row. Reads at most one row.
pub async fn has_rows(conn: &mut SqliteConnection, table: &str) -> Result<bool> {
    let sql = format!("SELECT 1 FROM {} LIMIT 1", quote_identifier(table));
    let row: Option<(i64,)> = sqlx::query_as(&sql).fetch_optional(&mut *conn).await?;
    Ok(row.is_some())
}
