//! Dump and restore of carried rows.
//!
//! Rows are read from the existing database in one query per table and held
//! in memory as a [`RestoreScript`]. Replaying binds every value as a
//! statement parameter; the rendered SQL file is only an audit copy.

use std::path::Path;

use refit_core::{RestorePlan, RestoreScript, SequenceCounter, SqlValue, TableDump};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{Connection, Row, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::db;
use crate::error::Result;

const HAS_SEQUENCE_TABLE_SQL: &str =
    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence'";

/// Reads the rows of every planned table from the database at `source`.
pub async fn dump_tables(source: &Path, plans: &[RestorePlan]) -> Result<RestoreScript> {
    let mut conn = db::open_read_only(source).await?;
    let script = read_tables(&mut conn, plans).await;
    conn.close().await?;
    script
}

async fn read_tables(conn: &mut SqliteConnection, plans: &[RestorePlan]) -> Result<RestoreScript> {
    let mut script = RestoreScript::new();
    for plan in plans {
        let sql = plan.select_sql();
        debug!(sql = %sql, "Dumping table");
        let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

        let mut dump = TableDump::new(&plan.target, plan.insert_columns().map(<[String]>::to_vec));
        dump.rows = rows.iter().map(decode_row).collect::<std::result::Result<_, _>>()?;
        debug!(
            source = %plan.source,
            target = %plan.target,
            rows = dump.rows.len(),
            "Dumped table"
        );
        script.push(dump);
    }
    script.sequences = read_sequences(conn, plans).await?;
    Ok(script)
}

async fn has_sequence_table(conn: &mut SqliteConnection) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(HAS_SEQUENCE_TABLE_SQL)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

/// `AUTOINCREMENT` counters of the planned tables, renamed to their
/// targets.
async fn read_sequences(
    conn: &mut SqliteConnection,
    plans: &[RestorePlan],
) -> Result<Vec<SequenceCounter>> {
    if !has_sequence_table(conn).await? {
        return Ok(Vec::new());
    }
    let rows: Vec<(String, i64)> = sqlx::query_as("SELECT name, seq FROM sqlite_sequence")
        .fetch_all(&mut *conn)
        .await?;

    Ok(plans
        .iter()
        .filter_map(|plan| {
            rows.iter()
                .find(|(name, _)| *name == plan.source)
                .map(|&(_, value)| SequenceCounter {
                    table: plan.target.clone(),
                    value,
                })
        })
        .collect())
}

fn decode_row(row: &SqliteRow) -> std::result::Result<Vec<SqlValue>, sqlx::Error> {
    (0..row.len()).map(|index| decode_value(row, index)).collect()
}

/// Decodes a value by its runtime storage class, whatever the column's
/// declared type.
fn decode_value(row: &SqliteRow, index: usize) -> std::result::Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage_class = raw.type_info().name().to_string();
    let value = match storage_class.as_str() {
        "INTEGER" => SqlValue::Integer(row.try_get_unchecked(index)?),
        "REAL" => SqlValue::Real(row.try_get_unchecked(index)?),
        "BLOB" => SqlValue::Blob(row.try_get_unchecked(index)?),
        _ => match String::from_utf8(row.try_get_unchecked(index)?) {
            Ok(text) => SqlValue::Text(text),
            Err(err) => SqlValue::TextBytes(err.into_bytes()),
        },
    };
    Ok(value)
}

/// Writes the audit copy of `script` to `path`.
pub fn write_restore_script(path: &Path, script: &RestoreScript) -> Result<()> {
    std::fs::write(path, script.render())?;
    Ok(())
}

/// Inserts every row of `script` into the database at `target` inside one
/// transaction. Returns the number of rows inserted.
///
/// Any failing insert rolls the whole restore back.
pub async fn restore_tables(target: &Path, script: &RestoreScript) -> Result<u64> {
    let mut conn = db::open_build(target, false).await?;
    let restored = replay(&mut conn, script).await;
    conn.close().await?;
    let restored = restored?;
    info!(rows = restored, tables = script.tables.len(), "Restored data");
    Ok(restored)
}

async fn replay(conn: &mut SqliteConnection, script: &RestoreScript) -> Result<u64> {
    let mut tx = conn.begin().await?;
    let mut restored = 0;

    for dump in &script.tables {
        debug!(table = %dump.table, rows = dump.rows.len(), "Restoring table");
        for row in &dump.rows {
            let sql = dump.insert_sql(row);
            let query = row.iter().fold(sqlx::query(&sql), bind_value);
            restored += query.execute(&mut *tx).await?.rows_affected();
        }
    }

    if !script.sequences.is_empty() && has_sequence_table(&mut *tx).await? {
        for counter in &script.sequences {
            debug!(table = %counter.table, value = counter.value, "Carrying sequence");
            sqlx::query(SequenceCounter::UPDATE_SQL)
                .bind(counter.table.as_str())
                .bind(counter.value)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;
    Ok(restored)
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Integer(i) => query.bind(*i),
        SqlValue::Real(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::TextBytes(bytes) | SqlValue::Blob(bytes) => query.bind(bytes.clone()),
    }
}
