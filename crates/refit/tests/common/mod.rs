//! Shared helpers for migration integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use refit::prelude::*;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tempfile::TempDir;

/// Wraps table and index statements in an attaching definition script.
pub fn definition(alias: &str, body: &str) -> String {
    format!("ATTACH \"{alias}.db\" AS \"{alias}\";\nBEGIN;\n{body}\nCOMMIT;\n")
}

/// A scratch directory holding `shop.db`.
pub struct Workspace {
    pub dir: TempDir,
    pub target: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("shop.db");
        Self { dir, target }
    }

    /// Creates the target directly from plain SQL.
    pub async fn seed(&self, sql: &str) {
        refit::db::execute_script(&self.target, sql, true)
            .await
            .unwrap();
    }

    pub fn paths(&self) -> MigrationPaths {
        MigrationPaths::for_target(&self.target).unwrap()
    }

    pub async fn update(&self, script: &str) -> refit::error::Result<UpdateReport> {
        SchemaUpdater::new(&self.target, script)?.run().await
    }

    pub fn bytes(&self) -> Vec<u8> {
        std::fs::read(&self.target).unwrap()
    }
}

/// Runs `sql` against the database at `path` and returns every row.
pub async fn fetch<T>(path: &Path, sql: &str) -> Vec<T>
where
    T: for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin,
{
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .connect()
        .await
        .unwrap();
    let rows = sqlx::query_as(sql).fetch_all(&mut conn).await.unwrap();
    conn.close().await.unwrap();
    rows
}

/// Names of the indexes defined in the database at `path`.
pub async fn index_names(path: &Path) -> Vec<String> {
    fetch::<(String,)>(
        path,
        "SELECT name FROM sqlite_master WHERE type = 'index' AND sql IS NOT NULL ORDER BY name",
    )
    .await
    .into_iter()
    .map(|(name,)| name)
    .collect()
}
