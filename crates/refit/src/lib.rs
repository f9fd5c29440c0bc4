//! Crash-safe SQLite schema evolution.
//!
//! `refit` brings an existing SQLite database in line with a
//! schema-definition script while keeping its rows:
//! - The script is run against a fresh temporary file next to the target
//! - Rows of the previous database are carried over table by table, either
//!   positionally or through the columns both versions share
//! - The temporary file replaces the target by rename, and only when every
//!   step succeeded
//!
//! The target database is opened read-only throughout, so any failure
//! leaves it exactly as it was.
//!
//! # Definition scripts
//!
//! A script must attach the database it builds under an alias and qualify
//! every object with that alias:
//!
//! ```sql
//! ATTACH "shop.db" AS "shop";
//! BEGIN;
//! CREATE TABLE "shop"."items" (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
//! CREATE INDEX "shop"."items_name" ON "items" (name);
//! COMMIT;
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use refit::prelude::*;
//!
//! # async fn run() -> refit::error::Result<()> {
//! let script = std::fs::read_to_string("shop.sql")?;
//! let report = SchemaUpdater::new("data/shop.db", script)?
//!     .rename_policy(RenamePolicy::RejectAmbiguous)
//!     .run()
//!     .await?;
//! println!("{} rows carried over", report.rows_restored());
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Create or evolve data/shop.db
//! refit data/shop.db --schema shop.sql
//!
//! # Build next to the target without replacing it
//! refit data/shop.db --schema shop.sql --dry-run --json
//! ```

pub mod db;
pub mod dump;
pub mod error;
pub mod introspect;
pub mod paths;
pub mod updater;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{ErrorKind, MigrateError, Result};
    pub use crate::introspect::SqliteIntrospector;
    pub use crate::paths::MigrationPaths;
    pub use crate::updater::{SchemaUpdater, TableOutcome, UpdateReport, UpdateStep};
    pub use refit_core::{ColumnPairing, Introspect, RenamePolicy, SchemaError};
}
