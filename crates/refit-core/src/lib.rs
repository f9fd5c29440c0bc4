//! # refit-core
//!
//! Engine-agnostic planning for evolving a database to a new schema while
//! keeping its rows.
//!
//! This crate provides:
//! - [`snapshot`]: table metadata and structural fingerprints
//! - [`diff`]: per-table column diff and rename detection by fingerprint
//! - [`strategy`]: the restore strategy chosen for each carried table
//! - [`definition`]: retargeting of the schema-definition script
//! - [`restore`]: the rows to carry, as parameterizable statements
//!
//! Nothing here touches a database or the filesystem; the `refit` crate
//! drives these pieces against SQLite.
//!
//! ```rust
//! use refit_core::diff::{diff_snapshots, DiffOptions};
//! use refit_core::snapshot::{ColumnDef, SchemaSnapshot, TableSchema};
//! use refit_core::strategy::{plan_restore, PlannerOptions, RestoreStrategy};
//!
//! let mut old = SchemaSnapshot::new();
//! old.insert(
//!     TableSchema::new("t", vec![ColumnDef::new("a", "INT", 0), ColumnDef::new("b", "TEXT", 1)]),
//!     true,
//! );
//! let mut new = SchemaSnapshot::new();
//! new.insert(TableSchema::new("t", vec![ColumnDef::new("a", "INT", 0)]), false);
//!
//! let diff = diff_snapshots(&old, &new, &DiffOptions::new()).unwrap();
//! let plan = plan_restore(&diff, &PlannerOptions::new()).unwrap();
//! assert_eq!(
//!     plan.table("t").unwrap().strategy,
//!     RestoreStrategy::ByNamedColumns(vec!["a".to_string()])
//! );
//! ```

pub mod definition;
pub mod diff;
pub mod error;
pub mod introspect;
pub mod restore;
pub mod snapshot;
pub mod strategy;

pub use definition::{rewrite_definition, RewrittenDefinition};
pub use diff::{diff_snapshots, DiffOptions, RenamePolicy, SchemaDiff, TableDiff, TableMatch};
pub use error::SchemaError;
pub use introspect::Introspect;
pub use restore::{quote_identifier, RestoreScript, SequenceCounter, SqlValue, TableDump};
pub use snapshot::{ColumnDef, Fingerprint, SchemaSnapshot, TableEntry, TableSchema};
pub use strategy::{
    plan_restore, plan_tables, ColumnPairing, MigrationPlan, PlanWarning, PlannerOptions, RestorePlan,
    RestoreStrategy,
};
