//! Schema introspection trait.
//!
//! Driver crates implement [`Introspect`] to read a live database into a
//! [`SchemaSnapshot`]. The core crate defines only the trait so it stays
//! driver-agnostic.

use std::future::Future;

use crate::snapshot::SchemaSnapshot;

/// Reads table names, column metadata and per-table emptiness from a
/// database.
///
/// Implementations must either return a complete snapshot or fail; a
/// partial snapshot is never returned.
pub trait Introspect {
    /// Error type for introspection failures.
    type Error: std::error::Error;

    /// Reads the current database schema and returns a snapshot.
    fn introspect_schema(&self) -> impl Future<Output = Result<SchemaSnapshot, Self::Error>>;
}
