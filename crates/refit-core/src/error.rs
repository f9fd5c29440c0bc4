//! Error types for diffing and planning.

/// Errors raised while rewriting a definition script or planning a restore.
///
/// Every variant is fatal for a run: it is raised before anything on disk
/// that belongs to the caller has been touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The definition script has no `ATTACH "<path>" AS "<alias>"` line.
    #[error("Definition script has no ATTACH \"<path>\" AS \"<alias>\" directive to retarget")]
    MissingAttachDirective,

    /// Several new tables share the fingerprint of a table that vanished.
    #[error(
        "Table '{table}' was not found by name and matches several new tables by structure: {}",
        .candidates.join(", ")
    )]
    AmbiguousRename {
        /// The table from the existing database.
        table: String,
        /// New tables with an identical fingerprint, in catalog order.
        candidates: Vec<String>,
    },

    /// Equal numbers of columns were added and removed and pairing them is
    /// disabled.
    #[error(
        "Table '{table}': column(s) '{}' added and '{}' removed; refusing to guess whether they were renamed",
        .added.join(","),
        .removed.join(",")
    )]
    AmbiguousColumns {
        /// Table name in the existing database.
        table: String,
        /// Columns only present in the new table.
        added: Vec<String>,
        /// Columns only present in the old table.
        removed: Vec<String>,
    },

    /// Added and removed column counts differ and both are non-zero.
    #[error(
        "Restoring is not possible for table '{table}': column(s) '{}' added do not match column(s) '{}' removed; \
         reorder, rename, remove or add columns in separate runs",
        .added.join(","),
        .removed.join(",")
    )]
    UnrepairableTable {
        /// Table name in the existing database.
        table: String,
        /// Columns only present in the new table.
        added: Vec<String>,
        /// Columns only present in the old table.
        removed: Vec<String>,
    },
}

/// Result type for schema planning.
pub type Result<T> = std::result::Result<T, SchemaError>;
