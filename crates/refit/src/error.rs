//! Error types for a migration run.

use std::path::PathBuf;

use refit_core::SchemaError;

/// Broad classes of failure, one per way a run can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The definition script or the target path is unusable.
    InputValidation,
    /// Old and new tables have no safe column correspondence.
    UnrepairableSchemaDiff,
    /// SQLite rejected a statement.
    DatabaseExecution,
    /// A filesystem operation failed.
    Io,
}

/// Errors that abort a migration run.
///
/// None of them leaves the target database modified: the only step that
/// touches it is the final rename.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Rewriting the definition or planning the restore failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The target path has no usable file name.
    #[error("Invalid target database path: {0}")]
    InvalidTarget(PathBuf),

    /// Database error during introspection, build, dump or restore.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (sidecar files, temporary file, final swap).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema(SchemaError::MissingAttachDirective) | Self::InvalidTarget(_) => {
                ErrorKind::InputValidation
            }
            Self::Schema(_) => ErrorKind::UnrepairableSchemaDiff,
            Self::Database(_) => ErrorKind::DatabaseExecution,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type for migration runs.
pub type Result<T> = std::result::Result<T, MigrateError>;
