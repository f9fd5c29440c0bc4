//! Files derived from the target database path.
//!
//! For a target `dir/name.db` every file of a run lives in `dir`:
//! `name.db~` (database under construction), `name_definition.sql` and its
//! backup `name_definition.sql~`, `name_restore.sql`, and `name.log`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, Result};

/// The target database and the files a run derives from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPaths {
    /// Database to create or migrate in place.
    pub target: PathBuf,
    /// Base name of the target, used as the schema alias.
    pub db_name: String,
    /// Temporary database under construction.
    pub temp: PathBuf,
    /// Rewritten definition script kept for audit.
    pub definition: PathBuf,
    /// Previous copy of the definition script.
    pub definition_backup: PathBuf,
    /// Generated data-restore script.
    pub restore: PathBuf,
    /// Run log, written only when logging is enabled.
    pub log: PathBuf,
}

impl MigrationPaths {
    /// Derives every file name from `target`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::InvalidTarget`] when `target` has no file
    /// name or its stem is not valid UTF-8.
    pub fn for_target(target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let invalid = || MigrateError::InvalidTarget(target.clone());

        let file_name = target.file_name().ok_or_else(invalid)?.to_os_string();
        let db_name = target
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(invalid)?
            .to_string();
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let mut temp_name: OsString = file_name;
        temp_name.push("~");
        let definition = dir.join(format!("{db_name}_definition.sql"));

        Ok(Self {
            temp: dir.join(temp_name),
            definition_backup: dir.join(format!("{db_name}_definition.sql~")),
            definition,
            restore: dir.join(format!("{db_name}_restore.sql")),
            log: dir.join(format!("{db_name}.log")),
            db_name,
            target,
        })
    }

    /// Rollback journal SQLite keeps next to the temporary database.
    #[must_use]
    pub fn temp_journal(&self) -> PathBuf {
        let mut name = self.temp.clone().into_os_string();
        name.push("-journal");
        PathBuf::from(name)
    }

    /// Returns `true` if a previous database exists at the target path.
    #[must_use]
    pub fn target_exists(&self) -> bool {
        self.target.is_file()
    }
}
