//! Migration orchestrator.
//!
//! A run moves through [`UpdateStep`]s strictly in order. All work happens
//! in the temporary build file next to the target; the target itself is
//! only read until the final rename, so a run that fails anywhere earlier
//! leaves it exactly as it was and can simply be repeated.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use refit_core::{
    diff_snapshots, plan_tables, rewrite_definition, ColumnPairing, DiffOptions, Introspect,
    PlannerOptions, RenamePolicy, RewrittenDefinition,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dump;
use crate::error::{MigrateError, Result};
use crate::introspect::SqliteIntrospector;
use crate::paths::MigrationPaths;
use crate::db;

/// The steps of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateStep {
    /// Retarget the definition script at the build file.
    RewriteDefinition,
    /// Write the rewritten script next to the target.
    PersistDefinitionCopy,
    /// Build the new database from the script.
    CreateNew,
    /// Carry rows over from the previous database.
    ConditionalMigrate,
    /// Create the indexes deferred during the build.
    RebuildIndexes,
    /// Replace the target with the build file.
    AtomicSwap,
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What happened to one carried table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    /// Table in the previous database.
    pub source: String,
    /// Table in the new database.
    pub target: String,
    /// Strategy used, e.g. `ByNamedColumns(a,b)`.
    pub strategy: String,
    /// Rows carried over.
    pub rows: usize,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// The target database.
    pub target: PathBuf,
    /// A previous database existed at the target path.
    pub had_previous: bool,
    /// Rows were carried over from the previous database.
    pub migrated: bool,
    /// Carried tables.
    pub tables: Vec<TableOutcome>,
    /// Tables holding data that were dropped.
    pub dropped_tables: Vec<String>,
    /// Warnings raised while planning.
    pub warnings: Vec<String>,
    /// Number of deferred index statements executed.
    pub indexes_rebuilt: usize,
    /// The build file replaced the target.
    pub swapped: bool,
}

impl UpdateReport {
    fn new(target: &Path) -> Self {
        Self {
            target: target.to_path_buf(),
            had_previous: false,
            migrated: false,
            tables: Vec::new(),
            dropped_tables: Vec::new(),
            warnings: Vec::new(),
            indexes_rebuilt: 0,
            swapped: false,
        }
    }

    /// Total rows carried over.
    #[must_use]
    pub fn rows_restored(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// Evolves one database file to match a definition script.
#[derive(Debug, Clone)]
pub struct SchemaUpdater {
    paths: MigrationPaths,
    definition_sql: String,
    diff_options: DiffOptions,
    planner_options: PlannerOptions,
    dry_run: bool,
}

impl SchemaUpdater {
    /// Creates an updater for the database at `target`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::InvalidTarget`] when no file names can be
    /// derived from `target`.
    pub fn new(target: impl AsRef<Path>, definition_sql: impl Into<String>) -> Result<Self> {
        Ok(Self {
            paths: MigrationPaths::for_target(target)?,
            definition_sql: definition_sql.into(),
            diff_options: DiffOptions::default(),
            planner_options: PlannerOptions::default(),
            dry_run: false,
        })
    }

    /// Sets how tables renamed without column changes are matched.
    #[must_use]
    pub fn rename_policy(mut self, policy: RenamePolicy) -> Self {
        self.diff_options = self.diff_options.with_rename_policy(policy);
        self
    }

    /// Sets how equal numbers of added and removed columns are handled.
    #[must_use]
    pub fn column_pairing(mut self, pairing: ColumnPairing) -> Self {
        self.planner_options = self.planner_options.with_column_pairing(pairing);
        self
    }

    /// Enables dry-run mode: everything is built, nothing is swapped in.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the derived file paths.
    #[must_use]
    pub fn paths(&self) -> &MigrationPaths {
        &self.paths
    }

    /// Runs every step.
    ///
    /// # Errors
    ///
    /// Any failure aborts the run. The target is left untouched; the build
    /// file and sidecar files stay on disk for diagnosis.
    pub async fn run(&self) -> Result<UpdateReport> {
        info!(target = %self.paths.target.display(), dry_run = self.dry_run, "Update started");
        let mut report = UpdateReport::new(&self.paths.target);

        let build_path = self
            .paths
            .temp
            .to_str()
            .ok_or_else(|| MigrateError::InvalidTarget(self.paths.target.clone()))?;

        enter(UpdateStep::RewriteDefinition);
        let definition = rewrite_definition(&self.definition_sql, build_path, &self.paths.db_name)?;
        debug!(
            previous_alias = %definition.previous_alias,
            alias = %definition.alias,
            deferred_indexes = definition.deferred_indexes.len(),
            "Definition retargeted"
        );

        enter(UpdateStep::PersistDefinitionCopy);
        self.persist_definition(&definition)?;

        enter(UpdateStep::CreateNew);
        self.create_new(&definition).await?;

        enter(UpdateStep::ConditionalMigrate);
        self.migrate_data(&mut report).await?;

        enter(UpdateStep::RebuildIndexes);
        report.indexes_rebuilt = self.rebuild_indexes(&definition, build_path).await?;

        if self.dry_run {
            info!(
                build = %self.paths.temp.display(),
                "Dry run, leaving the target untouched"
            );
        } else {
            enter(UpdateStep::AtomicSwap);
            self.swap()?;
            report.swapped = true;
        }

        info!(
            tables = report.tables.len(),
            rows = report.rows_restored(),
            warnings = report.warnings.len(),
            "Update finished"
        );
        Ok(report)
    }

    /// Writes the rewritten script, rotating an existing copy to the
    /// backup name first.
    fn persist_definition(&self, definition: &RewrittenDefinition) -> Result<()> {
        let paths = &self.paths;
        if paths.definition_backup.is_file() {
            fs::remove_file(&paths.definition_backup)?;
        }
        if paths.definition.is_file() {
            fs::rename(&paths.definition, &paths.definition_backup)?;
        }
        fs::write(&paths.definition, &definition.sql)?;
        Ok(())
    }

    async fn create_new(&self, definition: &RewrittenDefinition) -> Result<()> {
        for stale in [self.paths.temp.clone(), self.paths.temp_journal()] {
            if stale.is_file() {
                debug!(path = %stale.display(), "Removing stale build file");
                fs::remove_file(&stale)?;
            }
        }
        db::execute_script(&self.paths.temp, &definition.sql, true).await
    }

    async fn migrate_data(&self, report: &mut UpdateReport) -> Result<()> {
        if !self.paths.target_exists() {
            info!("No previous database, nothing to migrate");
            return Ok(());
        }
        report.had_previous = true;

        let old = SqliteIntrospector::new(&self.paths.target)
            .introspect_schema()
            .await?;
        if !old.contains_data() {
            info!("Previous database holds no rows, nothing to migrate");
            return Ok(());
        }
        let new = SqliteIntrospector::new(&self.paths.temp)
            .introspect_schema()
            .await?;

        let diff = diff_snapshots(&old, &new, &self.diff_options)?;
        let mut warnings = Vec::new();
        let planned = plan_tables(&diff, &self.planner_options, &mut warnings);
        for warning in &warnings {
            warn!("{warning}");
        }
        report.warnings = warnings.iter().map(ToString::to_string).collect();
        let plans = planned?;

        for plan in &plans {
            info!(
                source = %plan.source,
                target = %plan.target,
                strategy = %plan.strategy,
                "Dump/restore table"
            );
        }

        let script = dump::dump_tables(&self.paths.target, &plans).await?;
        dump::write_restore_script(&self.paths.restore, &script)?;
        dump::restore_tables(&self.paths.temp, &script).await?;

        report.tables = plans
            .iter()
            .zip(&script.tables)
            .map(|(plan, table)| TableOutcome {
                source: plan.source.clone(),
                target: plan.target.clone(),
                strategy: plan.strategy.to_string(),
                rows: table.rows.len(),
            })
            .collect();
        report.dropped_tables = diff.dropped;
        report.migrated = true;
        Ok(())
    }

    async fn rebuild_indexes(
        &self,
        definition: &RewrittenDefinition,
        build_path: &str,
    ) -> Result<usize> {
        let Some(script) = definition.index_script(build_path) else {
            return Ok(0);
        };
        db::execute_script(&self.paths.temp, &script, false).await?;
        info!(indexes = definition.deferred_indexes.len(), "Indexes rebuilt");
        Ok(definition.deferred_indexes.len())
    }

    /// Moves the build file onto the target. Renaming over an existing
    /// file is atomic where the platform allows it; otherwise the target
    /// is removed first.
    fn swap(&self) -> Result<()> {
        let paths = &self.paths;
        if let Err(err) = fs::rename(&paths.temp, &paths.target) {
            if !paths.target_exists() {
                return Err(err.into());
            }
            debug!(error = %err, "Rename over target failed, removing target first");
            fs::remove_file(&paths.target)?;
            fs::rename(&paths.temp, &paths.target)?;
        }
        Ok(())
    }
}

fn enter(step: UpdateStep) {
    info!(step = %step, "Entering step");
}
