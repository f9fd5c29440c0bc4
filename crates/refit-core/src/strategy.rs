//! Restore strategy planning.
//!
//! Turns a [`SchemaDiff`] into one [`RestorePlan`] per carried table, or
//! refuses when no safe column correspondence exists. Soft findings are
//! collected as [`PlanWarning`]s for the caller to report.

use std::fmt;

use crate::diff::{SchemaDiff, TableDiff, TableMatch, TypeChange};
use crate::error::{Result, SchemaError};
use crate::restore::quote_identifier;

/// How rows of one table are written into the new database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreStrategy {
    /// Whole rows, values in column order. Only valid when old and new
    /// fingerprints are identical.
    ByPosition,
    /// Only the listed columns, matched by name. Columns of the new table
    /// not listed get their declared default.
    ByNamedColumns(Vec<String>),
}

impl fmt::Display for RestoreStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByPosition => f.write_str("ByPosition"),
            Self::ByNamedColumns(columns) => write!(f, "ByNamedColumns({})", columns.join(",")),
        }
    }
}

/// A restore strategy bound to its source and target tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePlan {
    /// Table in the existing database.
    pub source: String,
    /// Table in the new database.
    pub target: String,
    /// How rows are carried.
    pub strategy: RestoreStrategy,
}

impl RestorePlan {
    /// The query reading the rows to carry from the source table.
    #[must_use]
    pub fn select_sql(&self) -> String {
        match &self.strategy {
            RestoreStrategy::ByPosition => {
                format!("SELECT * FROM {}", quote_identifier(&self.source))
            }
            RestoreStrategy::ByNamedColumns(columns) => format!(
                "SELECT {} FROM {}",
                columns
                    .iter()
                    .map(|c| quote_identifier(c))
                    .collect::<Vec<_>>()
                    .join(", "),
                quote_identifier(&self.source)
            ),
        }
    }

    /// Target columns for the insert, `None` for a positional insert.
    #[must_use]
    pub fn insert_columns(&self) -> Option<&[String]> {
        match &self.strategy {
            RestoreStrategy::ByPosition => None,
            RestoreStrategy::ByNamedColumns(columns) => Some(columns.as_slice()),
        }
    }
}

/// What to do when a table gained and lost the same number of columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnPairing {
    /// Carry the surviving columns and warn that the added/removed pairs
    /// may have been renames whose data is not carried.
    #[default]
    Intersection,
    /// Fail with [`SchemaError::AmbiguousColumns`].
    Reject,
}

/// Options for [`plan_restore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlannerOptions {
    /// Handling of equal added/removed column counts.
    pub column_pairing: ColumnPairing,
}

impl PlannerOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the column pairing policy.
    #[must_use]
    pub const fn with_column_pairing(mut self, pairing: ColumnPairing) -> Self {
        self.column_pairing = pairing;
        self
    }
}

/// Non-fatal findings the operator should know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanWarning {
    /// An old table is carried into a differently named table with the same
    /// columns.
    TableRenamed {
        /// Old table name.
        from: String,
        /// New table name.
        to: String,
    },
    /// An old table holding data has no counterpart; its rows are lost.
    TableDropped {
        /// Old table name.
        table: String,
    },
    /// The columns of a table changed.
    FingerprintChanged {
        /// Old table name.
        table: String,
    },
    /// A carried column changed its declared type.
    TypeChanged {
        /// Old table name.
        table: String,
        /// The change.
        change: TypeChange,
    },
    /// A carried column became `NOT NULL`.
    TightenedToNotNull {
        /// Old table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// A new `NOT NULL` column was added.
    AddedNotNull {
        /// Old table name.
        table: String,
        /// Column name.
        column: String,
        /// Whether the column declares a default.
        has_default: bool,
    },
    /// Equal numbers of columns were added and removed.
    ColumnsPaired {
        /// Old table name.
        table: String,
        /// Added columns.
        added: Vec<String>,
        /// Removed columns.
        removed: Vec<String>,
    },
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableRenamed { from, to } => write!(
                f,
                "Table '{from}' was probably renamed, restoring its data into table '{to}'"
            ),
            Self::TableDropped { table } => write!(
                f,
                "Table '{table}' not found in the new schema, neither by name nor by column \
                 fingerprint; its data is dropped. If the table was renamed and its columns \
                 changed, rename it in one run and change the columns in a second run"
            ),
            Self::FingerprintChanged { table } => write!(
                f,
                "Columns of table '{table}' changed; data may not be restored correctly"
            ),
            Self::TypeChanged { table, change } => write!(
                f,
                "Type of column '{table}.{}' changed from '{}' to '{}'; if restoring fails, \
                 adapt the data before changing the type",
                change.column, change.old_type, change.new_type
            ),
            Self::TightenedToNotNull { table, column } => write!(
                f,
                "Column '{table}.{column}' changed to NOT NULL; if restoring fails, keep it \
                 nullable for one run, fill in the data, then make it NOT NULL in a second run"
            ),
            Self::AddedNotNull {
                table,
                column,
                has_default,
            } => {
                write!(f, "Column '{table}.{column}' was added as NOT NULL")?;
                if !has_default {
                    f.write_str(" without a default; restoring existing rows will fail")?;
                }
                Ok(())
            }
            Self::ColumnsPaired {
                table,
                added,
                removed,
            } => write!(
                f,
                "Table '{table}': column(s) '{}' added and column(s) '{}' removed. If these \
                 were renames, the removed data is not carried; rename, remove or add one \
                 column per run instead",
                added.join(","),
                removed.join(",")
            ),
        }
    }
}

/// Restore plans for every carried table plus the warnings raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    /// Tables to carry, in old catalog order.
    pub tables: Vec<RestorePlan>,
    /// Warnings in the order they were raised.
    pub warnings: Vec<PlanWarning>,
}

impl MigrationPlan {
    /// Looks up the plan for an old table.
    #[must_use]
    pub fn table(&self, source: &str) -> Option<&RestorePlan> {
        self.tables.iter().find(|t| t.source == source)
    }
}

/// Plans the restore of every table in `diff`.
///
/// # Errors
///
/// Returns [`SchemaError::UnrepairableTable`] for the first table whose
/// added and removed column counts differ while both are non-zero, and
/// [`SchemaError::AmbiguousColumns`] for equal non-zero counts under
/// [`ColumnPairing::Reject`].
pub fn plan_restore(diff: &SchemaDiff, options: &PlannerOptions) -> Result<MigrationPlan> {
    let mut warnings = Vec::new();
    let tables = plan_tables(diff, options, &mut warnings)?;
    Ok(MigrationPlan { tables, warnings })
}

/// Like [`plan_restore`], but appends warnings to `warnings` as they are
/// raised, so they are still available when planning fails.
///
/// # Errors
///
/// See [`plan_restore`].
pub fn plan_tables(
    diff: &SchemaDiff,
    options: &PlannerOptions,
    warnings: &mut Vec<PlanWarning>,
) -> Result<Vec<RestorePlan>> {
    for dropped in &diff.dropped {
        warnings.push(PlanWarning::TableDropped {
            table: dropped.clone(),
        });
    }

    let mut tables = Vec::with_capacity(diff.tables.len());
    for table in &diff.tables {
        if table.matched_by == TableMatch::Fingerprint {
            warnings.push(PlanWarning::TableRenamed {
                from: table.source.clone(),
                to: table.target.clone(),
            });
        }
        let strategy = plan_table(table, options, warnings)?;
        tables.push(RestorePlan {
            source: table.source.clone(),
            target: table.target.clone(),
            strategy,
        });
    }
    Ok(tables)
}

/// Chooses the strategy for one table, appending its warnings.
///
/// # Errors
///
/// See [`plan_restore`].
pub fn plan_table(
    table: &TableDiff,
    options: &PlannerOptions,
    warnings: &mut Vec<PlanWarning>,
) -> Result<RestoreStrategy> {
    if table.identical {
        return Ok(RestoreStrategy::ByPosition);
    }

    let name = &table.source;
    warnings.push(PlanWarning::FingerprintChanged {
        table: name.clone(),
    });
    for change in &table.type_changed {
        warnings.push(PlanWarning::TypeChanged {
            table: name.clone(),
            change: change.clone(),
        });
    }
    for column in &table.tightened {
        warnings.push(PlanWarning::TightenedToNotNull {
            table: name.clone(),
            column: column.clone(),
        });
    }
    for column in table.added.iter().filter(|c| c.not_null) {
        warnings.push(PlanWarning::AddedNotNull {
            table: name.clone(),
            column: column.name.clone(),
            has_default: column.default_value.is_some(),
        });
    }

    let added = table.added.len();
    let removed = table.removed.len();

    if added == 0 || removed == 0 {
        return Ok(RestoreStrategy::ByNamedColumns(table.surviving.clone()));
    }

    if added == removed {
        return match options.column_pairing {
            ColumnPairing::Intersection if !table.surviving.is_empty() => {
                warnings.push(PlanWarning::ColumnsPaired {
                    table: name.clone(),
                    added: table.added_names(),
                    removed: table.removed.clone(),
                });
                Ok(RestoreStrategy::ByNamedColumns(table.surviving.clone()))
            }
            ColumnPairing::Intersection | ColumnPairing::Reject => {
                Err(SchemaError::AmbiguousColumns {
                    table: name.clone(),
                    added: table.added_names(),
                    removed: table.removed.clone(),
                })
            }
        };
    }

    Err(SchemaError::UnrepairableTable {
        table: name.clone(),
        added: table.added_names(),
        removed: table.removed.clone(),
    })
}
