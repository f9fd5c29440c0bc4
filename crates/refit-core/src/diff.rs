//! Structural diff between an existing database and a freshly built one.
//!
//! Compares the old [`SchemaSnapshot`] against the new one table by table.
//! Tables are paired by name first and by [`Fingerprint`] second, so a
//! table that was only renamed keeps its rows. Within a pair, columns are
//! classified by name into added, removed, type-changed, tightened and
//! surviving sets.

use std::collections::HashMap;

use crate::error::{Result, SchemaError};
use crate::snapshot::{Fingerprint, SchemaSnapshot, TableSchema};

/// What to do when a vanished table matches several new tables by
/// fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenamePolicy {
    /// Take the first candidate in catalog order.
    #[default]
    FirstMatch,
    /// Fail with [`SchemaError::AmbiguousRename`].
    RejectAmbiguous,
}

/// Options for [`diff_snapshots`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Tie-break for fingerprint-based rename detection.
    pub rename_policy: RenamePolicy,
}

impl DiffOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rename policy.
    #[must_use]
    pub const fn with_rename_policy(mut self, policy: RenamePolicy) -> Self {
        self.rename_policy = policy;
        self
    }
}

/// How an old table found its counterpart in the new schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMatch {
    /// A new table carries the same name.
    SameName,
    /// No table of that name exists; a new table has an identical fingerprint.
    Fingerprint,
}

/// A column only present in the new table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedColumn {
    /// Column name.
    pub name: String,
    /// Whether it is declared `NOT NULL`.
    pub not_null: bool,
    /// Declared default, if any.
    pub default_value: Option<String>,
}

/// A column whose declared type changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeChange {
    /// Column name.
    pub column: String,
    /// Type in the existing database.
    pub old_type: String,
    /// Type in the new schema.
    pub new_type: String,
}

/// Column-level differences between one old table and its counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDiff {
    /// Table name in the existing database.
    pub source: String,
    /// Table name in the new schema.
    pub target: String,
    /// How `target` was found.
    pub matched_by: TableMatch,
    /// Old and new fingerprints are equal.
    pub identical: bool,
    /// Columns only in the new table, in new position order.
    pub added: Vec<AddedColumn>,
    /// Columns only in the old table, in old position order.
    pub removed: Vec<String>,
    /// Columns present in both whose declared type differs.
    pub type_changed: Vec<TypeChange>,
    /// Columns present in both that became `NOT NULL`.
    pub tightened: Vec<String>,
    /// Columns present in both, in old position order.
    pub surviving: Vec<String>,
}

impl TableDiff {
    /// Names of the added columns.
    #[must_use]
    pub fn added_names(&self) -> Vec<String> {
        self.added.iter().map(|c| c.name.clone()).collect()
    }

    /// Returns `true` when no column was added or removed.
    #[must_use]
    pub fn same_column_set(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Result of comparing two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Tables that have a counterpart, in old catalog order.
    pub tables: Vec<TableDiff>,
    /// Tables holding data that have no counterpart at all. Their rows are
    /// not carried over.
    pub dropped: Vec<String>,
}

impl SchemaDiff {
    /// Looks up the diff for an old table.
    #[must_use]
    pub fn table(&self, source: &str) -> Option<&TableDiff> {
        self.tables.iter().find(|t| t.source == source)
    }
}

/// New tables grouped by fingerprint, built once per run.
#[derive(Debug)]
pub struct FingerprintIndex<'a> {
    by_fingerprint: HashMap<Fingerprint, Vec<&'a str>>,
}

impl<'a> FingerprintIndex<'a> {
    /// Indexes every table of `snapshot`. Candidate lists keep catalog
    /// order.
    #[must_use]
    pub fn build(snapshot: &'a SchemaSnapshot) -> Self {
        let mut by_fingerprint: HashMap<Fingerprint, Vec<&'a str>> = HashMap::new();
        for entry in snapshot.tables() {
            by_fingerprint
                .entry(entry.schema.fingerprint())
                .or_default()
                .push(entry.schema.name.as_str());
        }
        Self { by_fingerprint }
    }

    /// Tables whose fingerprint equals `fingerprint`.
    #[must_use]
    pub fn candidates(&self, fingerprint: &Fingerprint) -> &[&'a str] {
        self.by_fingerprint
            .get(fingerprint)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Compares every old table that holds data against the new snapshot.
///
/// Old tables without rows are skipped: there is nothing to carry over.
///
/// # Errors
///
/// Returns [`SchemaError::AmbiguousRename`] under
/// [`RenamePolicy::RejectAmbiguous`] when a vanished table matches more
/// than one new table.
pub fn diff_snapshots(
    old: &SchemaSnapshot,
    new: &SchemaSnapshot,
    options: &DiffOptions,
) -> Result<SchemaDiff> {
    let index = FingerprintIndex::build(new);
    let mut diff = SchemaDiff::default();

    for entry in old.tables_with_data() {
        let old_table = &entry.schema;

        if let Some(new_entry) = new.get(&old_table.name) {
            diff.tables
                .push(diff_table(old_table, &new_entry.schema, TableMatch::SameName));
            continue;
        }

        let candidates = index.candidates(&old_table.fingerprint());
        if candidates.len() > 1 && options.rename_policy == RenamePolicy::RejectAmbiguous {
            return Err(SchemaError::AmbiguousRename {
                table: old_table.name.clone(),
                candidates: candidates.iter().map(|c| (*c).to_string()).collect(),
            });
        }

        match candidates.first().and_then(|name| new.get(name)) {
            Some(new_entry) => diff.tables.push(diff_table(
                old_table,
                &new_entry.schema,
                TableMatch::Fingerprint,
            )),
            None => diff.dropped.push(old_table.name.clone()),
        }
    }

    Ok(diff)
}

/// Classifies the columns of `old` against `new`.
#[must_use]
pub fn diff_table(old: &TableSchema, new: &TableSchema, matched_by: TableMatch) -> TableDiff {
    let mut removed = Vec::new();
    let mut type_changed = Vec::new();
    let mut tightened = Vec::new();
    let mut surviving = Vec::new();

    for old_col in &old.columns {
        let Some(new_col) = new.column(&old_col.name) else {
            removed.push(old_col.name.clone());
            continue;
        };
        if new_col.declared_type != old_col.declared_type {
            type_changed.push(TypeChange {
                column: old_col.name.clone(),
                old_type: old_col.declared_type.clone(),
                new_type: new_col.declared_type.clone(),
            });
        }
        if new_col.not_null && !old_col.not_null {
            tightened.push(old_col.name.clone());
        }
        surviving.push(old_col.name.clone());
    }

    let added = new
        .columns
        .iter()
        .filter(|c| old.column(&c.name).is_none())
        .map(|c| AddedColumn {
            name: c.name.clone(),
            not_null: c.not_null,
            default_value: c.default_value.clone(),
        })
        .collect();

    TableDiff {
        source: old.name.clone(),
        target: new.name.clone(),
        matched_by,
        identical: old.same_structure(new),
        added,
        removed,
        type_changed,
        tightened,
        surviving,
    }
}
