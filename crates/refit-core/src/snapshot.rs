//! Table metadata snapshots.
//!
//! A [`SchemaSnapshot`] is read from one database at the start of a run and
//! thrown away at the end of it. Column metadata is kept exactly as the
//! catalog reports it, so two snapshots compare equal only when the
//! declarations are textually identical.

use std::collections::HashMap;

/// A column as declared in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Declared type, verbatim (may be empty in SQLite).
    pub declared_type: String,
    /// Whether the column is declared `NOT NULL`.
    pub not_null: bool,
    /// Default value literal, verbatim.
    pub default_value: Option<String>,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
    /// Ordinal position, starting at 0.
    pub position: usize,
}

impl ColumnDef {
    /// Creates a nullable column without default at the given position.
    #[must_use]
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, position: usize) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            not_null: false,
            default_value: None,
            primary_key: false,
            position,
        }
    }

    /// Marks the column `NOT NULL`.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Sets the default value literal.
    #[must_use]
    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default_value = Some(literal.into());
        self
    }

    /// Marks the column as part of the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}

/// Structural identity of a table: its ordered columns, without its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<ColumnDef>);

impl Fingerprint {
    /// The columns making up this fingerprint.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.0
    }
}

/// A table name and its ordered columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Creates a table schema.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Returns the structural fingerprint of this table.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint(self.columns.clone())
    }

    /// Returns `true` when both tables have the same columns in the same
    /// order, whatever their names.
    #[must_use]
    pub fn same_structure(&self, other: &Self) -> bool {
        self.columns == other.columns
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// A table together with whether it holds at least one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    /// Table structure.
    pub schema: TableSchema,
    /// Whether any row exists.
    pub has_data: bool,
}

/// All tables of one database, in catalog order.
///
/// Catalog order is creation order in SQLite, and it decides which table
/// wins when several share a fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSnapshot {
    tables: Vec<TableEntry>,
    by_name: HashMap<String, usize>,
}

impl SchemaSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table after the ones already present. A table with the same
    /// name is replaced in place.
    pub fn insert(&mut self, schema: TableSchema, has_data: bool) {
        let entry = TableEntry { schema, has_data };
        if let Some(&index) = self.by_name.get(&entry.schema.name) {
            self.tables[index] = entry;
            return;
        }
        self.by_name
            .insert(entry.schema.name.clone(), self.tables.len());
        self.tables.push(entry);
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TableEntry> {
        self.by_name.get(name).map(|&index| &self.tables[index])
    }

    /// Every table, in catalog order.
    pub fn tables(&self) -> impl Iterator<Item = &TableEntry> {
        self.tables.iter()
    }

    /// Returns `true` if any table holds a row.
    #[must_use]
    pub fn contains_data(&self) -> bool {
        self.tables.iter().any(|t| t.has_data)
    }

    /// Tables that hold at least one row, in catalog order.
    pub fn tables_with_data(&self) -> impl Iterator<Item = &TableEntry> {
        self.tables.iter().filter(|t| t.has_data)
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` when there are no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
