//! Restore script model.
//!
//! Rows read from the existing database are held as [`SqlValue`]s grouped
//! per target table. The driver executes them as parameterized inserts;
//! [`RestoreScript::render`] produces the same statements with escaped
//! literals for the audit copy written next to the database.

use std::fmt::Write as _;

/// A single SQLite value, tagged with its storage class.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Text whose bytes are not valid UTF-8, kept verbatim.
    TextBytes(Vec<u8>),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns the value as an SQL literal.
    #[must_use]
    pub fn to_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Real(f) if f.is_nan() => "NULL".to_string(),
            Self::Real(f) if f.is_infinite() => {
                let literal = if f.is_sign_positive() { "9e999" } else { "-9e999" };
                literal.to_string()
            }
            // Debug keeps the fractional part so the literal stays REAL.
            Self::Real(f) => format!("{f:?}"),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::TextBytes(bytes) => format!("CAST({} AS TEXT)", hex_literal(bytes)),
            Self::Blob(bytes) => hex_literal(bytes),
        }
    }

    /// The parameter placeholder for this value. Raw text bytes are bound
    /// as a blob and cast back to text.
    #[must_use]
    pub const fn placeholder(&self) -> &'static str {
        match self {
            Self::TextBytes(_) => "CAST(? AS TEXT)",
            _ => "?",
        }
    }
}

fn hex_literal(bytes: &[u8]) -> String {
    let mut literal = String::with_capacity(bytes.len() * 2 + 3);
    literal.push_str("X'");
    for b in bytes {
        let _ = write!(literal, "{b:02X}");
    }
    literal.push('\'');
    literal
}

/// Quotes an identifier with double quotes, doubling embedded quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Rows destined for one table of the new database.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDump {
    /// Target table name.
    pub table: String,
    /// Target columns; `None` inserts whole rows positionally.
    pub columns: Option<Vec<String>>,
    /// Row values, each in the order of `columns` (or of the table).
    pub rows: Vec<Vec<SqlValue>>,
}

impl TableDump {
    /// Creates an empty dump for `table`.
    #[must_use]
    pub fn new(table: impl Into<String>, columns: Option<Vec<String>>) -> Self {
        Self {
            table: table.into(),
            columns,
            rows: Vec::new(),
        }
    }

    fn insert_head(&self) -> String {
        let mut head = format!("INSERT INTO {}", quote_identifier(&self.table));
        if let Some(columns) = &self.columns {
            head.push_str(" (");
            head.push_str(
                &columns
                    .iter()
                    .map(|c| quote_identifier(c))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            head.push(')');
        }
        head
    }

    /// The parameterized insert for `row`, one placeholder per value.
    #[must_use]
    pub fn insert_sql(&self, row: &[SqlValue]) -> String {
        let placeholders: Vec<&str> = row.iter().map(SqlValue::placeholder).collect();
        format!("{} VALUES ({})", self.insert_head(), placeholders.join(", "))
    }

    /// One insert statement per row with values inlined as literals.
    #[must_use]
    pub fn render(&self) -> String {
        let head = self.insert_head();
        let mut out = String::new();
        for row in &self.rows {
            let values: Vec<String> = row.iter().map(SqlValue::to_literal).collect();
            let _ = writeln!(out, "{head} VALUES ({});", values.join(", "));
        }
        out
    }
}

/// An `AUTOINCREMENT` counter carried from the old database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceCounter {
    /// Target table name.
    pub table: String,
    /// Highest rowid ever handed out in the old table.
    pub value: i64,
}

impl SequenceCounter {
    /// Raises the counter of table `?1` to at least `?2`. Tables without
    /// a counter row are left alone.
    pub const UPDATE_SQL: &'static str =
        "UPDATE sqlite_sequence SET seq = MAX(seq, ?2) WHERE name = ?1";

    /// The update with values inlined as literals.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "UPDATE sqlite_sequence SET seq = MAX(seq, {}) WHERE name = {};",
            self.value,
            SqlValue::Text(self.table.clone()).to_literal()
        )
    }
}

/// Every table dump of one run, in restore order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreScript {
    /// Table dumps.
    pub tables: Vec<TableDump>,
    /// Counters applied after all rows are in.
    pub sequences: Vec<SequenceCounter>,
}

impl RestoreScript {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a table dump.
    pub fn push(&mut self, dump: TableDump) {
        self.tables.push(dump);
    }

    /// Total number of rows over all tables.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }

    /// Returns `true` when no row is carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Renders the whole script as SQL text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            let _ = writeln!(
                out,
                "-- {} ({} rows)",
                quote_identifier(&table.table),
                table.rows.len()
            );
            out.push_str(&table.render());
        }
        if !self.sequences.is_empty() {
            out.push_str("-- sqlite_sequence\n");
            for counter in &self.sequences {
                out.push_str(&counter.render());
                out.push('\n');
            }
        }
        out
    }
}
