//! Flat-file relational dump format.
//!
//! Catalogs ship as, and registries persist to, a line-oriented
//! pseudo-XML layout inherited from `mysqldump --xml`:
//!
//! ```text
//! <?xml version="1.0"?>
//! <mysqldump xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
//! <database name="TURBINE">
//!     <table_structure name="DATASOURCE">
//!         <field Field="NAME" />
//!     </table_structure>
//!     <table_data name="DATASOURCE">
//!     <row>
//!         <field name="NAME">prod-orders</field>
//!     </row>
//!     </table_data>
//! </database>
//! </mysqldump>
//! ```
//!
//! [`decode`] turns bytes into an ordered list of [`DumpTable`]s and never
//! fails: malformed input yields an empty list, which callers treat as "no
//! data available". [`encode`] and [`encode_table`] produce the document
//! under an [`EscapePolicy`].

mod reader;
mod writer;

pub use reader::decode;
pub use writer::{EscapePolicy, encode, encode_table};

/// One row of a dump table: ordered `(field name, value)` pairs.
///
/// Field names are kept as written. [`Row::get`] matches names without
/// regard to case because shipped catalogs mix upper- and lower-case
/// spellings of the same column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method appending a field.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    /// Appends a field.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Returns the value of the first field named `name`, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the field value, or `""` when the field is absent.
    pub fn text(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    /// Returns the field value as an owned string, `""` when absent.
    pub fn string(&self, name: &str) -> String {
        self.text(name).to_string()
    }

    /// Parses the field as an integer. Blank or unparsable values give `None`.
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.trim().parse().ok())
    }

    /// Parses the field as an integer, falling back to `default`.
    pub fn int_or(&self, name: &str, default: i64) -> i64 {
        self.int(name).unwrap_or(default)
    }

    /// Interprets `1`, `y`, `yes`, `t` and `true` (any case) as set.
    pub fn flag(&self, name: &str) -> bool {
        matches!(
            self.text(name).trim().to_ascii_lowercase().as_str(),
            "1" | "y" | "yes" | "t" | "true"
        )
    }

    /// Returns the non-blank field value.
    pub fn optional(&self, name: &str) -> Option<String> {
        self.get(name)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
    }

    /// All fields in document order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the row carries no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N, V> FromIterator<(N, V)> for Row
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

/// A named table and its rows, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpTable {
    pub name: String,
    pub rows: Vec<Row>,
}

impl DumpTable {
    /// Creates a table.
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// Returns the rows of the first table named `name` (case-insensitive), or
/// every row of every table when no table carries that name.
///
/// Catalog files hold a single table whose name has drifted across
/// releases, so loaders fall back to reading whatever is there.
pub fn rows_of(tables: Vec<DumpTable>, name: &str) -> Vec<Row> {
    if tables.iter().any(|t| t.name.eq_ignore_ascii_case(name)) {
        tables
            .into_iter()
            .filter(|t| t.name.eq_ignore_ascii_case(name))
            .take(1)
            .flat_map(|t| t.rows)
            .collect()
    } else {
        tables.into_iter().flat_map(|t| t.rows).collect()
    }
}

#[cfg(test)]
mod tests;
