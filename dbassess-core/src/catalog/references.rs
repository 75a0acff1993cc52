//! Many-per-test catalog records (CVE fixes and references).

use std::collections::BTreeMap;

use crate::dump::Row;

/// Records grouped by the test they belong to, in file order.
#[derive(Debug, Clone)]
pub struct ByTestIndex<T> {
    by_test: BTreeMap<i64, Vec<T>>,
    total: usize,
}

impl<T> Default for ByTestIndex<T> {
    fn default() -> Self {
        Self {
            by_test: BTreeMap::new(),
            total: 0,
        }
    }
}

/// Records that belong to one catalog test.
pub trait TestScoped {
    /// Owning test id.
    fn test_id(&self) -> i64;
}

impl TestScoped for crate::models::CveFix {
    fn test_id(&self) -> i64 {
        self.test_id
    }
}

impl TestScoped for crate::models::CveReference {
    fn test_id(&self) -> i64 {
        self.test_id
    }
}

impl<T: TestScoped> ByTestIndex<T> {
    /// Builds the index with `convert`, skipping rows it rejects.
    pub fn from_rows(rows: Vec<Row>, convert: fn(&Row) -> Option<T>) -> Self {
        Self::from_records(rows.iter().filter_map(convert))
    }

    /// Builds the index from records.
    pub fn from_records(records: impl IntoIterator<Item = T>) -> Self {
        let mut index = Self::default();
        for record in records {
            index.by_test.entry(record.test_id()).or_default().push(record);
            index.total = index.total.saturating_add(1);
        }
        index
    }

    /// Records of one test; empty when none.
    pub fn for_test(&self, test_id: i64) -> &[T] {
        self.by_test.get(&test_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.total
    }

    /// True when nothing loaded.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
