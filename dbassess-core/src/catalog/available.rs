//! Available-test catalog.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::rows;
use crate::dump::Row;
use crate::models::{AvailableTest, TestKind};

/// Catalog tests indexed by id and by datasource type.
#[derive(Debug, Clone, Default)]
pub struct TestStore {
    by_id: BTreeMap<i64, AvailableTest>,
    by_type: HashMap<i32, Vec<i64>>,
}

impl TestStore {
    /// Builds the store. A repeated id keeps the last row.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut by_id = BTreeMap::new();
        for row in &rows {
            match rows::available_test(row) {
                Some(test) => {
                    if let Some(previous) = by_id.insert(test.id, test) {
                        tracing::debug!(test_id = previous.id, "Duplicate available test replaced");
                    }
                }
                None => tracing::debug!("Skipping available test row without test_id"),
            }
        }
        Self::from_tests(by_id.into_values())
    }

    /// Builds the store from records.
    pub fn from_tests(tests: impl IntoIterator<Item = AvailableTest>) -> Self {
        let by_id: BTreeMap<i64, AvailableTest> = tests.into_iter().map(|t| (t.id, t)).collect();
        let mut by_type: HashMap<i32, Vec<i64>> = HashMap::new();
        // BTreeMap iteration keeps every per-type list sorted by id.
        for test in by_id.values() {
            by_type.entry(test.datasource_type_id).or_default().push(test.id);
        }
        Self { by_id, by_type }
    }

    /// Looks up a test by id.
    pub fn get(&self, id: i64) -> Option<&AvailableTest> {
        self.by_id.get(&id)
    }

    /// All tests, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &AvailableTest> {
        self.by_id.values()
    }

    /// Tests for one datasource type, ordered by id.
    pub fn for_datasource_type(&self, datasource_type_id: i32) -> Vec<&AvailableTest> {
        self.by_type
            .get(&datasource_type_id)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }

    /// Tests of one kind for one datasource type, ordered by id.
    pub fn of_kind(&self, kind: TestKind, datasource_type_id: i32) -> Vec<&AvailableTest> {
        self.for_datasource_type(datasource_type_id)
            .into_iter()
            .filter(|t| t.kind == kind)
            .collect()
    }

    /// Distinct category names offered for a datasource type.
    pub fn categories(&self, datasource_type_id: i32) -> BTreeSet<&str> {
        self.for_datasource_type(datasource_type_id)
            .into_iter()
            .map(|t| t.category_name.as_str())
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Number of tests.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when the catalog is empty or failed to load.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
