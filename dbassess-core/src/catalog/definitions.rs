//! SQL bodies of query-based tests.

use std::collections::HashMap;

use super::rows;
use crate::dump::Row;
use crate::models::SqlbasedAssessmentDefinition;

/// Query definitions keyed by test id.
#[derive(Debug, Clone, Default)]
pub struct DefinitionStore {
    by_test_id: HashMap<i64, SqlbasedAssessmentDefinition>,
}

impl DefinitionStore {
    /// Builds the store. A repeated test id keeps the last row.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::from_definitions(rows.iter().filter_map(rows::sql_definition))
    }

    /// Builds the store from records.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = SqlbasedAssessmentDefinition>,
    ) -> Self {
        Self {
            by_test_id: definitions.into_iter().map(|d| (d.test_id, d)).collect(),
        }
    }

    /// Definition of a query-based test.
    pub fn for_test(&self, test_id: i64) -> Option<&SqlbasedAssessmentDefinition> {
        self.by_test_id.get(&test_id)
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.by_test_id.len()
    }

    /// True when no definitions loaded.
    pub fn is_empty(&self) -> bool {
        self.by_test_id.is_empty()
    }
}
