//! Assessment build and execution pipeline.
//!
//! [`AssessmentBuilder`] turns a datasource and a [`TestSelection`] into a
//! [`SecurityAssessment`](crate::models::SecurityAssessment).
//! [`AssessmentExecutor`] runs it against a live target through the
//! [`TargetConnector`] capability and returns the run's results as an owned
//! [`RunReport`].

mod builder;
mod executor;

pub use builder::AssessmentBuilder;
pub use executor::{
    AssessmentExecutor, CancellationFlag, ProductVersion, ResolvedTarget, RunReport,
    TargetConnection, TargetConnector,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DbAssessError;
use crate::models::{AvailableTest, Scope};

/// Why no assessment could be assembled.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No catalog test matched the datasource type and selection
    #[error("No tests to run for datasource '{datasource}' (type {datasource_type_id}, scope {scope:?})")]
    NothingToRun {
        datasource: String,
        datasource_type_id: i32,
        scope: Scope,
        category: Option<String>,
    },
}

/// Why an assessment run was aborted.
#[derive(Debug, Error)]
pub enum AssessmentError {
    /// The target connection could not be opened; nothing was recorded
    #[error("Could not connect to datasource '{datasource}'")]
    Connection {
        datasource: String,
        #[source]
        source: Box<DbAssessError>,
    },

    /// The datasource's type id is not a supported platform
    #[error("Datasource '{datasource}' has unknown type id {type_id}")]
    UnknownDatasourceType { datasource: String, type_id: i32 },
}

/// Which catalog tests an assessment includes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSelection {
    pub scope: Scope,
    /// Category name, matched without regard to case
    pub category: Option<String>,
}

impl TestSelection {
    /// Every test for the datasource type.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builder method to restrict the scope.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Builder method to restrict to one category. Blank names select all.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.category = (!category.trim().is_empty()).then_some(category);
        self
    }

    /// True when `test` is selected.
    pub fn matches(&self, test: &AvailableTest) -> bool {
        self.scope.includes(test.kind)
            && self.category.as_deref().is_none_or(|category| {
                test.category_name.trim().eq_ignore_ascii_case(category.trim())
            })
    }
}
