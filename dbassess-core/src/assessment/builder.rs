//! Run-set selection.

use chrono::Utc;

use super::{BuildError, TestSelection};
use crate::catalog::Catalog;
use crate::models::{AssessmentTest, AvailableTest, Datasource, SecurityAssessment, TestKind};

/// Assembles assessments from the catalog.
///
/// Assessment and assessment-test ids are handed out by the builder and
/// increase across builds.
#[derive(Debug)]
pub struct AssessmentBuilder<'a> {
    catalog: &'a Catalog,
    next_assessment_id: i64,
    next_assessment_test_id: i64,
}

impl<'a> AssessmentBuilder<'a> {
    /// Creates a builder over `catalog`.
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            next_assessment_id: 1,
            next_assessment_test_id: 1,
        }
    }

    /// Selects the catalog tests for `datasource` and schedules them.
    ///
    /// Query tests come first, then CVE tests, each in id order. Query
    /// tests without a SQL definition are left out. Tests of other kinds are
    /// never scheduled.
    ///
    /// # Errors
    /// Returns [`BuildError::NothingToRun`] when no test survives selection.
    pub fn build(
        &mut self,
        datasource: &Datasource,
        selection: &TestSelection,
    ) -> Result<SecurityAssessment, BuildError> {
        let catalog = self.catalog;
        let type_id = datasource.datasource_type_id;
        let tests = catalog.tests();

        let query: Vec<&AvailableTest> = tests
            .of_kind(TestKind::QueryBased, type_id)
            .into_iter()
            .filter(|t| selection.matches(t))
            .collect();
        let cve: Vec<&AvailableTest> = tests
            .of_kind(TestKind::Cve, type_id)
            .into_iter()
            .filter(|t| selection.matches(t))
            .collect();

        let assessment_id = self.next_assessment_id;
        let mut scheduled = Vec::with_capacity(query.len().saturating_add(cve.len()));

        for test in query {
            let Some(definition) = catalog.definitions().for_test(test.id) else {
                tracing::warn!(test_id = test.id, "Query test has no SQL definition, skipping");
                continue;
            };
            let mut assessment_test = self.schedule(assessment_id, test);
            assessment_test.definition = Some(definition.clone());
            scheduled.push(assessment_test);
        }

        for test in cve {
            let mut assessment_test = self.schedule(assessment_id, test);
            assessment_test.cve_fixes = catalog.cve_fixes().for_test(test.id).to_vec();
            scheduled.push(assessment_test);
        }

        if scheduled.is_empty() {
            return Err(BuildError::NothingToRun {
                datasource: datasource.name.clone(),
                datasource_type_id: type_id,
                scope: selection.scope,
                category: selection.category.clone(),
            });
        }

        self.next_assessment_id = self.next_assessment_id.saturating_add(1);
        let assessment = SecurityAssessment {
            id: assessment_id,
            description: describe(datasource, selection),
            datasource_names: vec![datasource.name.clone()],
            tests: scheduled,
            created_at: Utc::now(),
        };

        tracing::info!(
            assessment_id,
            datasource = %datasource.name,
            query_tests = assessment.count_of(TestKind::QueryBased),
            cve_tests = assessment.count_of(TestKind::Cve),
            "Built assessment"
        );
        Ok(assessment)
    }

    fn schedule(&mut self, assessment_id: i64, test: &AvailableTest) -> AssessmentTest {
        let id = self.next_assessment_test_id;
        self.next_assessment_test_id = self.next_assessment_test_id.saturating_add(1);
        AssessmentTest::new(id, assessment_id, test.clone())
    }
}

fn describe(datasource: &Datasource, selection: &TestSelection) -> String {
    match &selection.category {
        Some(category) => format!("{} assessment of {}", category, datasource.name),
        None => format!("Assessment of {}", datasource.name),
    }
}
