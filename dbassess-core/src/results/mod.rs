//! Result classification, ranking and summary statistics.
//!
//! A [`ResultAggregator`] holds the [`TestResult`]s of exactly one run. The
//! executor returns it as an owned value, so results never leak from one
//! run into the next.
//!
//! Reports are produced by [`ResultAggregator::into_report`], which applies
//! [`ResultAggregator::modify_for_display`] before it takes the summaries
//! and the ranked list.

mod ranking;
mod recommendation;
mod summary;

pub use ranking::{FULL_DETAIL_TEST_IDS, RankingPolicy};
pub use recommendation::OverallRecommendation;
pub use summary::Summary;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DbAssessError;
use crate::models::{Scope, TestResult};

/// Outcomes of one assessment run, in recording order.
///
/// # Example
/// ```rust
/// use dbassess_core::results::{RankingPolicy, ResultAggregator};
/// use dbassess_core::models::Scope;
///
/// let aggregator = ResultAggregator::new();
/// assert_eq!(aggregator.summary(Scope::All).total, 0);
/// assert!(aggregator.ranked_list(&RankingPolicy::default()).is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    results: Vec<TestResult>,
}

impl ResultAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every recorded result.
    pub fn clear(&mut self) {
        self.results.clear();
    }

    /// Appends one result.
    pub fn record(&mut self, result: TestResult) {
        tracing::trace!(
            test_id = result.test_id,
            outcome = %result.outcome,
            "Recorded test result"
        );
        self.results.push(result);
    }

    /// Recorded results in recording order.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Number of recorded results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Per-outcome counts for the results inside `scope`.
    pub fn summary(&self, scope: Scope) -> Summary {
        Summary::of(scope, &self.results)
    }

    /// Copies the result text into the recommendation of every result that
    /// was not evaluated to a verdict, so the diagnostic shows up in the
    /// recommendation column.
    pub fn modify_for_display(&mut self) {
        for result in &mut self.results {
            if !result.outcome.keeps_recommendation() {
                result.recommendation_text = result.result_text.clone();
            }
        }
    }

    /// Results in report order. Results with an unrecognized severity are
    /// left out.
    pub fn ranked_list(&self, policy: &RankingPolicy) -> Vec<&TestResult> {
        policy
            .rank(&self.results)
            .into_iter()
            .map(|i| &self.results[i])
            .collect()
    }

    /// Finalizes the run into a report.
    pub fn into_report(mut self, policy: &RankingPolicy) -> AssessmentReport {
        self.modify_for_display();

        let summary_all = self.summary(Scope::All);
        let summary_query = self.summary(Scope::QueryOnly);
        let summary_cve = self.summary(Scope::CveOnly);
        let overall = OverallRecommendation::for_summary(&summary_all);

        let order = policy.rank(&self.results);
        let dropped_from_ranking = self.results.len().saturating_sub(order.len());
        if dropped_from_ranking > 0 {
            tracing::warn!(
                dropped = dropped_from_ranking,
                "Results with unrecognized severity left out of the ranked list"
            );
        }

        let mut slots: Vec<Option<TestResult>> = self.results.into_iter().map(Some).collect();
        let ranked = order
            .into_iter()
            .filter_map(|i| slots.get_mut(i).and_then(Option::take))
            .collect();

        AssessmentReport {
            summary_all,
            summary_query,
            summary_cve,
            ranked,
            dropped_from_ranking,
            overall,
            generated_at: Utc::now(),
        }
    }
}

impl Extend<TestResult> for ResultAggregator {
    fn extend<I: IntoIterator<Item = TestResult>>(&mut self, iter: I) {
        for result in iter {
            self.record(result);
        }
    }
}

/// Everything a report renderer needs from one run.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentReport {
    pub summary_all: Summary,
    pub summary_query: Summary,
    pub summary_cve: Summary,
    /// Results in report order
    pub ranked: Vec<TestResult>,
    /// Results left out of `ranked` for having an unrecognized severity
    pub dropped_from_ranking: usize,
    pub overall: OverallRecommendation,
    pub generated_at: DateTime<Utc>,
}

impl AssessmentReport {
    /// Renders the report as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`DbAssessError::Serialization`] if a field fails to serialize.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|source| DbAssessError::Serialization {
            context: "assessment report".to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests;
