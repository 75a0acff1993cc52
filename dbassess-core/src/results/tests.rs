//! Tests for result aggregation and ranking.

use super::*;
use crate::models::{
    AssessmentTest, AvailableTest, CheckOutcome, Datasource, Outcome, Severity, TestKind,
};
use proptest::prelude::*;

fn result(test_id: i64, severity: Severity, outcome: Outcome) -> TestResult {
    let test = AssessmentTest::new(test_id, 1, AvailableTest::new(test_id, 4, severity));
    let ds = Datasource::new("mssql-prod", 4, "sql1", 0);
    TestResult::record(
        &test,
        &ds,
        CheckOutcome::new(outcome, format!("result of {}", test_id)),
    )
}

fn ids(ranked: &[&TestResult]) -> Vec<i64> {
    ranked.iter().map(|r| r.test_id).collect()
}

#[test]
fn test_critical_failure_ranks_before_major_failure() {
    let mut aggregator = ResultAggregator::new();
    aggregator.record(result(2001, Severity::Major, Outcome::Fail));
    aggregator.record(result(2002, Severity::Critical, Outcome::Fail));

    let ranked = aggregator.ranked_list(&RankingPolicy::default());
    assert_eq!(ids(&ranked), vec![2002, 2001]);
}

#[test]
fn test_ranking_partitions_and_buckets() {
    let policy = RankingPolicy::from_ids([2086]);
    let mut aggregator = ResultAggregator::new();
    aggregator.extend([
        result(1500, Severity::Critical, Outcome::Fail),
        result(2100, Severity::Info, Outcome::Pass),
        result(2101, Severity::Minor, Outcome::Error),
        result(2102, Severity::Caution, Outcome::Fail),
        result(2086, Severity::Info, Outcome::Pass),
        result(2086, Severity::Critical, Outcome::Fail),
        result(5000, Severity::Major, Outcome::Pass),
        result(1501, Severity::Major, Outcome::NoReportData),
    ]);

    let ranked = aggregator.ranked_list(&policy);
    assert_eq!(
        ids(&ranked),
        vec![2086, 2086, 2102, 2101, 2100, 1500, 1501, 5000]
    );
    assert_eq!(ranked[0].outcome, Outcome::Fail);
    assert_eq!(ranked[1].outcome, Outcome::Pass);
}

#[test]
fn test_ranking_is_stable_within_bucket() {
    let mut aggregator = ResultAggregator::new();
    aggregator.extend([
        result(2300, Severity::Major, Outcome::Fail),
        result(2200, Severity::Major, Outcome::Fail),
        result(2250, Severity::Major, Outcome::Fail),
    ]);
    let policy = RankingPolicy::from_ids([]);
    assert_eq!(ids(&aggregator.ranked_list(&policy)), vec![2300, 2200, 2250]);
}

#[test]
fn test_unrecognized_severity_is_dropped() {
    let mut aggregator = ResultAggregator::new();
    aggregator.extend([
        result(2001, Severity::parse("HIGH"), Outcome::Fail),
        result(2002, Severity::Minor, Outcome::Fail),
    ]);

    let policy = RankingPolicy::default();
    assert_eq!(ids(&aggregator.ranked_list(&policy)), vec![2002]);

    let report = aggregator.into_report(&policy);
    assert_eq!(report.ranked.len(), 1);
    assert_eq!(report.dropped_from_ranking, 1);
    // Still counted in the summaries.
    assert_eq!(report.summary_all.total, 2);
}

#[test]
fn test_summary_scopes() {
    let mut aggregator = ResultAggregator::new();
    aggregator.extend([
        result(2001, Severity::Major, Outcome::Pass),
        result(2002, Severity::Major, Outcome::Fail),
        result(2003, Severity::Major, Outcome::Error),
        result(1001, Severity::Major, Outcome::CveNotReported),
        result(1002, Severity::Major, Outcome::Fail),
        result(42, Severity::Major, Outcome::NoCasData),
    ]);

    let all = aggregator.summary(Scope::All);
    assert_eq!(all.total, 6);
    assert_eq!(all.passed(), 1);
    assert_eq!(all.failed(), 2);
    assert_eq!(all.other, 3);
    assert_eq!(all.count(Outcome::NoCasData), 1);

    let query = aggregator.summary(Scope::QueryOnly);
    assert_eq!((query.total, query.other), (3, 1));

    let cve = aggregator.summary(Scope::CveOnly);
    assert_eq!((cve.total, cve.failed()), (2, 1));

    // Test 42 is outside both ranges.
    assert!(query.total + cve.total < all.total);
}

#[test]
fn test_modify_for_display_replaces_error_recommendations() {
    let mut aggregator = ResultAggregator::new();
    aggregator.extend([
        result(2001, Severity::Major, Outcome::Error),
        result(2002, Severity::Major, Outcome::UnsupportedDbVersion),
        result(2003, Severity::Major, Outcome::Fail),
    ]);
    let before: Vec<String> = aggregator
        .results()
        .iter()
        .map(|r| r.recommendation_text.clone())
        .collect();

    aggregator.modify_for_display();
    let results = aggregator.results();
    assert_eq!(results[0].recommendation_text, "result of 2001");
    assert_eq!(results[1].recommendation_text, before[1]);
    assert_eq!(results[2].recommendation_text, before[2]);
}

#[test]
fn test_into_report_applies_display_rules() {
    let mut aggregator = ResultAggregator::new();
    aggregator.record(result(2001, Severity::Major, Outcome::PreTestCheckFailed));
    let report = aggregator.into_report(&RankingPolicy::default());
    assert_eq!(report.ranked[0].recommendation_text, "result of 2001");
}

#[test]
fn test_clear_empties_aggregator() {
    let mut aggregator = ResultAggregator::new();
    aggregator.record(result(2001, Severity::Major, Outcome::Pass));
    aggregator.clear();
    assert!(aggregator.is_empty());
    assert_eq!(aggregator.summary(Scope::All).total, 0);
}

#[test]
fn test_overall_recommendation_bands() {
    let pick = |pass: usize, fail: usize| {
        let mut aggregator = ResultAggregator::new();
        for i in 0..pass {
            aggregator.record(result(2000 + i as i64, Severity::Info, Outcome::Pass));
        }
        for i in 0..fail {
            aggregator.record(result(2500 + i as i64, Severity::Info, Outcome::Fail));
        }
        aggregator.record(result(2999, Severity::Info, Outcome::Error));
        OverallRecommendation::for_summary(&aggregator.summary(Scope::All)).id
    };

    assert_eq!(pick(0, 0), 100);
    assert_eq!(pick(1, 9), 101);
    assert_eq!(pick(2, 8), 102);
    assert_eq!(pick(5, 5), 103);
    assert_eq!(pick(8, 2), 104);
    assert_eq!(pick(10, 0), 104);
}

#[test]
fn test_summary_serializes_outcome_names() {
    let mut aggregator = ResultAggregator::new();
    aggregator.record(result(2001, Severity::Major, Outcome::Fail));
    let json = serde_json::to_value(aggregator.summary(Scope::QueryOnly)).unwrap();
    assert_eq!(json["scope"], "query_only");
    assert_eq!(json["FAIL"], 1);
    assert_eq!(json["PASS"], 0);
    assert_eq!(json["total"], 1);
}

#[test]
fn test_report_to_json() {
    let mut aggregator = ResultAggregator::new();
    aggregator.record(result(2001, Severity::Major, Outcome::Fail));
    aggregator.record(result(1100, Severity::Minor, Outcome::Pass));

    let report = aggregator.into_report(&RankingPolicy::default());
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["overall"]["id"], 103);
    assert_eq!(json["summary_cve"]["PASS"], 1);
    assert_eq!(json["ranked"][0]["test_id"], 2001);
    assert_eq!(json["ranked"][0]["severity"], "MAJOR");
}

fn arb_outcome() -> impl Strategy<Value = Outcome> {
    (0..Outcome::ALL.len()).prop_map(|i| Outcome::ALL[i])
}

fn arb_severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Critical),
        Just(Severity::Major),
        Just(Severity::Minor),
        Just(Severity::Caution),
        Just(Severity::Info),
        Just(Severity::parse("HIGH")),
    ]
}

proptest! {
    #[test]
    fn prop_summary_counts_sum_to_total(
        entries in prop::collection::vec((0i64..4000, arb_severity(), arb_outcome()), 0..60)
    ) {
        let mut aggregator = ResultAggregator::new();
        for (id, severity, outcome) in &entries {
            aggregator.record(result(*id, severity.clone(), *outcome));
        }

        let all = aggregator.summary(Scope::All);
        prop_assert_eq!(all.total, entries.len());
        prop_assert_eq!(all.iter().map(|(_, n)| n).sum::<usize>(), entries.len());
        prop_assert_eq!(all.other + all.passed() + all.failed(), all.total);

        let query = aggregator.summary(Scope::QueryOnly);
        let cve = aggregator.summary(Scope::CveOnly);
        let in_ranges = entries
            .iter()
            .filter(|(id, _, _)| TestKind::from_test_id(*id) != TestKind::Other)
            .count();
        prop_assert_eq!(query.total + cve.total, in_ranges);
        prop_assert!(query.total + cve.total <= all.total);
    }

    #[test]
    fn prop_ranking_is_deterministic_subset(
        entries in prop::collection::vec((1000i64..3000, arb_severity(), arb_outcome()), 0..60)
    ) {
        let mut aggregator = ResultAggregator::new();
        for (id, severity, outcome) in &entries {
            aggregator.record(result(*id, severity.clone(), *outcome));
        }
        let policy = RankingPolicy::default();

        let first = ids(&aggregator.ranked_list(&policy));
        let second = ids(&aggregator.ranked_list(&policy));
        prop_assert_eq!(&first, &second);

        let recognized = entries.iter().filter(|(_, s, _)| s.rank().is_some()).count();
        prop_assert_eq!(first.len(), recognized);

        let mut expected: Vec<i64> = entries
            .iter()
            .filter(|(_, s, _)| s.rank().is_some())
            .map(|(id, _, _)| *id)
            .collect();
        let mut sorted = first.clone();
        expected.sort_unstable();
        sorted.sort_unstable();
        prop_assert_eq!(sorted, expected);
    }
}
