//! Report ordering.
//!
//! Results are ordered by three keys, most significant first:
//!
//! 1. partition: full-detail query tests, other query tests, then CVE and
//!    everything else
//! 2. outcome bucket: FAIL, then non-evaluated outcomes, then PASS
//! 3. severity: CRITICAL, MAJOR, MINOR, CAUTION, INFO
//!
//! The sort is stable. Results whose severity is none of the five levels
//! have no place in this order and are left out.

use std::collections::BTreeSet;

use crate::models::{Outcome, TestKind, TestResult};

/// Query tests whose reports carry full detail, as shipped by older
/// releases. Used when the catalog has no `full_detail.dump`.
pub const FULL_DETAIL_TEST_IDS: [i64; 75] = [
    2086, 2111, 2113, 2114, 2115, 2198, 2201, 2251, 2258, 2259, 2273, 2276, 2278, 2279, 2280, 2281,
    2282, 2284, 2286, 2308, 2013, 2011, 2009, 2004, 2194, 2289, 2296, 2298, 2301, 2313, 2053, 2052,
    2051, 2050, 2049, 2022, 2021, 2015, 2016, 2311, 2312, 2373, 2378, 2381, 2453, 2062, 2063, 2067,
    2068, 2069, 2070, 2072, 2075, 2079, 2081, 2214, 2215, 2216, 2217, 2219, 2220, 2222, 2224, 2227,
    2229, 2048, 2046, 2036, 2035, 2032, 2034, 2029, 2026, 2023, 2024,
];

/// The set of full-detail query tests that leads the ranked list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingPolicy {
    full_detail: BTreeSet<i64>,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self::from_ids(FULL_DETAIL_TEST_IDS)
    }
}

impl RankingPolicy {
    /// Creates a policy from an explicit allow-list.
    pub fn from_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            full_detail: ids.into_iter().collect(),
        }
    }

    /// True when `test_id` is on the full-detail list.
    pub fn is_full_detail(&self, test_id: i64) -> bool {
        self.full_detail.contains(&test_id)
    }

    /// Number of listed tests.
    pub fn len(&self) -> usize {
        self.full_detail.len()
    }

    /// True when no test is listed.
    pub fn is_empty(&self) -> bool {
        self.full_detail.is_empty()
    }

    /// Indices of `results` in report order.
    pub(crate) fn rank(&self, results: &[TestResult]) -> Vec<usize> {
        let mut keyed: Vec<((u8, u8, usize), usize)> = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| {
                let severity = r.severity.rank()?;
                Some(((self.partition(r), bucket(r.outcome), severity), i))
            })
            .collect();
        keyed.sort_by_key(|(key, _)| *key);
        keyed.into_iter().map(|(_, i)| i).collect()
    }

    fn partition(&self, result: &TestResult) -> u8 {
        match result.kind {
            TestKind::QueryBased if self.is_full_detail(result.test_id) => 0,
            TestKind::QueryBased => 1,
            TestKind::Cve | TestKind::Other => 2,
        }
    }
}

fn bucket(outcome: Outcome) -> u8 {
    match outcome {
        Outcome::Fail => 0,
        Outcome::Pass => 2,
        _ => 1,
    }
}
