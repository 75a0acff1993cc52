//! Per-outcome counts.

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::models::{Outcome, Scope, TestResult};

/// Outcome counts for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub scope: Scope,
    counts: [usize; Outcome::ALL.len()],
    /// Results that are neither PASS nor FAIL
    pub other: usize,
    pub total: usize,
}

impl Summary {
    /// Counts the results inside `scope`.
    pub fn of(scope: Scope, results: &[TestResult]) -> Self {
        let mut counts = [0usize; Outcome::ALL.len()];
        for result in results.iter().filter(|r| scope.includes(r.kind)) {
            let slot = &mut counts[result.outcome.index()];
            *slot = slot.saturating_add(1);
        }

        let total = counts.iter().sum();
        let other = Outcome::ALL
            .iter()
            .filter(|o| !o.is_evaluated())
            .map(|o| counts[o.index()])
            .sum();

        Self {
            scope,
            counts,
            other,
            total,
        }
    }

    /// Number of results with `outcome`.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.counts[outcome.index()]
    }

    /// Passed results.
    pub fn passed(&self) -> usize {
        self.count(Outcome::Pass)
    }

    /// Failed results.
    pub fn failed(&self) -> usize {
        self.count(Outcome::Fail)
    }

    /// Every outcome with its count, in [`Outcome::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Outcome, usize)> + '_ {
        Outcome::ALL
            .into_iter()
            .map(move |o| (o, self.count(o)))
    }

    /// Passed share of the evaluated results, `None` when nothing was
    /// evaluated.
    pub fn pass_ratio(&self) -> Option<f64> {
        let evaluated = self.passed().saturating_add(self.failed());
        (evaluated > 0).then(|| self.passed() as f64 / evaluated as f64)
    }
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Outcome::ALL.len() + 3))?;
        map.serialize_entry("scope", &self.scope)?;
        for (outcome, count) in self.iter() {
            map.serialize_entry(&outcome, &count)?;
        }
        map.serialize_entry("other", &self.other)?;
        map.serialize_entry("total", &self.total)?;
        map.end()
    }
}
