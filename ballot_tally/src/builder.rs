use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

pub use crate::config::*;

/// A builder for tally snapshots.
///
/// Unless a reported total is given, the total is the sum of the counts.
///
/// ```
/// pub use ballot_tally::builder::SnapshotBuilder;
/// pub use ballot_tally::{CandidateId, VoteCount};
///
/// let snapshot = SnapshotBuilder::new()
///     .count("cand-1", 120)
///     .count("cand-2", 80)
///     .build();
///
/// assert_eq!(snapshot.total(), VoteCount(200));
/// assert_eq!(snapshot.count(&CandidateId::from("cand-2")), VoteCount(80));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    _counts: BTreeMap<CandidateId, VoteCount>,
    _reported_total: Option<VoteCount>,
    _as_of: Option<DateTime<Utc>>,
}

impl SnapshotBuilder {
    pub fn new() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Adds votes for a candidate. Counts for the same candidate accumulate.
    pub fn count(mut self, cid: impl Into<String>, count: u64) -> SnapshotBuilder {
        self.add_count(CandidateId::new(cid), VoteCount(count));
        self
    }

    pub fn add_count(&mut self, cid: CandidateId, count: VoteCount) {
        *self._counts.entry(cid).or_insert(VoteCount::EMPTY) += count;
    }

    /// The total as the backend reported it, when it is known separately from the counts.
    pub fn reported_total(mut self, total: u64) -> SnapshotBuilder {
        self._reported_total = Some(VoteCount(total));
        self
    }

    pub fn as_of(mut self, as_of: DateTime<Utc>) -> SnapshotBuilder {
        self._as_of = Some(as_of);
        self
    }

    pub fn build(self) -> TallySnapshot {
        let total = self
            ._reported_total
            .unwrap_or_else(|| self._counts.values().cloned().sum());
        TallySnapshot::new(self._counts, total, self._as_of.unwrap_or_else(Utc::now))
    }
}
