use log::debug;

use crate::config::*;

/// Orders the candidates of a tally and computes their share of the total.
///
/// Candidates are sorted by decreasing count. Ties are broken by increasing
/// candidate identifier, so the order never depends on the order of the input.
///
/// ```
/// use ballot_tally::builder::SnapshotBuilder;
/// use ballot_tally::{merge, rank, BallotStateMachine, MergeOutcome, MergedTally};
///
/// let snapshot = SnapshotBuilder::new().count("A", 2).count("B", 1).build();
/// let tally = match merge(&MergedTally::empty(), &snapshot, &BallotStateMachine::new()) {
///     MergeOutcome::Applied { tally, .. } => tally,
///     MergeOutcome::Stale { .. } => unreachable!(),
/// };
/// let rows = rank(&tally);
/// assert_eq!(rows[0].candidate_id.as_str(), "A");
/// assert_eq!(rows[0].percentage, 66.7);
/// assert_eq!(rows[1].percentage, 33.3);
/// ```
pub fn rank(tally: &MergedTally) -> Vec<RankedCandidate> {
    let total = tally.total();
    let mut sorted: Vec<(&CandidateId, VoteCount)> =
        tally.counts().iter().map(|(cid, vc)| (cid, *vc)).collect();
    sorted.sort_by(|(cid1, vc1), (cid2, vc2)| vc2.cmp(vc1).then_with(|| cid1.cmp(cid2)));
    debug!("rank: sorted {:?} (total {})", sorted, total);

    sorted
        .into_iter()
        .enumerate()
        .map(|(idx, (cid, count))| RankedCandidate {
            rank: (idx + 1) as u32,
            candidate_id: cid.clone(),
            count,
            percentage: percentage(count, total),
        })
        .collect()
}

/// The share of `count` in `total`, in percent, rounded to one decimal.
/// A zero total gives 0.0.
pub fn percentage(count: VoteCount, total: VoteCount) -> f64 {
    if total == VoteCount::EMPTY {
        return 0.0;
    }
    (count.0 as f64 * 1000.0 / total.0 as f64).round() / 10.0
}
