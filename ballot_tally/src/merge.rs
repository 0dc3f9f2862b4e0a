use log::{debug, warn};

use crate::ballot::BallotStateMachine;
use crate::config::*;

/// What happened to the local increment of the voter's own ballot during a merge.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Adjustment {
    /// No local increment is pending.
    None,
    /// The snapshot does not count the ballot yet: +1 was added locally.
    Applied(CandidateId),
    /// The snapshot counts the ballot: the local increment must not be applied again.
    Retired(CandidateId),
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum MergeOutcome {
    Applied {
        tally: MergedTally,
        adjustment: Adjustment,
    },
    /// The snapshot would lower the displayed total. It is older than what is
    /// displayed and must be dropped.
    Stale {
        displayed_total: VoteCount,
        snapshot_total: VoteCount,
    },
}

/// Combines a new snapshot with the voter's own ballot.
///
/// The snapshot is the base. If the voter's ballot was confirmed in this
/// session and the snapshot still shows the candidate at or below the count
/// seen before submitting, one vote is added locally to that candidate. While
/// that count is unknown, the vote is always added.
/// The result is refused if its total is lower than the displayed one.
///
/// Nothing is mutated. The caller applies the outcome, including retiring the
/// local increment when asked to.
pub fn merge(
    current: &MergedTally,
    snapshot: &TallySnapshot,
    ballot: &BallotStateMachine,
) -> MergeOutcome {
    let mut counts = snapshot.counts().clone();
    let counted: VoteCount = counts.values().cloned().sum();
    if counted != snapshot.total() {
        warn!(
            "merge: snapshot reports a total of {} but its counts add up to {}, using the counts",
            snapshot.total(),
            counted
        );
    }

    let adjustment = match ballot.optimistic() {
        Some(opt) if !opt.retired => {
            let seen = snapshot.count(&opt.candidate);
            if opt.baseline.map(|baseline| seen > baseline).unwrap_or(false) {
                debug!(
                    "merge: snapshot counts {} for {} (baseline {:?}), retiring local vote",
                    seen, opt.candidate, opt.baseline
                );
                Adjustment::Retired(opt.candidate.clone())
            } else {
                *counts.entry(opt.candidate.clone()).or_insert(VoteCount::EMPTY) += VoteCount::ONE;
                Adjustment::Applied(opt.candidate.clone())
            }
        }
        _ => Adjustment::None,
    };

    let local = match &adjustment {
        Adjustment::Applied(cid) => Some(cid.clone()),
        _ => None,
    };
    let tally = MergedTally::from_counts(counts, local);

    if tally.total() < current.total() {
        warn!(
            "merge: dropping stale snapshot from {}: total {} is below the displayed {}",
            snapshot.as_of(),
            tally.total(),
            current.total()
        );
        return MergeOutcome::Stale {
            displayed_total: current.total(),
            snapshot_total: tally.total(),
        };
    }

    MergeOutcome::Applied { tally, adjustment }
}
