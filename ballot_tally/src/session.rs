use log::{debug, info, warn};

use crate::backend::BallotBackend;
use crate::ballot::{BallotStateMachine, SubmissionResult, SubmissionTicket};
use crate::config::*;
use crate::merge::{merge, Adjustment, MergeOutcome};
use crate::ranking::rank;

/// What became of a snapshot handed to the session.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SnapshotApplied {
    Applied,
    /// Older than what is displayed. Nothing changed.
    Stale,
    /// The session is closed.
    Discarded,
}

/// The state of one voter in front of the live tally.
///
/// The session is the only owner of the ballot state, the last snapshot and
/// the displayed tally. Events (snapshots, submission outcomes) are applied one
/// at a time through `&mut self`, in the order they arrive.
#[derive(Debug)]
pub struct VotingSession {
    identity: Option<Identity>,
    ballot: BallotStateMachine,
    last_snapshot: Option<TallySnapshot>,
    displayed: MergedTally,
    closed: bool,
}

impl VotingSession {
    pub fn new(identity: Option<Identity>) -> VotingSession {
        VotingSession {
            identity,
            ballot: BallotStateMachine::new(),
            last_snapshot: None,
            displayed: MergedTally::empty(),
            closed: false,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn ballot_state(&self) -> &VoterBallotState {
        self.ballot.state()
    }

    pub fn has_voted(&self) -> bool {
        self.ballot.has_voted()
    }

    pub fn displayed(&self) -> &MergedTally {
        &self.displayed
    }

    pub fn last_snapshot(&self) -> Option<&TallySnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn ranking(&self) -> Vec<RankedCandidate> {
        rank(&self.displayed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Seeds the ballot state from the prior ballot check.
    pub fn seed_prior_ballot(&mut self, prior: &PriorBallot) {
        self.ballot.seed(prior);
    }

    /// Asks the backend whether this voter already voted, and seeds the state
    /// with the answer. Without an identity, nothing is asked.
    pub async fn load_prior_ballot<B>(&mut self, backend: &B) -> Result<(), BackendError>
    where
        B: BallotBackend + ?Sized,
    {
        let identity = match &self.identity {
            Some(identity) => identity.clone(),
            None => return Ok(()),
        };
        let prior = backend.check_prior_ballot(&identity).await?;
        debug!("load_prior_ballot: {:?}", prior);
        if !self.closed {
            self.seed_prior_ballot(&prior);
        }
        Ok(())
    }

    /// Starts a cast. On success the caller must submit the draft and hand
    /// the outcome back to [`VotingSession::complete_cast`].
    pub fn begin_cast(&mut self, draft: &BallotDraft) -> Result<SubmissionTicket, CastError> {
        if self.closed {
            return Err(CastError::SessionClosed {});
        }
        // Without a snapshot yet, the baseline comes from the first one applied.
        let baseline = self
            .last_snapshot
            .as_ref()
            .map(|s| s.count(&draft.candidate_id));
        self.ballot.begin(self.identity.as_ref(), draft, baseline)
    }

    /// Applies the outcome of a submission started with `begin_cast`.
    pub fn complete_cast(
        &mut self,
        ticket: &SubmissionTicket,
        outcome: Result<(), SubmitFailure>,
    ) -> SubmissionResult {
        if self.closed {
            debug!("complete_cast: session closed, dropping outcome {:?}", outcome);
            return SubmissionResult::Stale;
        }
        let res = self.ballot.complete(ticket, outcome);
        match &res {
            SubmissionResult::Accepted(_) => self.recompute(),
            SubmissionResult::Rejected(SubmitFailure::NotAuthenticated {}) => {
                info!("complete_cast: credential refused, dropping identity");
                self.identity = None;
            }
            SubmissionResult::Rejected(_) | SubmissionResult::Stale => {}
        }
        res
    }

    /// Casts a ballot and waits for the backend's answer.
    ///
    /// No request is sent if the cast is refused locally.
    pub async fn cast_vote<B>(
        &mut self,
        backend: &B,
        draft: &BallotDraft,
    ) -> Result<CandidateId, CastError>
    where
        B: BallotBackend + ?Sized,
    {
        let ticket = self.begin_cast(draft)?;
        let outcome = backend.submit_ballot(draft, ticket.identity()).await;
        match self.complete_cast(&ticket, outcome) {
            SubmissionResult::Accepted(cid) => Ok(cid),
            SubmissionResult::Rejected(failure) => Err(CastError::Rejected { source: failure }),
            SubmissionResult::Stale => Err(CastError::SessionClosed {}),
        }
    }

    /// Merges a new snapshot into the displayed tally.
    pub fn apply_snapshot(&mut self, snapshot: TallySnapshot) -> SnapshotApplied {
        if self.closed {
            debug!("apply_snapshot: session closed, dropping snapshot");
            return SnapshotApplied::Discarded;
        }
        let mut ballot = self.ballot.clone();
        ballot.observe_snapshot(&snapshot);
        match merge(&self.displayed, &snapshot, &ballot) {
            MergeOutcome::Applied { tally, adjustment } => {
                self.ballot = ballot;
                if let Adjustment::Retired(_) = adjustment {
                    self.ballot.retire_optimistic();
                }
                self.displayed = tally;
                self.last_snapshot = Some(snapshot);
                SnapshotApplied::Applied
            }
            MergeOutcome::Stale { .. } => SnapshotApplied::Stale,
        }
    }

    /// Closes the session. Later snapshots and submission outcomes are dropped.
    pub fn close(&mut self) {
        if !self.closed {
            info!("close: voting session closed");
            self.closed = true;
        }
    }

    // Re-merges the last snapshot after a state transition.
    fn recompute(&mut self) {
        let base = self
            .last_snapshot
            .clone()
            .unwrap_or_else(TallySnapshot::empty);
        match merge(&self.displayed, &base, &self.ballot) {
            MergeOutcome::Applied { tally, adjustment } => {
                if let Adjustment::Retired(_) = adjustment {
                    self.ballot.retire_optimistic();
                }
                self.displayed = tally;
            }
            MergeOutcome::Stale {
                displayed_total,
                snapshot_total,
            } => {
                warn!(
                    "recompute: kept displayed total {} over {}",
                    displayed_total, snapshot_total
                );
            }
        }
    }
}
