use log::{debug, info, warn};

use crate::config::*;
use crate::validation::validate_draft;

/// The local +1 for this voter's own ballot.
///
/// `baseline` is the count of the candidate in the last snapshot known when
/// the submission started, or in the first snapshot seen after that if none
/// was known yet. The adjustment is retired as soon as a snapshot reports more
/// than the baseline. Without a baseline, it is never retired.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct OptimisticVote {
    pub candidate: CandidateId,
    pub baseline: Option<VoteCount>,
    pub retired: bool,
}

/// Proof that a submission was started. It must be handed back with the
/// outcome of the submission.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SubmissionTicket {
    attempt: u64,
    candidate: CandidateId,
    identity: Identity,
}

impl SubmissionTicket {
    pub fn candidate(&self) -> &CandidateId {
        &self.candidate
    }

    /// The identity to submit with.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

/// What a submission outcome did to the state machine.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SubmissionResult {
    Accepted(CandidateId),
    Rejected(SubmitFailure),
    /// The outcome does not belong to the current attempt and was ignored.
    Stale,
}

/// The ballot of the voter of one session.
///
/// The transition into `Submitting` is the only one that leads to a network
/// call, and it is guarded: nothing is sent while a submission is in flight or
/// once a ballot has been confirmed.
#[derive(Debug, Clone)]
pub struct BallotStateMachine {
    state: VoterBallotState,
    attempt: u64,
    baseline: Option<VoteCount>,
    optimistic: Option<OptimisticVote>,
}

impl Default for BallotStateMachine {
    fn default() -> Self {
        BallotStateMachine::new()
    }
}

impl BallotStateMachine {
    pub fn new() -> BallotStateMachine {
        BallotStateMachine {
            state: VoterBallotState::Unvoted,
            attempt: 0,
            baseline: None,
            optimistic: None,
        }
    }

    pub fn state(&self) -> &VoterBallotState {
        &self.state
    }

    /// The local increment, only while the state is `Confirmed` after a
    /// submission from this session.
    pub fn optimistic(&self) -> Option<&OptimisticVote> {
        match self.state {
            VoterBallotState::Confirmed(_) => self.optimistic.as_ref(),
            _ => None,
        }
    }

    pub fn has_voted(&self) -> bool {
        matches!(
            self.state,
            VoterBallotState::Confirmed(_) | VoterBallotState::AlreadyRecorded
        )
    }

    /// Applies the answer of the prior ballot check done at session start.
    ///
    /// The backend already counts that ballot, so no local increment is kept.
    pub fn seed(&mut self, prior: &PriorBallot) {
        if self.state != VoterBallotState::Unvoted {
            debug!("seed: ignoring prior ballot, state is {:?}", self.state);
            return;
        }
        match (prior.has_voted, &prior.candidate) {
            (true, Some(cid)) => {
                info!("seed: voter already voted for {}", cid);
                self.state = VoterBallotState::Confirmed(cid.clone());
            }
            (true, None) => {
                warn!("seed: voter already voted, but the backend did not say for whom");
                self.state = VoterBallotState::AlreadyRecorded;
            }
            (false, _) => {}
        }
    }

    /// Starts a submission for the draft's candidate.
    ///
    /// Arguments:
    /// * `identity` the current identity, if any
    /// * `draft` the ballot to submit
    /// * `baseline` the count of the draft's candidate in the last known
    ///   snapshot, `None` if no snapshot was seen yet
    ///
    /// Nothing changes if the cast is refused.
    pub fn begin(
        &mut self,
        identity: Option<&Identity>,
        draft: &BallotDraft,
        baseline: Option<VoteCount>,
    ) -> Result<SubmissionTicket, CastError> {
        if !self.state.accepts_cast() {
            info!("begin: refusing cast from state {:?}", self.state);
            return Err(CastError::AlreadyCast {
                state: self.state.clone(),
            });
        }
        let identity = match identity {
            Some(identity) => identity,
            None => return Err(CastError::NotAuthenticated {}),
        };
        if let Err(failures) = validate_draft(draft) {
            return Err(CastError::InvalidDraft { failures });
        }

        self.attempt += 1;
        self.baseline = baseline;
        let candidate = draft.candidate_id.clone();
        debug!(
            "begin: attempt {} for {} with baseline {:?}",
            self.attempt, candidate, baseline
        );
        self.state = VoterBallotState::Submitting(candidate.clone());
        Ok(SubmissionTicket {
            attempt: self.attempt,
            candidate,
            identity: identity.clone(),
        })
    }

    /// Records the outcome of the submission identified by `ticket`.
    pub fn complete(
        &mut self,
        ticket: &SubmissionTicket,
        outcome: Result<(), SubmitFailure>,
    ) -> SubmissionResult {
        let in_flight = matches!(&self.state, VoterBallotState::Submitting(cid) if *cid == ticket.candidate);
        if !in_flight || ticket.attempt != self.attempt {
            warn!(
                "complete: dropping outcome of attempt {} (current attempt {}, state {:?})",
                ticket.attempt, self.attempt, self.state
            );
            return SubmissionResult::Stale;
        }

        let candidate = ticket.candidate.clone();
        match outcome {
            Ok(()) => {
                info!("complete: ballot for {} confirmed", candidate);
                self.optimistic = Some(OptimisticVote {
                    candidate: candidate.clone(),
                    baseline: self.baseline,
                    retired: false,
                });
                self.state = VoterBallotState::Confirmed(candidate.clone());
                SubmissionResult::Accepted(candidate)
            }
            Err(SubmitFailure::AlreadyVoted {
                candidate: Some(server_cid),
            }) => {
                // The backend is the authority: adopt its answer.
                info!(
                    "complete: backend reports an existing ballot for {}",
                    server_cid
                );
                self.state = VoterBallotState::Confirmed(server_cid.clone());
                SubmissionResult::Rejected(SubmitFailure::AlreadyVoted {
                    candidate: Some(server_cid),
                })
            }
            Err(SubmitFailure::AlreadyVoted { candidate: None }) => {
                warn!("complete: backend reports an existing ballot, candidate unknown");
                self.state = VoterBallotState::AlreadyRecorded;
                SubmissionResult::Rejected(SubmitFailure::AlreadyVoted { candidate: None })
            }
            Err(failure) => {
                info!("complete: ballot for {} rejected: {}", candidate, failure);
                self.state = VoterBallotState::Rejected(candidate, failure.clone());
                SubmissionResult::Rejected(failure)
            }
        }
    }

    /// Takes the baseline from `snapshot` if none was known when the
    /// submission started. A baseline already set is never replaced.
    pub fn observe_snapshot(&mut self, snapshot: &TallySnapshot) {
        let candidate = match &self.state {
            VoterBallotState::Submitting(cid) if self.baseline.is_none() => cid.clone(),
            VoterBallotState::Confirmed(_) => {
                if let Some(opt) = self.optimistic.as_mut() {
                    if opt.baseline.is_none() && !opt.retired {
                        let seen = snapshot.count(&opt.candidate);
                        debug!("observe_snapshot: baseline {} for {}", seen, opt.candidate);
                        opt.baseline = Some(seen);
                    }
                }
                return;
            }
            _ => return,
        };
        let seen = snapshot.count(&candidate);
        debug!("observe_snapshot: baseline {} for {}", seen, candidate);
        self.baseline = Some(seen);
    }

    /// Marks the local increment as carried by the backend.
    pub fn retire_optimistic(&mut self) {
        if let Some(opt) = self.optimistic.as_mut() {
            if !opt.retired {
                debug!("retire_optimistic: {} now counted by the backend", opt.candidate);
                opt.retired = true;
            }
        }
    }
}
