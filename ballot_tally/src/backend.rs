use async_trait::async_trait;

use crate::config::*;

/// The backend that records ballots and counts them.
///
/// It is the authority on the one-ballot rule: the local checks only avoid
/// sending requests that are bound to fail.
#[async_trait]
pub trait BallotBackend: Send + Sync {
    /// Records the ballot. The draft has been validated already.
    async fn submit_ballot(
        &self,
        draft: &BallotDraft,
        identity: &Identity,
    ) -> Result<(), SubmitFailure>;

    /// Reads the current counts.
    async fn fetch_snapshot(&self, query: &SnapshotQuery) -> Result<TallySnapshot, BackendError>;

    /// Tells whether this voter already has a ballot on record.
    async fn check_prior_ballot(&self, identity: &Identity) -> Result<PriorBallot, BackendError>;
}
