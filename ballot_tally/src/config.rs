// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::fmt::Display;
use std::ops::{Add, AddAssign};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::validation::FieldFailure;

/// The opaque identifier of a candidate, as handed out by the candidate catalog.
///
/// Identifiers are compared as strings. This ordering is the one used to break
/// ties in the ranking.
#[derive(
    Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CandidateId(pub String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> CandidateId {
        CandidateId(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CandidateId {
    fn from(s: &str) -> CandidateId {
        CandidateId(s.to_string())
    }
}

#[derive(
    Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VoteCount(pub u64);

impl VoteCount {
    pub const EMPTY: VoteCount = VoteCount(0);
    pub const ONE: VoteCount = VoteCount(1);
}

impl std::iter::Sum for VoteCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteCount(iter.map(|vc| vc.0).sum())
    }
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 += rhs.0;
    }
}

impl Add for VoteCount {
    type Output = VoteCount;
    fn add(self: VoteCount, rhs: VoteCount) -> VoteCount {
        VoteCount(self.0 + rhs.0)
    }
}

impl Display for VoteCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered candidate. Reference data owned by the catalog, never modified here.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub party: String,
}

/// The personal data typed by the voter in the confirmation dialog, along
/// with the candidate they picked.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct BallotDraft {
    pub candidate_id: CandidateId,
    pub full_name: String,
    pub national_id: String,
    pub phone: String,
    pub department: String,
    pub province: String,
    pub district: String,
    pub address: String,
}

/// The identity issued by the external authentication service.
#[derive(Eq, PartialEq, Clone)]
pub struct Identity {
    pub user_id: String,
    /// Opaque bearer credential.
    pub credential: String,
    pub is_admin: bool,
}

// The credential must never end up in the logs.
impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("credential", &"<redacted>")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

/// The answer of the backend to "has this voter already cast a ballot?".
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct PriorBallot {
    pub has_voted: bool,
    pub candidate: Option<CandidateId>,
}

// ******** Ballot state *********

/// Where the voter of this session stands.
///
/// Once `Confirmed`, the state never goes back to `Unvoted` or `Submitting`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum VoterBallotState {
    Unvoted,
    Submitting(CandidateId),
    Confirmed(CandidateId),
    /// The backend holds a ballot for this voter but did not say for whom.
    AlreadyRecorded,
    Rejected(CandidateId, SubmitFailure),
}

impl VoterBallotState {
    /// True if a new cast may be attempted from this state.
    pub fn accepts_cast(&self) -> bool {
        match self {
            VoterBallotState::Unvoted | VoterBallotState::Rejected(_, _) => true,
            VoterBallotState::Submitting(_)
            | VoterBallotState::Confirmed(_)
            | VoterBallotState::AlreadyRecorded => false,
        }
    }
}

// ******** Output data structures *********

/// The vote counts reported by the backend at one point in time.
///
/// Snapshots are replaced wholesale on every poll and never patched.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct TallySnapshot {
    counts: BTreeMap<CandidateId, VoteCount>,
    total: VoteCount,
    as_of: DateTime<Utc>,
}

impl TallySnapshot {
    pub fn new(
        counts: BTreeMap<CandidateId, VoteCount>,
        total: VoteCount,
        as_of: DateTime<Utc>,
    ) -> TallySnapshot {
        TallySnapshot {
            counts,
            total,
            as_of,
        }
    }

    pub fn empty() -> TallySnapshot {
        TallySnapshot::new(BTreeMap::new(), VoteCount::EMPTY, Utc::now())
    }

    pub fn counts(&self) -> &BTreeMap<CandidateId, VoteCount> {
        &self.counts
    }

    pub fn count(&self, cid: &CandidateId) -> VoteCount {
        self.counts.get(cid).cloned().unwrap_or(VoteCount::EMPTY)
    }

    /// The total as reported by the backend.
    pub fn total(&self) -> VoteCount {
        self.total
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }
}

/// The tally shown to the voter.
///
/// Invariant: `total` is the sum of `counts`. It can only be built through
/// `MergedTally::from_counts`, which computes the total.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize)]
pub struct MergedTally {
    counts: BTreeMap<CandidateId, VoteCount>,
    total: VoteCount,
    local_adjustment: Option<CandidateId>,
}

impl MergedTally {
    pub fn empty() -> MergedTally {
        MergedTally::default()
    }

    pub(crate) fn from_counts(
        counts: BTreeMap<CandidateId, VoteCount>,
        local_adjustment: Option<CandidateId>,
    ) -> MergedTally {
        let total = counts.values().cloned().sum();
        MergedTally {
            counts,
            total,
            local_adjustment,
        }
    }

    pub fn counts(&self) -> &BTreeMap<CandidateId, VoteCount> {
        &self.counts
    }

    pub fn count(&self, cid: &CandidateId) -> VoteCount {
        self.counts.get(cid).cloned().unwrap_or(VoteCount::EMPTY)
    }

    pub fn total(&self) -> VoteCount {
        self.total
    }

    /// The candidate carrying the local +1 of this voter's own ballot, if the
    /// backend has not reported it yet.
    pub fn local_adjustment(&self) -> Option<&CandidateId> {
        self.local_adjustment.as_ref()
    }
}

/// One row of the ranking.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct RankedCandidate {
    /// 1-based position.
    pub rank: u32,
    pub candidate_id: CandidateId,
    pub count: VoteCount,
    /// Between 0 and 100, rounded to one decimal.
    pub percentage: f64,
}

// ******** Errors *********

/// Why the backend refused a ballot.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum SubmitFailure {
    #[snafu(display("the backend does not recognize the voter's credential"))]
    NotAuthenticated {},
    #[snafu(display("the voter has already cast a ballot"))]
    AlreadyVoted { candidate: Option<CandidateId> },
    #[snafu(display("the ballot was rejected by the backend: {message}"))]
    ValidationRejected { message: String },
    #[snafu(display("the ballot could not be delivered, try again: {message}"))]
    Transient { message: String },
}

/// Errors of the read-only calls to the backend.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[snafu(display("transport error: {message}"))]
    Transport { message: String },
    #[snafu(display("the backend does not recognize the credential"))]
    Unauthorized {},
    #[snafu(display("unexpected response from the backend: {message}"))]
    InvalidResponse { message: String },
}

/// Reasons a cast is refused before anything is sent, or after the backend answered.
#[derive(Debug, Snafu, Clone, PartialEq)]
pub enum CastError {
    #[snafu(
        display("an authenticated identity is required to cast a ballot"),
        context(suffix(CastSnafu))
    )]
    NotAuthenticated {},
    #[snafu(display("the ballot is incomplete: {}", crate::validation::describe_failures(failures)))]
    InvalidDraft { failures: Vec<FieldFailure> },
    #[snafu(display("a ballot cannot be cast from state {state:?}"))]
    AlreadyCast { state: VoterBallotState },
    #[snafu(display("the voting session has been closed"))]
    SessionClosed {},
    #[snafu(display("{source}"))]
    Rejected { source: SubmitFailure },
}

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum PollError {
    #[snafu(display("the poller has been cancelled"))]
    Cancelled {},
    #[snafu(display("fetching the snapshot failed: {source}"))]
    FetchFailed { source: BackendError },
}

// ********* Configuration **********

/// Selects which election the snapshot is read for.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct SnapshotQuery {
    pub year: Option<u16>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub query: SnapshotQuery,
}

impl PollSettings {
    pub const DEFAULT_SETTINGS: PollSettings = PollSettings {
        interval: Duration::from_millis(10_000),
        query: SnapshotQuery { year: None },
    };
}

impl Default for PollSettings {
    fn default() -> PollSettings {
        PollSettings::DEFAULT_SETTINGS
    }
}
