/*!
One-ballot-per-voter casting and live tally reconciliation.

A [`VotingSession`] owns the state of one voter in front of a live tally: the
[`BallotStateMachine`] enforcing that at most one ballot leaves this session,
the last [`TallySnapshot`] read from the backend, and the [`MergedTally`] that
is displayed. Snapshots come from the [`poller`], which reads the backend at a
fixed interval without ever overlapping two reads.

See the [`manual`] for the reconciliation rules.
*/

mod config;

pub mod backend;
pub mod ballot;
pub mod builder;
pub mod manual;
pub mod merge;
pub mod poller;
pub mod ranking;
pub mod session;
pub mod validation;

pub use crate::backend::BallotBackend;
pub use crate::ballot::{BallotStateMachine, OptimisticVote, SubmissionResult, SubmissionTicket};
pub use crate::config::*;
pub use crate::merge::{merge, Adjustment, MergeOutcome};
pub use crate::poller::{PollerHandle, SnapshotFeed};
pub use crate::ranking::{percentage, rank};
pub use crate::session::{SnapshotApplied, VotingSession};
pub use crate::validation::{validate_draft, BallotField, FieldFailure, FieldProblem};
