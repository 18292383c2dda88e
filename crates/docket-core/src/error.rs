//! Error types for `docket-core`.

use thiserror::Error;

use crate::submission::SubmissionProblem;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  InvalidInput(String),

  #[error(transparent)]
  Submission(#[from] SubmissionProblem),

  #[error("You have already voted on this case")]
  DuplicateVote,

  #[error("Voting is closed for this case")]
  VotingClosed,

  #[error("Case is no longer open")]
  CaseNotOpen,

  #[error("Results not yet revealed")]
  NotRevealed,

  #[error("Submission not found or already reviewed")]
  AlreadyReviewed,

  #[error("Case not found")]
  CaseNotFound,

  #[error("Submission not found or already reviewed")]
  SubmissionNotFound,

  #[error("No votes recorded")]
  NoVotes,

  #[error("You can only submit {0} cases per day")]
  RateLimited(u32),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
  /// Wrap a backend error raised by a [`GameStore`](crate::store::GameStore).
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
