//! Votes and the running per-case tally.
//!
//! A vote is created exactly once per `(case, user)`. The aggregate for a
//! case only ever changes by one operation: add one to a verdict count and
//! one to the voter total. Backends must apply that increment atomically
//! with the vote insert (see [`GameStore::cast_vote`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  Error, Result,
  case::{Case, CaseId, UserId},
  store::{GameStore, VoteOutcome},
};

// ─── Choice ──────────────────────────────────────────────────────────────────

/// An index into a case's four labels.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "u8")]
pub struct Choice(u8);

impl Choice {
  pub const COUNT: usize = 4;

  pub fn new(index: i64) -> Option<Self> {
    u8::try_from(index)
      .ok()
      .filter(|i| usize::from(*i) < Self::COUNT)
      .map(Self)
  }

  pub fn index(self) -> usize { usize::from(self.0) }

  pub fn all() -> impl Iterator<Item = Self> { (0..Self::COUNT as u8).map(Self) }
}

impl TryFrom<i64> for Choice {
  type Error = Error;

  fn try_from(index: i64) -> Result<Self> {
    Self::new(index)
      .ok_or_else(|| Error::InvalidInput(format!("choice index out of range: {index}")))
  }
}

impl From<Choice> for u8 {
  fn from(choice: Choice) -> Self { choice.0 }
}

// ─── Vote ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
  pub case_id:          CaseId,
  pub user_id:          UserId,
  #[serde(rename = "verdictIndex")]
  pub verdict:          Choice,
  #[serde(rename = "predictionIndex")]
  pub prediction:       Choice,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub vote_ts:          DateTime<Utc>,
  #[serde(with = "chrono::serde::ts_milliseconds_option")]
  pub first_comment_ts: Option<DateTime<Utc>>,
}

// ─── Tally ───────────────────────────────────────────────────────────────────

/// Per-verdict counts plus the voter total (always their sum).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
  pub counts: [u32; Choice::COUNT],
  pub voters: u32,
}

impl Tally {
  pub fn from_counts(counts: [u32; Choice::COUNT]) -> Self {
    Self {
      counts,
      voters: counts.iter().sum(),
    }
  }

  /// The tally after one more vote for `verdict`.
  pub fn with_vote(mut self, verdict: Choice) -> Self {
    self.counts[verdict.index()] += 1;
    self.voters += 1;
    self
  }

  /// Index of the highest count. Ties go to the lowest index.
  pub fn majority_index(&self) -> usize { majority_index(&self.counts) }

  /// Whole-number share of each verdict, rounded half up.
  pub fn percentages(&self) -> [u32; Choice::COUNT] {
    percentages(&self.counts, self.voters)
  }

  /// Share of `verdict` in percent, unrounded.
  pub fn share_pct(&self, verdict: Choice) -> f64 {
    f64::from(self.counts[verdict.index()]) / f64::from(self.voters.max(1)) * 100.0
  }
}

pub fn majority_index(counts: &[u32; Choice::COUNT]) -> usize {
  let mut best = 0;
  let mut best_count = 0;
  for (i, &count) in counts.iter().enumerate() {
    if count > best_count {
      best = i;
      best_count = count;
    }
  }
  best
}

pub fn percentages(counts: &[u32; Choice::COUNT], voters: u32) -> [u32; Choice::COUNT] {
  let total = f64::from(voters.max(1));
  counts.map(|c| (f64::from(c) / total * 100.0).round() as u32)
}

// ─── Aggregate ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
  pub case_id:         CaseId,
  #[serde(flatten)]
  pub tally:           Tally,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub last_updated_ts: DateTime<Utc>,
}

impl Aggregate {
  pub fn empty(case_id: impl Into<CaseId>, at: DateTime<Utc>) -> Self {
    Self {
      case_id:         case_id.into(),
      tally:           Tally::default(),
      last_updated_ts: at,
    }
  }
}

// ─── Operations ──────────────────────────────────────────────────────────────

/// Record a vote on `case` and return it with the updated aggregate.
///
/// The caller is expected to have brought `case.status` up to date for
/// `now` first.
pub async fn cast_vote<S: GameStore>(
  store: &S,
  case: &Case,
  user_id: &str,
  verdict: Choice,
  prediction: Choice,
  now: DateTime<Utc>,
) -> Result<(Vote, Aggregate)> {
  if !case.accepts_votes(now) {
    return Err(Error::VotingClosed);
  }

  let vote = Vote {
    case_id: case.case_id.clone(),
    user_id: user_id.to_owned(),
    verdict,
    prediction,
    vote_ts: now,
    first_comment_ts: None,
  };

  match store.cast_vote(vote).await.map_err(Error::store)? {
    VoteOutcome::Recorded { vote, aggregate } => {
      debug!(
        case_id = %vote.case_id,
        user_id = %vote.user_id,
        voters = aggregate.tally.voters,
        "vote recorded"
      );
      Ok((vote, aggregate))
    }
    VoteOutcome::Duplicate => Err(Error::DuplicateVote),
    VoteOutcome::Closed => Err(Error::VotingClosed),
    VoteOutcome::UnknownCase => Err(Error::CaseNotFound),
  }
}

/// Note the first time a voter commented on a case. Later marks are
/// ignored. Returns `None` when the user has not voted.
pub async fn mark_first_comment<S: GameStore>(
  store: &S,
  case_id: &str,
  user_id: &str,
  now: DateTime<Utc>,
) -> Result<Option<Vote>> {
  store
    .mark_first_comment(case_id, user_id, now)
    .await
    .map_err(Error::store)
}
