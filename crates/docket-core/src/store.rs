//! The `GameStore` trait and the outcome types its operations return.
//!
//! The trait is implemented by storage backends (e.g. `docket-store-sqlite`).
//! The game operations in this crate and the HTTP layer depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  ballot::{Aggregate, Vote},
  case::{Case, CaseId, CaseStatus, CommunityId, UserId},
  keys::{CycleKey, DateKey, WeekKey},
  lifecycle::Transition,
  score::ScoreBreakdown,
  snapshot::Snapshot,
  streak::Streak,
  submission::{CaseSubmission, Review},
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of a create-if-absent write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inserted<T> {
  /// The stored value: the new one, or whatever was already there.
  pub value:   T,
  /// Whether this call created it.
  pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
  Recorded { vote: Vote, aggregate: Aggregate },
  /// A vote already exists for this `(case, user)`; nothing was changed.
  Duplicate,
  /// The case had left `open` or passed its close time.
  Closed,
  UnknownCase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transitioned {
  /// The case after the attempt.
  pub case:    Case,
  /// `false` when another writer had already moved the case on.
  pub applied: bool,
}

/// A computed score together with what its first save credits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
  pub score:     ScoreBreakdown,
  pub community: CommunityId,
  /// Weekly board the total is added to.
  pub week:      WeekKey,
  /// Calendar date the streak is touched for.
  pub date:      DateKey,
  pub at:        DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedScore {
  /// The authoritative score: ours if newly saved, otherwise the existing.
  pub score:       ScoreBreakdown,
  pub newly_saved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
  Accepted(CaseSubmission),
  RateLimited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
  Reviewed(CaseSubmission),
  NotFound,
  AlreadyReviewed,
}

// ─── Leaderboards ────────────────────────────────────────────────────────────

/// A ranked score table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Board {
  /// Totals of every scored voter on one case.
  Case(CaseId),
  /// Points accumulated across a community's cases in one ISO week.
  Weekly { community: CommunityId, week: WeekKey },
}

/// One row of a board. Rows are ordered by score descending, then by when
/// the user first entered the board, then by user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
  pub user_id: UserId,
  pub score:   u64,
  /// 1-based position.
  pub rank:    u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a docket storage backend.
///
/// Operations that the game relies on for correctness under concurrent
/// callers are single atomic steps here: vote-plus-increment, guarded status
/// transitions, create-if-absent for cases, score settlement (score, weekly
/// points and streak together) and the submission rate limit. Callers never emulate them with a
/// read followed by a write.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait GameStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Cases ─────────────────────────────────────────────────────────────

  /// Insert `case` unless a case already exists for its community and cycle.
  /// When this call creates the case and `claim` names a submission, that
  /// submission is marked as used by the case in the same step.
  fn insert_case_if_absent(
    &self,
    case: Case,
    claim: Option<String>,
  ) -> impl Future<Output = Result<Inserted<Case>, Self::Error>> + Send + '_;

  fn get_case<'a>(
    &'a self,
    case_id: &'a str,
  ) -> impl Future<Output = Result<Option<Case>, Self::Error>> + Send + 'a;

  fn get_case_for_cycle<'a>(
    &'a self,
    community: &'a str,
    cycle: CycleKey,
  ) -> impl Future<Output = Result<Option<Case>, Self::Error>> + Send + 'a;

  /// Move a case from `transition.from` to `transition.to`. A no-op when the
  /// case is no longer in `from`. Returns `None` if the case does not exist.
  fn transition_case<'a>(
    &'a self,
    case_id: &'a str,
    transition: Transition,
  ) -> impl Future<Output = Result<Option<Transitioned>, Self::Error>> + Send + 'a;

  /// Set the post id if none is set yet. Returns whether it was set.
  fn set_case_post_id<'a>(
    &'a self,
    case_id: &'a str,
    post_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Replace the content and timing of a case that is still open. Returns
  /// `None` when the case is missing or has left `open`.
  fn reopen_case(
    &self,
    case: Case,
  ) -> impl Future<Output = Result<Option<Case>, Self::Error>> + Send + '_;

  /// The most recently opened cases of a community in `status`, newest first.
  fn recent_cases<'a>(
    &'a self,
    community: &'a str,
    status: CaseStatus,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Case>, Self::Error>> + Send + 'a;

  /// Every case currently in `status`, across communities, oldest first.
  fn cases_with_status(
    &self,
    status: CaseStatus,
  ) -> impl Future<Output = Result<Vec<Case>, Self::Error>> + Send + '_;

  // ── Votes and aggregates ──────────────────────────────────────────────

  /// Insert `vote` and increment the case aggregate as one atomic step.
  /// Refused unless the case is `open` and `vote_ts` is before its close.
  fn cast_vote(
    &self,
    vote: Vote,
  ) -> impl Future<Output = Result<VoteOutcome, Self::Error>> + Send + '_;

  fn get_vote<'a>(
    &'a self,
    case_id: &'a str,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<Vote>, Self::Error>> + Send + 'a;

  /// Set `first_comment_ts` on a vote if unset. Returns the vote afterwards,
  /// or `None` when the user has not voted.
  fn mark_first_comment<'a>(
    &'a self,
    case_id: &'a str,
    user_id: &'a str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Vote>, Self::Error>> + Send + 'a;

  fn get_aggregate<'a>(
    &'a self,
    case_id: &'a str,
  ) -> impl Future<Output = Result<Option<Aggregate>, Self::Error>> + Send + 'a;

  // ── Snapshots ─────────────────────────────────────────────────────────

  /// Persist the current aggregate of a case at `at` (zeros if none). A
  /// second snapshot at the same instant returns the first unchanged.
  fn take_snapshot<'a>(
    &'a self,
    case_id: &'a str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Snapshot, Self::Error>> + Send + 'a;

  /// The earliest snapshot with `ts >= at`.
  fn snapshot_at_or_after<'a>(
    &'a self,
    case_id: &'a str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Snapshot>, Self::Error>> + Send + 'a;

  // ── Scores and leaderboards ───────────────────────────────────────────

  /// Save the settlement's score unless one exists for its `(case, user)`.
  ///
  /// The save that creates the row also adds its total to the weekly board
  /// and applies [`Streak::touched`] for the settlement date, in the same
  /// atomic step. Later calls change nothing and return the stored score.
  fn settle_score(
    &self,
    settlement: Settlement,
  ) -> impl Future<Output = Result<SavedScore, Self::Error>> + Send + '_;

  fn get_score<'a>(
    &'a self,
    case_id: &'a str,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<ScoreBreakdown>, Self::Error>> + Send + 'a;

  fn leaderboard_top<'a>(
    &'a self,
    board: &'a Board,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Standing>, Self::Error>> + Send + 'a;

  /// A single user's row, wherever they rank.
  fn leaderboard_standing<'a>(
    &'a self,
    board: &'a Board,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<Standing>, Self::Error>> + Send + 'a;

  fn leaderboard_size<'a>(
    &'a self,
    board: &'a Board,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  // ── Streaks ───────────────────────────────────────────────────────────

  /// The user's streak in a community; default when they never played.
  fn get_streak<'a>(
    &'a self,
    community: &'a str,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Streak, Self::Error>> + Send + 'a;

  // ── Minigame ──────────────────────────────────────────────────────────

  /// Keep the maximum of the stored and given score. Returns the best.
  fn record_minigame_score<'a>(
    &'a self,
    case_id: &'a str,
    user_id: &'a str,
    score: u32,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + 'a;

  /// Best minigame score, 0 when none was recorded.
  fn get_minigame_score<'a>(
    &'a self,
    case_id: &'a str,
    user_id: &'a str,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + 'a;

  // ── Submissions ───────────────────────────────────────────────────────

  /// Store a pending submission unless the user already made
  /// `daily_limit` submissions on the UTC date of `submitted_at`.
  fn submit_case(
    &self,
    submission: CaseSubmission,
    daily_limit: u32,
  ) -> impl Future<Output = Result<SubmitOutcome, Self::Error>> + Send + '_;

  fn get_submission<'a>(
    &'a self,
    submission_id: &'a str,
  ) -> impl Future<Output = Result<Option<CaseSubmission>, Self::Error>> + Send + 'a;

  /// Pending submissions of a community, oldest first.
  fn pending_submissions<'a>(
    &'a self,
    community: &'a str,
  ) -> impl Future<Output = Result<Vec<CaseSubmission>, Self::Error>> + Send + 'a;

  /// Review a submission that is still pending.
  fn review_submission<'a>(
    &'a self,
    submission_id: &'a str,
    review: Review,
    reviewer: &'a str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<ReviewOutcome, Self::Error>> + Send + 'a;

  /// The earliest-approved submission assigned to `date` that no case has
  /// used yet.
  fn claimable_submission<'a>(
    &'a self,
    community: &'a str,
    date: DateKey,
  ) -> impl Future<Output = Result<Option<CaseSubmission>, Self::Error>> + Send + 'a;

  // ── Usernames ─────────────────────────────────────────────────────────

  fn cache_username<'a>(
    &'a self,
    user_id: &'a str,
    username: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn cached_username<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;
}
