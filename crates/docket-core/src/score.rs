//! The scoring engine.
//!
//! A score is six independent components plus their sum. Everything here up
//! to [`compute`] is pure; [`settle_score`] adds memoisation through the
//! store so a `(case, user)` pair is scored at most once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  Error, Result,
  ballot::{Choice, Tally, Vote},
  case::{Case, CaseId, UserId},
  snapshot::Snapshot,
  store::{GameStore, Settlement},
  streak::streak_bonus,
};

pub const PREDICTION_POINTS: u32 = 60;
pub const VERDICT_POINTS: u32 = 30;
pub const MAX_TIMING_BONUS: u32 = 20;
pub const INFLUENCE_POINTS: u32 = 15;
/// Minimum gain, in percentage points, of a commenter's verdict share.
pub const INFLUENCE_THRESHOLD_PCT: f64 = 3.0;
pub const MINIGAME_POINTS_PER_BONUS: u32 = 50;
pub const MAX_MINIGAME_BONUS: u32 = 10;
/// Minigame submissions above this are clamped.
pub const MAX_MINIGAME_SCORE: u32 = 9999;

// ─── Breakdown ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
  pub case_id:          CaseId,
  pub user_id:          UserId,
  pub prediction_match: u32,
  pub verdict_match:    u32,
  pub timing_bonus:     u32,
  pub influence_bonus:  u32,
  pub streak_bonus:     u32,
  pub mini_game_bonus:  u32,
  pub total:            u32,
}

impl ScoreBreakdown {
  /// An all-zero breakdown, returned when a revealed case has nothing to
  /// score against.
  pub fn zero(case_id: impl Into<CaseId>, user_id: impl Into<UserId>) -> Self {
    Self {
      case_id:          case_id.into(),
      user_id:          user_id.into(),
      prediction_match: 0,
      verdict_match:    0,
      timing_bonus:     0,
      influence_bonus:  0,
      streak_bonus:     0,
      mini_game_bonus:  0,
      total:            0,
    }
  }

  pub fn components(&self) -> [u32; 6] {
    [
      self.prediction_match,
      self.verdict_match,
      self.timing_bonus,
      self.influence_bonus,
      self.streak_bonus,
      self.mini_game_bonus,
    ]
  }

  fn summed(mut self) -> Self {
    self.total = self.components().iter().sum();
    self
  }
}

// ─── Components ──────────────────────────────────────────────────────────────

/// Linear bonus for voting early: full at open, zero at or after close.
pub fn timing_bonus(
  open_ts: DateTime<Utc>,
  close_ts: DateTime<Utc>,
  vote_ts: DateTime<Utc>,
) -> u32 {
  let window = (close_ts - open_ts).num_milliseconds();
  if window <= 0 {
    return 0;
  }
  let offset = (vote_ts - open_ts).num_milliseconds().max(0);
  let late = (offset as f64 / window as f64).min(1.0);
  ((1.0 - late) * f64::from(MAX_TIMING_BONUS)).round() as u32
}

/// Awarded when the commenter's verdict gained enough share between the
/// snapshot taken at comment time and the final tally.
pub fn influence_bonus(
  verdict: Choice,
  at_comment: Option<&Tally>,
  final_tally: &Tally,
) -> u32 {
  match at_comment {
    Some(before)
      if final_tally.share_pct(verdict) - before.share_pct(verdict)
        >= INFLUENCE_THRESHOLD_PCT =>
    {
      INFLUENCE_POINTS
    }
    _ => 0,
  }
}

pub fn minigame_bonus(minigame_score: u32) -> u32 {
  (minigame_score / MINIGAME_POINTS_PER_BONUS).min(MAX_MINIGAME_BONUS)
}

/// Everything [`compute`] reads. All of it is fixed by the time a case is
/// revealed.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs<'a> {
  pub case:             &'a Case,
  pub vote:             &'a Vote,
  pub final_tally:      &'a Tally,
  /// First snapshot at or after the voter's first comment, if any.
  pub comment_snapshot: Option<&'a Snapshot>,
  /// Streak entering this case, before today's play is counted.
  pub streak_current:   u32,
  pub minigame_score:   u32,
}

pub fn compute(inputs: &ScoreInputs<'_>) -> ScoreBreakdown {
  let vote = inputs.vote;
  let majority = inputs.final_tally.majority_index();

  let prediction_match = if vote.prediction.index() == majority {
    PREDICTION_POINTS
  } else {
    0
  };
  let verdict_match = if vote.verdict.index() == majority {
    VERDICT_POINTS
  } else {
    0
  };
  let timing = if prediction_match > 0 {
    timing_bonus(inputs.case.open_ts, inputs.case.close_ts, vote.vote_ts)
  } else {
    0
  };
  let influence = if vote.first_comment_ts.is_some() {
    influence_bonus(
      vote.verdict,
      inputs.comment_snapshot.map(|s| &s.tally),
      inputs.final_tally,
    )
  } else {
    0
  };

  ScoreBreakdown {
    case_id: vote.case_id.clone(),
    user_id: vote.user_id.clone(),
    prediction_match,
    verdict_match,
    timing_bonus: timing,
    influence_bonus: influence,
    streak_bonus: streak_bonus(inputs.streak_current),
    mini_game_bonus: minigame_bonus(inputs.minigame_score),
    total: 0,
  }
  .summed()
}

// ─── Store-backed operations ─────────────────────────────────────────────────

/// Score `user_id` on `case` from current store contents without saving.
///
/// Returns `None` when the user did not vote or the case has no voters.
pub async fn compute_score<S: GameStore>(
  store: &S,
  case: &Case,
  user_id: &str,
) -> Result<Option<ScoreBreakdown>> {
  let Some(vote) = store
    .get_vote(&case.case_id, user_id)
    .await
    .map_err(Error::store)?
  else {
    return Ok(None);
  };
  let aggregate = match store
    .get_aggregate(&case.case_id)
    .await
    .map_err(Error::store)?
  {
    Some(a) if a.tally.voters > 0 => a,
    _ => return Ok(None),
  };

  let comment_snapshot = match vote.first_comment_ts {
    Some(ts) => store
      .snapshot_at_or_after(&case.case_id, ts)
      .await
      .map_err(Error::store)?,
    None => None,
  };
  let streak = store
    .get_streak(&case.community, user_id)
    .await
    .map_err(Error::store)?;
  let minigame_score = store
    .get_minigame_score(&case.case_id, user_id)
    .await
    .map_err(Error::store)?;

  Ok(Some(compute(&ScoreInputs {
    case,
    vote: &vote,
    final_tally: &aggregate.tally,
    comment_snapshot: comment_snapshot.as_ref(),
    streak_current: streak.current,
    minigame_score,
  })))
}

/// The persisted score for `user_id` on a revealed `case`, computing and
/// saving it on first access.
///
/// The store credits the weekly board and touches the streak in the same
/// step that creates the row, so racing or retrying callers never
/// double-count or lose the credit.
pub async fn settle_score<S: GameStore>(
  store: &S,
  case: &Case,
  user_id: &str,
  now: DateTime<Utc>,
) -> Result<Option<ScoreBreakdown>> {
  if !case.is_revealed() {
    return Err(Error::NotRevealed);
  }
  if let Some(existing) = store
    .get_score(&case.case_id, user_id)
    .await
    .map_err(Error::store)?
  {
    return Ok(Some(existing));
  }

  let Some(score) = compute_score(store, case, user_id).await? else {
    return Ok(None);
  };

  let saved = store
    .settle_score(Settlement {
      score,
      community: case.community.clone(),
      week: case.date_key.week(),
      date: case.date_key,
      at: now,
    })
    .await
    .map_err(Error::store)?;
  if saved.newly_saved {
    info!(
      case_id = %case.case_id,
      user_id,
      total = saved.score.total,
      "score settled"
    );
  }
  Ok(Some(saved.score))
}

/// Clamp and round a raw minigame score before it is recorded.
pub fn clamp_minigame_score(raw: f64) -> Option<u32> {
  if !raw.is_finite() {
    return None;
  }
  Some(raw.round().clamp(0.0, f64::from(MAX_MINIGAME_SCORE)) as u32)
}

/// Record a minigame result, keeping the best per `(case, user)`.
/// Returns the best score after this one.
pub async fn record_minigame_score<S: GameStore>(
  store: &S,
  case_id: &str,
  user_id: &str,
  raw: f64,
) -> Result<u32> {
  let score = clamp_minigame_score(raw)
    .ok_or_else(|| Error::InvalidInput("score must be a number".into()))?;
  store
    .record_minigame_score(case_id, user_id, score)
    .await
    .map_err(Error::store)
}
