//! Handlers for revealed results and rankings.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/reveal` | `?caseId` required; login required |
//! | `GET`  | `/archive` | Optional `?limit` (alias `days`) |
//! | `GET`  | `/leaderboard/weekly` | Current ISO week of the community |

use axum::{
  Json,
  extract::State,
};
use docket_core::{
  ballot::{Aggregate, Choice},
  case::{Case, CaseStatus},
  keys::WeekKey,
  leaderboard::LeaderboardResponse,
  lifecycle, score,
  score::ScoreBreakdown,
  store::{Board, GameStore},
  streak::Streak,
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  error::{ApiError, QueryParams},
  platform::Platform,
  play::{CaseQuery, required_case_id},
  session::Caller,
};

// ─── Reveal ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealResponse {
  pub case:           Case,
  pub aggregate:      Aggregate,
  pub majority_index: usize,
  pub majority_label: String,
  pub percentages:    [u32; Choice::COUNT],
  /// All zeros when the caller did not vote.
  pub score:          ScoreBreakdown,
  pub streak:         Streak,
  pub leaderboard:    LeaderboardResponse,
}

/// `GET /reveal?caseId=<id>`
pub async fn reveal<S, P>(
  State(state): State<AppState<S, P>>,
  caller: Caller,
  QueryParams(query): QueryParams<CaseQuery>,
) -> Result<Json<RevealResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let user = state.require_user(&caller).await?;
  let case_id = required_case_id(query.case_id)?;
  let store = state.store.as_ref();
  let now = state.now();

  let case = lifecycle::load_case(store, &case_id, now).await?;
  if !case.is_revealed() {
    return Err(docket_core::Error::NotRevealed.into());
  }

  let aggregate = store
    .get_aggregate(&case.case_id)
    .await
    .map_err(ApiError::internal)?
    .filter(|a| a.tally.voters > 0)
    .ok_or(docket_core::Error::NoVotes)?;
  let majority_index = aggregate.tally.majority_index();

  let score = score::settle_score(store, &case, &user.user_id, now)
    .await?
    .unwrap_or_else(|| ScoreBreakdown::zero(&case.case_id, &user.user_id));
  let streak = store
    .get_streak(&case.community, &user.user_id)
    .await
    .map_err(ApiError::internal)?;
  let leaderboard = state
    .leaderboard(
      &Board::Case(case.case_id.clone()),
      Some(&user),
      state.rules.case_leaderboard_size,
    )
    .await?;

  Ok(Json(RevealResponse {
    majority_label: case.labels[majority_index].clone(),
    percentages: aggregate.tally.percentages(),
    majority_index,
    case,
    aggregate,
    score,
    streak,
    leaderboard,
  }))
}

// ─── Archive ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ArchiveQuery {
  #[serde(alias = "days")]
  pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
  pub case:           Case,
  pub aggregate:      Aggregate,
  pub majority_index: usize,
  pub majority_label: String,
  /// The caller's settled score, if any.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_score:     Option<ScoreBreakdown>,
}

#[derive(Debug, Serialize)]
pub struct ArchiveResponse {
  pub entries: Vec<ArchiveEntry>,
}

/// `GET /archive[?limit=N]`
///
/// Most recent revealed cases of the community, newest first. Cases that
/// drew no votes are left out.
pub async fn archive<S, P>(
  State(state): State<AppState<S, P>>,
  caller: Caller,
  QueryParams(query): QueryParams<ArchiveQuery>,
) -> Result<Json<ArchiveResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let store = state.store.as_ref();
  let community = state.community(&caller);
  let user = state.identify(&caller).await?;
  let limit = state.rules.archive_limit(query.limit);

  let cases = store
    .recent_cases(&community, CaseStatus::Revealed, limit)
    .await
    .map_err(ApiError::internal)?;

  let mut entries = Vec::with_capacity(cases.len());
  for case in cases {
    let Some(aggregate) = store
      .get_aggregate(&case.case_id)
      .await
      .map_err(ApiError::internal)?
      .filter(|a| a.tally.voters > 0)
    else {
      continue;
    };
    let user_score = match &user {
      Some(u) => store
        .get_score(&case.case_id, &u.user_id)
        .await
        .map_err(ApiError::internal)?,
      None => None,
    };
    let majority_index = aggregate.tally.majority_index();
    entries.push(ArchiveEntry {
      majority_label: case.labels[majority_index].clone(),
      majority_index,
      case,
      aggregate,
      user_score,
    });
  }

  Ok(Json(ArchiveResponse { entries }))
}

// ─── Weekly leaderboard ──────────────────────────────────────────────────────

/// `GET /leaderboard/weekly`
pub async fn weekly_leaderboard<S, P>(
  State(state): State<AppState<S, P>>,
  caller: Caller,
) -> Result<Json<LeaderboardResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let user = state.identify(&caller).await?;
  let board = Board::Weekly {
    community: state.community(&caller),
    week:      WeekKey::of(state.now()),
  };
  let view = state
    .leaderboard(&board, user.as_ref(), state.rules.weekly_leaderboard_size)
    .await?;
  Ok(Json(view))
}
