//! Handlers for taking part in the current case.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/me` | Caller identity and moderator flag |
//! | `GET`  | `/today` | Current case, own vote, and results once revealed |
//! | `GET`  | `/case` | `?caseId` required |
//! | `POST` | `/vote` | Body: [`VoteBody`]; login required |
//! | `POST` | `/comment-mark` | Body: `{"caseId":"..."}`; login required |
//! | `POST` | `/minigame-score` | Body: [`MinigameBody`]; login required |

use axum::{
  Json,
  extract::State,
};
use docket_core::{
  ballot::{self, Aggregate, Choice, Vote},
  case::Case,
  leaderboard::{ANONYMOUS, LeaderboardResponse},
  lifecycle, score,
  score::ScoreBreakdown,
  store::{Board, GameStore},
  streak::Streak,
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  error::{ApiError, JsonBody, QueryParams},
  platform::Platform,
  session::Caller,
};

/// `caseId` query parameter shared by several endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseQuery {
  pub case_id: Option<String>,
}

/// Non-blank `caseId` or a 400.
pub(crate) fn required_case_id(case_id: Option<String>) -> Result<String, ApiError> {
  case_id
    .map(|id| id.trim().to_owned())
    .filter(|id| !id.is_empty())
    .ok_or_else(|| ApiError::BadRequest("caseId is required".into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
  pub success: bool,
}

// ─── Me ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
  pub user_id:   String,
  pub username:  String,
  pub is_mod:    bool,
  pub community: String,
}

/// `GET /me`
pub async fn me<S, P>(
  State(state): State<AppState<S, P>>,
  caller: Caller,
) -> Result<Json<MeResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let community = state.community(&caller);
  let response = match state.identify(&caller).await? {
    Some(user) => MeResponse {
      is_mod: state.is_moderator(&community, &user).await?,
      user_id: user.user_id,
      username: user.username,
      community,
    },
    None => MeResponse {
      user_id: ANONYMOUS.into(),
      username: ANONYMOUS.into(),
      is_mod: false,
      community,
    },
  };
  Ok(Json(response))
}

// ─── Today ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayResponse {
  pub case:        Case,
  pub user_vote:   Option<Vote>,
  /// Present once the case is revealed.
  pub aggregate:   Option<Aggregate>,
  pub score:       Option<ScoreBreakdown>,
  pub streak:      Option<Streak>,
  pub leaderboard: Option<LeaderboardResponse>,
  pub username:    String,
  pub user_id:     String,
}

/// `GET /today`
///
/// Creates the current cycle's case on first access. Once the case is
/// revealed, an authenticated voter's score is settled as a side effect.
pub async fn today<S, P>(
  State(state): State<AppState<S, P>>,
  caller: Caller,
) -> Result<Json<TodayResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let store = state.store.as_ref();
  let community = state.community(&caller);
  let user = state.identify(&caller).await?;
  let now = state.now();

  let case = lifecycle::current_case(store, &community, now, &state.rules).await?;

  let user_vote = match &user {
    Some(u) => store
      .get_vote(&case.case_id, &u.user_id)
      .await
      .map_err(ApiError::internal)?,
    None => None,
  };

  let mut aggregate = None;
  let mut score = None;
  let mut streak = None;
  let mut leaderboard = None;

  if case.is_revealed() {
    aggregate = store
      .get_aggregate(&case.case_id)
      .await
      .map_err(ApiError::internal)?;

    if let Some(u) = &user {
      if user_vote.is_some() {
        score = score::settle_score(store, &case, &u.user_id, now).await?;
      }
      streak = Some(
        store
          .get_streak(&community, &u.user_id)
          .await
          .map_err(ApiError::internal)?,
      );
      leaderboard = Some(
        state
          .leaderboard(
            &Board::Case(case.case_id.clone()),
            Some(u),
            state.rules.case_leaderboard_size,
          )
          .await?,
      );
    }
  }

  let (user_id, username) = match user {
    Some(u) => (u.user_id, u.username),
    None => (ANONYMOUS.into(), ANONYMOUS.into()),
  };

  Ok(Json(TodayResponse {
    case,
    user_vote,
    aggregate,
    score,
    streak,
    leaderboard,
    username,
    user_id,
  }))
}

// ─── Case ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CaseResponse {
  pub case: Case,
}

/// `GET /case?caseId=<id>`
pub async fn case<S, P>(
  State(state): State<AppState<S, P>>,
  QueryParams(query): QueryParams<CaseQuery>,
) -> Result<Json<CaseResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let case_id = required_case_id(query.case_id)?;
  let case = lifecycle::load_case(state.store.as_ref(), &case_id, state.now()).await?;
  Ok(Json(CaseResponse { case }))
}

// ─── Vote ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteBody {
  pub case_id:          Option<String>,
  pub verdict_index:    Option<i64>,
  pub prediction_index: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
  pub success:   bool,
  pub vote:      Vote,
  pub aggregate: Aggregate,
}

/// `POST /vote`
pub async fn vote<S, P>(
  State(state): State<AppState<S, P>>,
  caller: Caller,
  JsonBody(body): JsonBody<VoteBody>,
) -> Result<Json<VoteResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let user = state.require_user(&caller).await?;
  let case_id = required_case_id(body.case_id)?;
  let verdict = body
    .verdict_index
    .and_then(Choice::new)
    .ok_or_else(|| ApiError::BadRequest("verdictIndex must be 0-3".into()))?;
  let prediction = body
    .prediction_index
    .and_then(Choice::new)
    .ok_or_else(|| ApiError::BadRequest("predictionIndex must be 0-3".into()))?;

  let store = state.store.as_ref();
  let now = state.now();
  let case = lifecycle::load_case(store, &case_id, now).await?;
  let (vote, aggregate) =
    ballot::cast_vote(store, &case, &user.user_id, verdict, prediction, now).await?;

  Ok(Json(VoteResponse {
    success: true,
    vote,
    aggregate,
  }))
}

// ─── Comment mark ────────────────────────────────────────────────────────────

/// `POST /comment-mark`
///
/// Records when the caller first commented on a case. Only the first mark
/// counts; callers who have not voted are acknowledged without effect.
pub async fn comment_mark<S, P>(
  State(state): State<AppState<S, P>>,
  caller: Caller,
  JsonBody(body): JsonBody<CaseQuery>,
) -> Result<Json<Ack>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let user = state.require_user(&caller).await?;
  let case_id = required_case_id(body.case_id)?;
  ballot::mark_first_comment(state.store.as_ref(), &case_id, &user.user_id, state.now())
    .await?;
  Ok(Json(Ack { success: true }))
}

// ─── Minigame ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinigameBody {
  pub case_id: Option<String>,
  pub score:   Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinigameResponse {
  pub success:    bool,
  pub best_score: u32,
}

/// `POST /minigame-score`
pub async fn minigame_score<S, P>(
  State(state): State<AppState<S, P>>,
  caller: Caller,
  JsonBody(body): JsonBody<MinigameBody>,
) -> Result<Json<MinigameResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let user = state.require_user(&caller).await?;
  let invalid = || ApiError::BadRequest("caseId and valid score are required".into());
  let case_id = required_case_id(body.case_id).map_err(|_| invalid())?;
  let raw = body
    .score
    .filter(|s| s.is_finite() && *s >= 0.0)
    .ok_or_else(invalid)?;

  let best_score =
    score::record_minigame_score(state.store.as_ref(), &case_id, &user.user_id, raw).await?;
  Ok(Json(MinigameResponse {
    success: true,
    best_score,
  }))
}
