//! Handlers for user-submitted cases and moderator actions.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/submit-case` | Body: [`SubmitBody`]; login required |
//! | `GET`  | `/mod/pending` | Moderator only |
//! | `POST` | `/mod/approve` | Body: `{"submissionId","dateKey"}`; moderator only |
//! | `POST` | `/mod/reject` | Body: `{"submissionId","reason"}`; moderator only |
//! | `POST` | `/mod/delete-case` | Body: `{"caseId"}`; moderator only |

use axum::{Json, extract::State};
use docket_core::{
  case::Case,
  keys::DateKey,
  lifecycle,
  store::GameStore,
  submission::{self, CaseSubmission, Review, SubmissionRequest},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  error::{ApiError, JsonBody},
  platform::Platform,
  play::{CaseQuery, required_case_id},
  session::{Caller, User},
};

fn non_blank(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}

// ─── Submit ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBody {
  #[serde(default)]
  pub text:            String,
  pub title:           Option<String>,
  pub labels_override: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
  pub success:       bool,
  pub submission_id: String,
}

/// `POST /submit-case`
pub async fn submit<S, P>(
  State(state): State<AppState<S, P>>,
  caller: Caller,
  JsonBody(body): JsonBody<SubmitBody>,
) -> Result<Json<SubmitResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let user = state.require_user(&caller).await?;
  let community = state.community(&caller);
  let request = SubmissionRequest {
    text:            body.text,
    title:           body.title,
    labels_override: body.labels_override,
  };

  let stored = submission::submit_case(
    state.store.as_ref(),
    &community,
    &user.user_id,
    &user.username,
    request,
    format!("sub-{}", Uuid::new_v4()),
    state.now(),
  )
  .await?;

  Ok(Json(SubmitResponse {
    success:       true,
    submission_id: stored.submission_id,
  }))
}

// ─── Moderation ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PendingResponse {
  pub submissions: Vec<CaseSubmission>,
}

/// `GET /mod/pending`
pub async fn pending<S, P>(
  State(state): State<AppState<S, P>>,
  caller: Caller,
) -> Result<Json<PendingResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let community = state.community(&caller);
  state.require_moderator(&caller, &community).await?;
  let submissions = state
    .store
    .pending_submissions(&community)
    .await
    .map_err(ApiError::internal)?;
  Ok(Json(PendingResponse { submissions }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveBody {
  pub submission_id: Option<String>,
  pub date_key:      Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectBody {
  pub submission_id: Option<String>,
  pub reason:        Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
  pub success:    bool,
  pub submission: CaseSubmission,
}

/// Apply `review` to a submission of the moderator's own community.
async fn apply_review<S, P>(
  state: &AppState<S, P>,
  community: &str,
  moderator: &User,
  submission_id: &str,
  review: Review,
) -> Result<Json<ReviewResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let store = state.store.as_ref();
  let belongs = store
    .get_submission(submission_id)
    .await
    .map_err(ApiError::internal)?
    .is_some_and(|s| s.community == community);
  if !belongs {
    return Err(docket_core::Error::SubmissionNotFound.into());
  }

  let submission = submission::review_submission(
    store,
    submission_id,
    review,
    &moderator.user_id,
    state.now(),
  )
  .await?;
  Ok(Json(ReviewResponse {
    success: true,
    submission,
  }))
}

/// `POST /mod/approve`
pub async fn approve<S, P>(
  State(state): State<AppState<S, P>>,
  caller: Caller,
  JsonBody(body): JsonBody<ApproveBody>,
) -> Result<Json<ReviewResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let community = state.community(&caller);
  let moderator = state.require_moderator(&caller, &community).await?;
  let (Some(submission_id), Some(date_key)) =
    (non_blank(body.submission_id), non_blank(body.date_key))
  else {
    return Err(ApiError::BadRequest(
      "submissionId and dateKey are required".into(),
    ));
  };
  let date: DateKey = date_key
    .parse()
    .map_err(|_| ApiError::BadRequest("dateKey must be yyyymmdd".into()))?;

  apply_review(&state, &community, &moderator, &submission_id, Review::Approve {
    date,
  })
  .await
}

/// `POST /mod/reject`
pub async fn reject<S, P>(
  State(state): State<AppState<S, P>>,
  caller: Caller,
  JsonBody(body): JsonBody<RejectBody>,
) -> Result<Json<ReviewResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let community = state.community(&caller);
  let moderator = state.require_moderator(&caller, &community).await?;
  let (Some(submission_id), Some(reason)) =
    (non_blank(body.submission_id), non_blank(body.reason))
  else {
    return Err(ApiError::BadRequest(
      "submissionId and reason are required".into(),
    ));
  };

  apply_review(&state, &community, &moderator, &submission_id, Review::Reject {
    reason,
  })
  .await
}

#[derive(Debug, Serialize)]
pub struct DeleteCaseResponse {
  pub success: bool,
  pub message: String,
  pub case:    Case,
}

/// `POST /mod/delete-case`
///
/// Swaps an open case's content for the seed of its date and restarts its
/// voting window. Cases that already closed are left alone.
pub async fn delete_case<S, P>(
  State(state): State<AppState<S, P>>,
  caller: Caller,
  JsonBody(body): JsonBody<CaseQuery>,
) -> Result<Json<DeleteCaseResponse>, ApiError>
where
  S: GameStore,
  P: Platform,
{
  let community = state.community(&caller);
  state.require_moderator(&caller, &community).await?;
  let case_id = required_case_id(body.case_id)?;
  let store = state.store.as_ref();
  let now = state.now();

  let existing = lifecycle::load_case(store, &case_id, now).await?;
  if existing.community != community {
    return Err(docket_core::Error::CaseNotFound.into());
  }

  let case = lifecycle::replace_with_seed(store, &case_id, now, &state.rules).await?;
  Ok(Json(DeleteCaseResponse {
    success: true,
    message: "Case replaced with seed case".into(),
    case,
  }))
}
