//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::{
    FromRequest, FromRequestParts,
    rejection::{JsonRejection, QueryRejection},
  },
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  #[error("Login required")]
  LoginRequired,

  #[error("Moderator access required")]
  ModeratorRequired,

  #[error("{0}")]
  NotFound(String),

  /// The caller acted on a stale view of a case or submission.
  #[error("{0}")]
  Conflict(String),

  #[error("{0}")]
  TooManyRequests(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Wrap a store or platform failure.
  pub fn internal<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Internal(Box::new(err))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::LoginRequired => StatusCode::UNAUTHORIZED,
      ApiError::ModeratorRequired => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<docket_core::Error> for ApiError {
  fn from(err: docket_core::Error) -> Self {
    use docket_core::Error as E;
    match err {
      E::InvalidInput(_) | E::Submission(_) => Self::BadRequest(err.to_string()),
      E::DuplicateVote
      | E::VotingClosed
      | E::CaseNotOpen
      | E::NotRevealed
      | E::AlreadyReviewed => Self::Conflict(err.to_string()),
      E::CaseNotFound | E::SubmissionNotFound | E::NoVotes => {
        Self::NotFound(err.to_string())
      }
      E::RateLimited(_) => Self::TooManyRequests(err.to_string()),
      E::Store(inner) => Self::Internal(inner),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match &self {
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        "Internal server error".to_owned()
      }
      other => other.to_string(),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// A JSON request body. Malformed bodies are rejected with the usual
/// `{"error": ..}` shape instead of axum's plain-text rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Query string parameters, rejected like [`JsonBody`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);
