//! JSON API for the docket game.
//!
//! Exposes an axum [`Router`] backed by any [`GameStore`] and [`Platform`].
//! Authentication happens upstream; see [`session`] for the identity
//! headers this API trusts. TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", docket_api::api_router(state))
//! ```

pub mod error;
pub mod platform;
pub mod play;
pub mod results;
pub mod session;
pub mod submissions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use chrono::{DateTime, Utc};
use docket_core::{clock::Clock, rules::GameRules, store::GameStore};

pub use error::ApiError;
pub use platform::{Platform, StaticPlatform};

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, P> {
  pub store:             Arc<S>,
  pub platform:          Arc<P>,
  pub clock:             Arc<dyn Clock>,
  pub rules:             Arc<GameRules>,
  /// Community used when a request does not name one.
  pub default_community: Arc<str>,
}

impl<S, P> Clone for AppState<S, P> {
  fn clone(&self) -> Self {
    Self {
      store:             Arc::clone(&self.store),
      platform:          Arc::clone(&self.platform),
      clock:             Arc::clone(&self.clock),
      rules:             Arc::clone(&self.rules),
      default_community: Arc::clone(&self.default_community),
    }
  }
}

impl<S, P> AppState<S, P> {
  pub fn now(&self) -> DateTime<Utc> { self.clock.now() }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, P>(state: AppState<S, P>) -> Router<()>
where
  S: GameStore + 'static,
  P: Platform + 'static,
{
  Router::new()
    // Session
    .route("/me", get(play::me::<S, P>))
    // Playing a case
    .route("/today", get(play::today::<S, P>))
    .route("/case", get(play::case::<S, P>))
    .route("/vote", post(play::vote::<S, P>))
    .route("/comment-mark", post(play::comment_mark::<S, P>))
    .route("/minigame-score", post(play::minigame_score::<S, P>))
    // Results
    .route("/reveal", get(results::reveal::<S, P>))
    .route("/archive", get(results::archive::<S, P>))
    .route("/leaderboard/weekly", get(results::weekly_leaderboard::<S, P>))
    // Submissions and moderation
    .route("/submit-case", post(submissions::submit::<S, P>))
    .route("/mod/pending", get(submissions::pending::<S, P>))
    .route("/mod/approve", post(submissions::approve::<S, P>))
    .route("/mod/reject", post(submissions::reject::<S, P>))
    .route("/mod/delete-case", post(submissions::delete_case::<S, P>))
    .with_state(state)
}
