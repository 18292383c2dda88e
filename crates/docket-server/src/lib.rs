//! The docket game server.
//!
//! Wires configuration, the SQLite store, the static platform and the
//! lifecycle sweeper around the [`docket_api`] router.

pub mod config;
pub mod sweeper;

pub use config::ServerConfig;
pub use sweeper::Sweeper;

use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use docket_api::{AppState, Platform, StaticPlatform, api_router};
use docket_core::{clock::Clock, store::GameStore};
use docket_store_sqlite::SqliteStore;
use tower_http::trace::TraceLayer;

/// State type served by the binary.
pub type ServerState = AppState<SqliteStore, StaticPlatform>;

/// Open the configured store, creating the schema on first use.
pub async fn open_store(cfg: &ServerConfig) -> anyhow::Result<SqliteStore> {
  match cfg.resolved_store_path() {
    Some(path) => {
      if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
          .with_context(|| format!("failed to create store directory {parent:?}"))?;
      }
      SqliteStore::open(&path)
        .await
        .with_context(|| format!("failed to open store at {path:?}"))
    }
    None => {
      tracing::warn!("using an in-memory store; all state is lost on exit");
      SqliteStore::open_in_memory()
        .await
        .context("failed to open in-memory store")
    }
  }
}

/// Build the shared handler state from configuration.
pub fn build_state(
  cfg: &ServerConfig,
  store: SqliteStore,
  clock: Arc<dyn Clock>,
) -> ServerState {
  let platform = StaticPlatform::new(
    cfg.moderators.clone().into_iter().collect(),
    cfg.usernames.clone().into_iter().collect(),
  );
  AppState {
    store: Arc::new(store),
    platform: Arc::new(platform),
    clock,
    rules: Arc::new(cfg.game.clone()),
    default_community: Arc::from(cfg.default_community.as_str()),
  }
}

/// The full HTTP application: the API under `/api` with request tracing.
pub fn router<S, P>(state: AppState<S, P>) -> Router
where
  S: GameStore + 'static,
  P: Platform + 'static,
{
  Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use chrono::{TimeZone, Utc};
  use docket_core::clock::ManualClock;
  use tower::ServiceExt as _;

  use super::*;

  async fn app(cfg: &ServerConfig) -> Router {
    let store = open_store(cfg).await.unwrap();
    let clock = Arc::new(ManualClock::new(
      Utc.with_ymd_and_hms(2025, 7, 4, 8, 0, 0).unwrap(),
    ));
    router(build_state(cfg, store, clock))
  }

  async fn get_json(app: Router, uri: &str, user: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut req = Request::builder().uri(uri);
    if let Some(user) = user {
      req = req.header(docket_api::session::USER_ID_HEADER, user);
    }
    let resp = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or_default())
  }

  fn memory_config() -> ServerConfig {
    ServerConfig::from_toml(
      r#"
        store_path = ":memory:"
        default_community = "town"

        [moderators]
        town = ["mod1"]

        [usernames]
        u1 = "Alice"
      "#,
    )
    .unwrap()
  }

  #[tokio::test]
  async fn api_is_mounted_under_prefix() {
    let cfg = memory_config();
    let app = app(&cfg).await;

    let (status, body) = get_json(app.clone(), "/api/today", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["case"]["caseId"], "town-20250704-0800");

    let (status, _) = get_json(app, "/today", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn configured_moderators_and_usernames_apply() {
    let cfg = memory_config();
    let app = app(&cfg).await;

    let (_, moderator) = get_json(app.clone(), "/api/me", Some("mod1")).await;
    assert_eq!(moderator["isMod"], true);

    let (_, user) = get_json(app, "/api/me", Some("u1")).await;
    assert_eq!(user["isMod"], false);
    assert_eq!(user["username"], "Alice");
  }
}
