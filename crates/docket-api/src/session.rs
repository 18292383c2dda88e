//! Who is calling, and on behalf of which community.
//!
//! The host platform authenticates users before requests reach this API and
//! forwards the result as headers:
//!
//! | Header | Meaning |
//! |--------|---------|
//! | `x-docket-user-id` | Authenticated user id; absent for anonymous callers |
//! | `x-docket-username` | Display name, if the host knows it |
//! | `x-docket-community` | Community the request is made in |

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use docket_core::{
  leaderboard::{ANONYMOUS, LeaderboardResponse, build_leaderboard},
  store::{Board, GameStore},
};

use crate::{AppState, error::ApiError, platform::Platform};

pub const USER_ID_HEADER: &str = "x-docket-user-id";
pub const USERNAME_HEADER: &str = "x-docket-username";
pub const COMMUNITY_HEADER: &str = "x-docket-community";

/// Identity headers of a request. Never rejects; missing or blank headers
/// read as `None`.
#[derive(Debug, Clone, Default)]
pub struct Caller {
  pub user_id:   Option<String>,
  pub username:  Option<String>,
  pub community: Option<String>,
}

fn header(parts: &Parts, name: &str) -> Option<String> {
  parts
    .headers
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(str::to_owned)
}

impl<St: Send + Sync> FromRequestParts<St> for Caller {
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Infallible> {
    Ok(Self {
      user_id:   header(parts, USER_ID_HEADER),
      username:  header(parts, USERNAME_HEADER),
      community: header(parts, COMMUNITY_HEADER),
    })
  }
}

/// An authenticated caller with a resolved display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
  pub user_id:  String,
  pub username: String,
}

impl<S, P> AppState<S, P>
where
  S: GameStore,
  P: Platform,
{
  pub fn community(&self, caller: &Caller) -> String {
    caller
      .community
      .clone()
      .unwrap_or_else(|| self.default_community.to_string())
  }

  /// Resolve the caller's display name and remember it for leaderboards.
  pub async fn identify(&self, caller: &Caller) -> Result<Option<User>, ApiError> {
    let Some(user_id) = caller.user_id.clone() else {
      return Ok(None);
    };
    let username = match &caller.username {
      Some(name) => name.clone(),
      None => self
        .platform
        .username(&user_id)
        .await
        .map_err(ApiError::internal)?
        .unwrap_or_else(|| ANONYMOUS.to_owned()),
    };
    if username != ANONYMOUS {
      self
        .store
        .cache_username(&user_id, &username)
        .await
        .map_err(ApiError::internal)?;
    }
    Ok(Some(User { user_id, username }))
  }

  pub async fn require_user(&self, caller: &Caller) -> Result<User, ApiError> {
    self.identify(caller).await?.ok_or(ApiError::LoginRequired)
  }

  pub async fn is_moderator(&self, community: &str, user: &User) -> Result<bool, ApiError> {
    self
      .platform
      .is_moderator(community, &user.user_id)
      .await
      .map_err(ApiError::internal)
  }

  /// An authenticated moderator of `community`.
  pub async fn require_moderator(
    &self,
    caller: &Caller,
    community: &str,
  ) -> Result<User, ApiError> {
    let user = self.require_user(caller).await?;
    if !self.is_moderator(community, &user).await? {
      return Err(ApiError::ModeratorRequired);
    }
    Ok(user)
  }

  /// Render `board` for `user`, asking the platform for names the cache
  /// does not have.
  pub async fn leaderboard(
    &self,
    board: &Board,
    user: Option<&User>,
    limit: usize,
  ) -> Result<LeaderboardResponse, ApiError> {
    let mut view = build_leaderboard(
      self.store.as_ref(),
      board,
      user.map(|u| u.user_id.as_str()),
      limit,
    )
    .await?;

    for entry in view.top.iter_mut().chain(view.me.as_mut()) {
      if entry.username != ANONYMOUS {
        continue;
      }
      if let Some(name) = self
        .platform
        .username(&entry.user_id)
        .await
        .map_err(ApiError::internal)?
      {
        self
          .store
          .cache_username(&entry.user_id, &name)
          .await
          .map_err(ApiError::internal)?;
        entry.username = name;
      }
    }
    Ok(view)
  }
}
