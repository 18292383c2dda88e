//! The hosting platform the game runs inside.
//!
//! Moderation rights, post creation and display names belong to the host
//! (a forum, a chat service, ...). The API only needs the three calls on
//! [`Platform`]. [`StaticPlatform`] answers them from configuration.

use std::{
  collections::{HashMap, HashSet},
  convert::Infallible,
  future::Future,
};

use docket_core::case::Case;
use tracing::info;

/// Collaborator interface to the hosting platform.
pub trait Platform: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Whether `user_id` may run moderator actions in `community`.
  fn is_moderator<'a>(
    &'a self,
    community: &'a str,
    user_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Publish `case` to its community and return an opaque post id.
  fn create_post<'a>(
    &'a self,
    case: &'a Case,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Resolve a display name, if the platform knows one.
  fn username<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;
}

/// A [`Platform`] backed by fixed moderator and username tables.
///
/// Posts are not published anywhere; the post id is derived from the case.
#[derive(Debug, Clone, Default)]
pub struct StaticPlatform {
  moderators: HashMap<String, HashSet<String>>,
  usernames:  HashMap<String, String>,
}

impl StaticPlatform {
  pub fn new(
    moderators: HashMap<String, Vec<String>>,
    usernames: HashMap<String, String>,
  ) -> Self {
    Self {
      moderators: moderators
        .into_iter()
        .map(|(community, users)| (community, users.into_iter().collect()))
        .collect(),
      usernames,
    }
  }

  pub fn with_moderator(mut self, community: &str, user_id: &str) -> Self {
    self
      .moderators
      .entry(community.to_owned())
      .or_default()
      .insert(user_id.to_owned());
    self
  }
}

impl Platform for StaticPlatform {
  type Error = Infallible;

  async fn is_moderator(&self, community: &str, user_id: &str) -> Result<bool, Infallible> {
    Ok(
      self
        .moderators
        .get(community)
        .is_some_and(|mods| mods.contains(user_id)),
    )
  }

  async fn create_post(&self, case: &Case) -> Result<String, Infallible> {
    let post_id = format!("post-{}", case.case_id);
    info!(case_id = %case.case_id, post_id = %post_id, "case published");
    Ok(post_id)
  }

  async fn username(&self, user_id: &str) -> Result<Option<String>, Infallible> {
    Ok(self.usernames.get(user_id).cloned())
  }
}
