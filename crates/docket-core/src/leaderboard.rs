//! Rendering ranked boards into top-N plus "me" views.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  case::UserId,
  store::{Board, GameStore, Standing},
};

pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
  pub rank:     u64,
  pub username: String,
  pub score:    u64,
  pub user_id:  UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
  pub top:           Vec<LeaderboardEntry>,
  /// The caller's own row, even when outside the top.
  pub me:            Option<LeaderboardEntry>,
  pub total_players: u64,
}

async fn entry<S: GameStore>(store: &S, standing: Standing) -> Result<LeaderboardEntry> {
  let username = store
    .cached_username(&standing.user_id)
    .await
    .map_err(Error::store)?
    .unwrap_or_else(|| ANONYMOUS.to_owned());
  Ok(LeaderboardEntry {
    rank: standing.rank,
    username,
    score: standing.score,
    user_id: standing.user_id,
  })
}

/// Top `limit` rows of `board` plus the row for `user_id`, if any.
///
/// Display names come from the username cache; callers that have just
/// seen a user should have cached their name first.
pub async fn build_leaderboard<S: GameStore>(
  store: &S,
  board: &Board,
  user_id: Option<&str>,
  limit: usize,
) -> Result<LeaderboardResponse> {
  let standings = store
    .leaderboard_top(board, limit)
    .await
    .map_err(Error::store)?;
  let mut top = Vec::with_capacity(standings.len());
  for standing in standings {
    top.push(entry(store, standing).await?);
  }

  let me = match user_id {
    Some(user_id) => match top.iter().find(|e| e.user_id == user_id) {
      Some(found) => Some(found.clone()),
      None => match store
        .leaderboard_standing(board, user_id)
        .await
        .map_err(Error::store)?
      {
        Some(standing) => Some(entry(store, standing).await?),
        None => None,
      },
    },
    None => None,
  };

  let total_players = store.leaderboard_size(board).await.map_err(Error::store)?;
  Ok(LeaderboardResponse {
    top,
    me,
    total_players,
  })
}
