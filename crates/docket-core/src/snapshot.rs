//! Point-in-time copies of a case's tally.
//!
//! Snapshots are append-only and immutable. They exist so the scoring engine
//! can ask how the distribution looked when a voter first commented.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
  Error, Result,
  ballot::Tally,
  case::{CaseId, CaseStatus},
  store::GameStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
  pub case_id: CaseId,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub ts:      DateTime<Utc>,
  #[serde(flatten)]
  pub tally:   Tally,
}

/// Persist the current tally of `case_id` at `now`. A case with no votes
/// yet is recorded as all zeros.
pub async fn take_snapshot<S: GameStore>(
  store: &S,
  case_id: &str,
  now: DateTime<Utc>,
) -> Result<Snapshot> {
  store.take_snapshot(case_id, now).await.map_err(Error::store)
}

/// Snapshot every case that is still open and before its close time.
/// Returns how many snapshots were written. A failure on one case is
/// logged and does not stop the others.
pub async fn snapshot_open_cases<S: GameStore>(
  store: &S,
  now: DateTime<Utc>,
) -> Result<usize> {
  let open = store
    .cases_with_status(CaseStatus::Open)
    .await
    .map_err(Error::store)?;

  let mut taken = 0;
  for case in open.iter().filter(|c| now < c.close_ts) {
    match take_snapshot(store, &case.case_id, now).await {
      Ok(_) => taken += 1,
      Err(e) => warn!(case_id = %case.case_id, error = %e, "snapshot failed"),
    }
  }
  if taken > 0 {
    info!(count = taken, "snapshotted open cases");
  }
  Ok(taken)
}

