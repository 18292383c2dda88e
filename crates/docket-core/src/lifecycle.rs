//! Case lifecycle: `open → closed → revealed`, driven by the clock.
//!
//! Status is recomputed lazily. Any reader compares "now" against the case
//! timestamps with [`refresh_status`] and applies the due transitions
//! through [`GameStore::transition_case`], whose from-status guard makes
//! concurrent appliers converge. The background sweep uses the same path.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
  Error, Result,
  case::{Case, CaseStatus},
  keys::CycleKey,
  rules::GameRules,
  seed::{seed_for, submission_content},
  store::GameStore,
};

// ─── Pure transitions ────────────────────────────────────────────────────────

/// One forward step of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
  pub from: CaseStatus,
  pub to:   CaseStatus,
}

/// The transitions due for `case` at `now`, in the order they must be
/// applied. `closed` is never skipped, even when reveal is also due.
pub fn refresh_status(case: &Case, now: DateTime<Utc>) -> Vec<Transition> {
  let mut due = Vec::new();
  let mut status = case.status;
  while let Some(next) = status.next() {
    let deadline = match status {
      CaseStatus::Open => case.close_ts,
      CaseStatus::Closed => case.reveal_ts,
      CaseStatus::Revealed => break,
    };
    if now < deadline {
      break;
    }
    due.push(Transition {
      from: status,
      to:   next,
    });
    status = next;
  }
  due
}

// ─── Store-backed operations ─────────────────────────────────────────────────

/// Persist every transition due for `case` and return the updated case.
///
/// Whoever actually closes a case also takes its final snapshot.
pub async fn sync_status<S: GameStore>(
  store: &S,
  mut case: Case,
  now: DateTime<Utc>,
) -> Result<Case> {
  for transition in refresh_status(&case, now) {
    let done = store
      .transition_case(&case.case_id, transition)
      .await
      .map_err(Error::store)?
      .ok_or(Error::CaseNotFound)?;

    if done.applied {
      info!(
        case_id = %case.case_id,
        from = %transition.from,
        to = %transition.to,
        "case transitioned"
      );
      if transition.to == CaseStatus::Closed {
        store
          .take_snapshot(&case.case_id, now)
          .await
          .map_err(Error::store)?;
      }
    }
    case = done.case;
  }
  Ok(case)
}

/// Fetch a case by id with its status brought up to date.
pub async fn load_case<S: GameStore>(
  store: &S,
  case_id: &str,
  now: DateTime<Utc>,
) -> Result<Case> {
  let case = store
    .get_case(case_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::CaseNotFound)?;
  sync_status(store, case, now).await
}

/// The case for the cycle containing `now`, creating it if needed.
///
/// Safe under concurrent callers: creation is keyed by community and cycle,
/// and every caller ends up with the single stored case.
pub async fn current_case<S: GameStore>(
  store: &S,
  community: &str,
  now: DateTime<Utc>,
  rules: &GameRules,
) -> Result<Case> {
  let cycle = CycleKey::containing(now, rules.cycle_secs);
  if let Some(existing) = store
    .get_case_for_cycle(community, cycle)
    .await
    .map_err(Error::store)?
  {
    return sync_status(store, existing, now).await;
  }

  let date = cycle.date();
  let claim = store
    .claimable_submission(community, date)
    .await
    .map_err(Error::store)?;
  let content = match &claim {
    Some(sub) => submission_content(sub),
    None => seed_for(date).content(),
  };

  let case = Case::open(community, cycle, content, now, rules);
  let inserted = store
    .insert_case_if_absent(case, claim.map(|s| s.submission_id))
    .await
    .map_err(Error::store)?;
  if inserted.created {
    info!(
      case_id = %inserted.value.case_id,
      source = %inserted.value.source,
      "case opened"
    );
  }
  sync_status(store, inserted.value, now).await
}

/// How many cases a sweep moved on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  pub closed:   usize,
  pub revealed: usize,
}

/// Apply due transitions to every open or closed case. A failure on one
/// case is logged and does not stop the others.
pub async fn advance_due_cases<S: GameStore>(
  store: &S,
  now: DateTime<Utc>,
) -> Result<SweepReport> {
  let mut report = SweepReport::default();

  for status in [CaseStatus::Open, CaseStatus::Closed] {
    let cases = store
      .cases_with_status(status)
      .await
      .map_err(Error::store)?;
    for case in cases {
      if refresh_status(&case, now).is_empty() {
        continue;
      }
      let case_id = case.case_id.clone();
      match sync_status(store, case, now).await {
        Ok(after) => {
          if status == CaseStatus::Open && after.status != CaseStatus::Open {
            report.closed += 1;
          }
          if after.status == CaseStatus::Revealed {
            report.revealed += 1;
          }
        }
        Err(e) => warn!(case_id = %case_id, error = %e, "lifecycle sweep failed"),
      }
    }
  }

  if report != SweepReport::default() {
    info!(closed = report.closed, revealed = report.revealed, "swept cases");
  }
  Ok(report)
}

/// Replace an open case's content with the seed for its date and restart
/// its voting window. Cases past `open` cannot be replaced.
pub async fn replace_with_seed<S: GameStore>(
  store: &S,
  case_id: &str,
  now: DateTime<Utc>,
  rules: &GameRules,
) -> Result<Case> {
  let case = load_case(store, case_id, now).await?;
  if case.status != CaseStatus::Open {
    return Err(Error::CaseNotOpen);
  }

  let mut fresh = Case::open(
    &case.community,
    case.cycle_key,
    seed_for(case.date_key).content(),
    now,
    rules,
  );
  fresh.post_id = case.post_id;

  let replaced = store
    .reopen_case(fresh)
    .await
    .map_err(Error::store)?
    .ok_or(Error::CaseNotOpen)?;
  info!(case_id, "case replaced with seed");
  Ok(replaced)
}

#[cfg(test)]
mod tests {
  use chrono::{TimeDelta, TimeZone};

  use super::*;
  use crate::case::{CaseContent, CaseSource, default_labels};

  fn open_case() -> Case {
    let now = Utc.with_ymd_and_hms(2025, 7, 4, 8, 0, 0).unwrap();
    let rules = GameRules::default();
    Case::open(
      "town",
      CycleKey::containing(now, rules.cycle_secs),
      CaseContent {
        title:      "The Fence".into(),
        text:       "A fence was built a little over the property line.".into(),
        labels:     default_labels(),
        source:     CaseSource::Seed,
        created_by: "system".into(),
      },
      now,
      &rules,
    )
  }

  #[test]
  fn nothing_due_before_close() {
    let case = open_case();
    assert!(refresh_status(&case, case.open_ts).is_empty());
    assert!(refresh_status(&case, case.close_ts - TimeDelta::milliseconds(1)).is_empty());
  }

  #[test]
  fn closes_exactly_at_close_ts() {
    let case = open_case();
    assert_eq!(
      refresh_status(&case, case.close_ts),
      vec![Transition {
        from: CaseStatus::Open,
        to:   CaseStatus::Closed,
      }]
    );
  }

  #[test]
  fn late_reader_passes_through_closed() {
    let case = open_case();
    let due = refresh_status(&case, case.reveal_ts + TimeDelta::hours(1));
    let path: Vec<_> = due.iter().map(|t| (t.from, t.to)).collect();
    assert_eq!(
      path,
      vec![
        (CaseStatus::Open, CaseStatus::Closed),
        (CaseStatus::Closed, CaseStatus::Revealed),
      ]
    );
    assert_eq!(due.last().map(|t| t.to), Some(CaseStatus::Revealed));
  }

  #[test]
  fn applying_transitions_is_idempotent() {
    let mut case = open_case();
    let later = case.reveal_ts;
    for t in refresh_status(&case, later) {
      case.status = t.to;
    }
    assert_eq!(case.status, CaseStatus::Revealed);
    assert!(refresh_status(&case, later).is_empty());
  }
}
