//! Background lifecycle sweep.
//!
//! Cases advance lazily whenever they are read. The sweeper makes sure that
//! also happens for cases nobody is looking at, keeps one published case per
//! cycle for every live community, and records the periodic distribution
//! snapshots the influence bonus is measured against.

use std::time::Duration;

use chrono::{DateTime, Utc};
use docket_api::{AppState, Platform};
use docket_core::{lifecycle, snapshot, store::GameStore};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

/// What one tick changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
  pub posts_created: usize,
  pub snapshots:     usize,
  pub closed:        usize,
  pub revealed:      usize,
}

pub struct Sweeper<S, P> {
  state:         AppState<S, P>,
  communities:   Vec<String>,
  last_snapshot: Option<DateTime<Utc>>,
}

impl<S, P> Sweeper<S, P>
where
  S: GameStore,
  P: Platform,
{
  pub fn new(state: AppState<S, P>, communities: Vec<String>) -> Self {
    Self {
      state,
      communities,
      last_snapshot: None,
    }
  }

  /// Tick every `sweep_interval_secs`, forever.
  pub async fn run(mut self) {
    let period = Duration::from_secs(u64::from(self.state.rules.sweep_interval_secs));
    info!(
      interval_secs = period.as_secs(),
      communities = ?self.communities,
      "starting lifecycle sweeper"
    );

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      let report = self.tick().await;
      if report == TickReport::default() {
        debug!("sweep found nothing to do");
      } else {
        info!(
          posts_created = report.posts_created,
          snapshots = report.snapshots,
          closed = report.closed,
          revealed = report.revealed,
          "sweep completed"
        );
      }
    }
  }

  /// Run one sweep at the state's current time. Each step's failure is
  /// logged and the remaining steps still run.
  pub async fn tick(&mut self) -> TickReport {
    let now = self.state.now();
    let store = self.state.store.as_ref();
    let mut report = TickReport::default();

    for community in &self.communities {
      match self.publish_current_case(community, now).await {
        Ok(true) => report.posts_created += 1,
        Ok(false) => {}
        Err(e) => warn!(community = %community, error = %e, "failed to publish current case"),
      }
    }

    if self.snapshot_due(now) {
      match snapshot::snapshot_open_cases(store, now).await {
        Ok(taken) => {
          report.snapshots = taken;
          self.last_snapshot = Some(now);
        }
        Err(e) => warn!(error = %e, "snapshot sweep failed"),
      }
    }

    match lifecycle::advance_due_cases(store, now).await {
      Ok(sweep) => {
        report.closed = sweep.closed;
        report.revealed = sweep.revealed;
      }
      Err(e) => error!(error = %e, "lifecycle sweep failed"),
    }

    report
  }

  fn snapshot_due(&self, now: DateTime<Utc>) -> bool {
    self
      .last_snapshot
      .is_none_or(|last| now - last >= self.state.rules.snapshot_interval())
  }

  /// Materialise the community's current case and publish it if it has no
  /// post yet. Returns whether a post id was recorded.
  async fn publish_current_case(
    &self,
    community: &str,
    now: DateTime<Utc>,
  ) -> anyhow::Result<bool> {
    let store = self.state.store.as_ref();
    let case = lifecycle::current_case(store, community, now, &self.state.rules).await?;
    if case.post_id.is_some() {
      return Ok(false);
    }

    let post_id = self.state.platform.create_post(&case).await?;
    let recorded = store.set_case_post_id(&case.case_id, &post_id).await?;
    if recorded {
      info!(case_id = %case.case_id, post_id = %post_id, "case post recorded");
    }
    Ok(recorded)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use chrono::{TimeDelta, TimeZone};
  use docket_api::StaticPlatform;
  use docket_core::{case::CaseStatus, clock::ManualClock, rules::GameRules};
  use docket_store_sqlite::SqliteStore;

  use super::*;

  fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 7, 4, 8, 0, 0).unwrap() }

  async fn sweeper(
    communities: &[&str],
  ) -> (Sweeper<SqliteStore, StaticPlatform>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let state = AppState {
      store:             Arc::new(SqliteStore::open_in_memory().await.unwrap()),
      platform:          Arc::new(StaticPlatform::default()),
      clock:             clock.clone(),
      rules:             Arc::new(GameRules::default()),
      default_community: Arc::from("town"),
    };
    let communities = communities.iter().map(|c| (*c).to_owned()).collect();
    (Sweeper::new(state, communities), clock)
  }

  #[tokio::test]
  async fn publishes_one_post_per_cycle() {
    let (mut sweeper, clock) = sweeper(&["town", "city"]).await;

    let first = sweeper.tick().await;
    assert_eq!(first.posts_created, 2);
    assert_eq!(first.snapshots, 2);

    let case = sweeper
      .state
      .store
      .get_case("town-20250704-0800")
      .await
      .unwrap()
      .unwrap();
    assert_eq!(case.post_id.as_deref(), Some("post-town-20250704-0800"));

    clock.advance(TimeDelta::seconds(15));
    assert_eq!(sweeper.tick().await.posts_created, 0);

    // Next cycle gets its own case and post.
    clock.advance(TimeDelta::seconds(285));
    assert_eq!(sweeper.tick().await.posts_created, 2);
    assert!(
      sweeper
        .state
        .store
        .get_case("city-20250704-0805")
        .await
        .unwrap()
        .is_some()
    );
  }

  #[tokio::test]
  async fn snapshots_follow_their_own_interval() {
    let (mut sweeper, clock) = sweeper(&["town"]).await;
    assert_eq!(sweeper.tick().await.snapshots, 1);

    clock.advance(TimeDelta::seconds(15));
    assert_eq!(sweeper.tick().await.snapshots, 0);

    clock.advance(TimeDelta::seconds(15));
    assert_eq!(sweeper.tick().await.snapshots, 1);
  }

  #[tokio::test]
  async fn advances_cases_nobody_reads() {
    let (mut sweeper, clock) = sweeper(&[]).await;
    let store = Arc::clone(&sweeper.state.store);
    let case = lifecycle::current_case(store.as_ref(), "town", t0(), &GameRules::default())
      .await
      .unwrap();

    clock.advance(TimeDelta::seconds(240));
    let report = sweeper.tick().await;
    assert_eq!(report.closed, 1);
    assert_eq!(report.revealed, 0);
    let closed = store.get_case(&case.case_id).await.unwrap().unwrap();
    assert_eq!(closed.status, CaseStatus::Closed);

    clock.advance(TimeDelta::seconds(60));
    let report = sweeper.tick().await;
    assert_eq!(report.revealed, 1);
    let revealed = store.get_case(&case.case_id).await.unwrap().unwrap();
    assert_eq!(revealed.status, CaseStatus::Revealed);

    assert_eq!(sweeper.tick().await, TickReport::default());
  }
}
