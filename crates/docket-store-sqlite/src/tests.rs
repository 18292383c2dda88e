//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use docket_core::{
  Error as CoreError,
  ballot::{self, Choice},
  case::{Case, CaseSource, CaseStatus},
  keys::{DateKey, WeekKey},
  leaderboard::build_leaderboard,
  lifecycle::{self, Transition},
  rules::GameRules,
  score::{self, ScoreBreakdown},
  snapshot,
  store::{Board, GameStore, ReviewOutcome, Settlement, VoteOutcome},
  streak::Streak,
  submission::{self, Review, SubmissionRequest, SubmissionStatus},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// Start of a cycle: 2025-07-04 08:00:00 UTC.
fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 7, 4, 8, 0, 0).unwrap() }

fn at(secs: i64) -> DateTime<Utc> { t0() + TimeDelta::seconds(secs) }

fn choice(i: i64) -> Choice { Choice::new(i).unwrap() }

fn rules() -> GameRules { GameRules::default() }

async fn vote(s: &SqliteStore, case_id: &str, user: &str, verdict: i64, when: DateTime<Utc>) {
  let case = s.get_case(case_id).await.unwrap().unwrap();
  ballot::cast_vote(s, &case, user, choice(verdict), choice(verdict), when)
    .await
    .unwrap();
}

/// A score for `user` on `case_id` worth `total`, all from prediction.
fn points(case_id: &str, user: &str, total: u32) -> ScoreBreakdown {
  let mut score = ScoreBreakdown::zero(case_id, user);
  score.prediction_match = total;
  score.total = total;
  score
}

fn settlement(case: &Case, score: ScoreBreakdown, when: DateTime<Utc>) -> Settlement {
  Settlement {
    score,
    community: case.community.clone(),
    week: case.date_key.week(),
    date: case.date_key,
    at: when,
  }
}

fn long_text() -> String {
  "My flatmate keeps eating my labelled leftovers and then denies it every time.".to_owned()
}

// ─── Cases ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn current_case_creates_once_per_cycle() {
  let s = store().await;
  let first = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  let again = lifecycle::current_case(&s, "town", at(30), &rules()).await.unwrap();

  assert_eq!(first.case_id, again.case_id);
  assert_eq!(first.open_ts, again.open_ts);
  assert_eq!(first.status, CaseStatus::Open);
  assert_eq!(first.source, CaseSource::Seed);
  assert_eq!(first.close_ts, at(240));
  assert_eq!(first.reveal_ts, at(300));

  let next = lifecycle::current_case(&s, "town", at(300), &rules()).await.unwrap();
  assert_ne!(next.case_id, first.case_id);
}

#[tokio::test]
async fn communities_get_separate_cases() {
  let s = store().await;
  let a = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  let b = lifecycle::current_case(&s, "city", t0(), &rules()).await.unwrap();
  assert_ne!(a.case_id, b.case_id);
  assert_eq!(a.cycle_key, b.cycle_key);
}

#[tokio::test]
async fn concurrent_current_case_yields_single_case() {
  let s = store().await;
  let mut handles = Vec::new();
  for i in 0..16 {
    let s = s.clone();
    handles.push(tokio::spawn(async move {
      lifecycle::current_case(&s, "town", at(i), &rules()).await.unwrap()
    }));
  }
  let mut ids = Vec::new();
  for h in handles {
    ids.push(h.await.unwrap());
  }
  assert!(ids.iter().all(|c| c.case_id == ids[0].case_id));
  assert!(ids.iter().all(|c| c.open_ts == ids[0].open_ts));

  let open = s.cases_with_status(CaseStatus::Open).await.unwrap();
  assert_eq!(open.len(), 1);
}

#[tokio::test]
async fn get_case_missing_returns_none() {
  let s = store().await;
  assert!(s.get_case("town-20250704-0800").await.unwrap().is_none());
  assert!(matches!(
    lifecycle::load_case(&s, "nope", t0()).await,
    Err(CoreError::CaseNotFound)
  ));
}

#[tokio::test]
async fn transitions_are_guarded_on_current_status() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  let close = Transition {
    from: CaseStatus::Open,
    to:   CaseStatus::Closed,
  };

  let first = s.transition_case(&case.case_id, close).await.unwrap().unwrap();
  assert!(first.applied);
  assert_eq!(first.case.status, CaseStatus::Closed);

  let second = s.transition_case(&case.case_id, close).await.unwrap().unwrap();
  assert!(!second.applied);
  assert_eq!(second.case.status, CaseStatus::Closed);

  assert!(s.transition_case("missing", close).await.unwrap().is_none());
}

#[tokio::test]
async fn sync_status_closes_then_reveals_and_snapshots_on_close() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  vote(&s, &case.case_id, "alice", 0, at(10)).await;

  let later = lifecycle::load_case(&s, &case.case_id, at(310)).await.unwrap();
  assert_eq!(later.status, CaseStatus::Revealed);

  let snap = s.snapshot_at_or_after(&case.case_id, t0()).await.unwrap().unwrap();
  assert_eq!(snap.ts, at(310));
  assert_eq!(snap.tally.voters, 1);

  // Status never moves backwards.
  let earlier = lifecycle::load_case(&s, &case.case_id, at(20)).await.unwrap();
  assert_eq!(earlier.status, CaseStatus::Revealed);
}

#[tokio::test]
async fn sweep_advances_due_cases() {
  let s = store().await;
  lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  lifecycle::current_case(&s, "city", t0(), &rules()).await.unwrap();

  let none = lifecycle::advance_due_cases(&s, at(100)).await.unwrap();
  assert_eq!(none.closed, 0);

  let closed = lifecycle::advance_due_cases(&s, at(250)).await.unwrap();
  assert_eq!(closed.closed, 2);
  assert_eq!(closed.revealed, 0);

  let revealed = lifecycle::advance_due_cases(&s, at(301)).await.unwrap();
  assert_eq!(revealed.closed, 0);
  assert_eq!(revealed.revealed, 2);
  assert!(s.cases_with_status(CaseStatus::Open).await.unwrap().is_empty());
}

#[tokio::test]
async fn post_id_is_set_once() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  assert!(s.set_case_post_id(&case.case_id, "t3_abc").await.unwrap());
  assert!(!s.set_case_post_id(&case.case_id, "t3_def").await.unwrap());
  let stored = s.get_case(&case.case_id).await.unwrap().unwrap();
  assert_eq!(stored.post_id.as_deref(), Some("t3_abc"));
}

#[tokio::test]
async fn replace_with_seed_restarts_open_case_only() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  s.set_case_post_id(&case.case_id, "t3_abc").await.unwrap();

  let replaced = lifecycle::replace_with_seed(&s, &case.case_id, at(60), &rules())
    .await
    .unwrap();
  assert_eq!(replaced.case_id, case.case_id);
  assert_eq!(replaced.open_ts, at(60));
  assert_eq!(replaced.close_ts, at(300));
  assert_eq!(replaced.post_id.as_deref(), Some("t3_abc"));
  assert_eq!(replaced.source, CaseSource::Seed);

  let after_close = lifecycle::replace_with_seed(&s, &case.case_id, at(400), &rules()).await;
  assert!(matches!(after_close, Err(CoreError::CaseNotOpen)));
}

#[tokio::test]
async fn recent_cases_lists_newest_first() {
  let s = store().await;
  for cycle in 0..3 {
    lifecycle::current_case(&s, "town", at(cycle * 300), &rules()).await.unwrap();
  }
  lifecycle::advance_due_cases(&s, at(3 * 300 + 10)).await.unwrap();

  let revealed = s.recent_cases("town", CaseStatus::Revealed, 2).await.unwrap();
  assert_eq!(revealed.len(), 2);
  assert!(revealed[0].open_ts > revealed[1].open_ts);
  assert!(s.recent_cases("city", CaseStatus::Revealed, 10).await.unwrap().is_empty());
}

// ─── Votes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn vote_updates_aggregate() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  let (v, agg) = ballot::cast_vote(&s, &case, "alice", choice(2), choice(1), at(5))
    .await
    .unwrap();
  assert_eq!(v.verdict, choice(2));
  assert_eq!(v.prediction, choice(1));
  assert_eq!(agg.tally.counts, [0, 0, 1, 0]);
  assert_eq!(agg.tally.voters, 1);
  assert_eq!(agg.last_updated_ts, at(5));

  vote(&s, &case.case_id, "bob", 2, at(6)).await;
  let agg = s.get_aggregate(&case.case_id).await.unwrap().unwrap();
  assert_eq!(agg.tally.counts, [0, 0, 2, 0]);
  assert_eq!(agg.tally.voters, 2);
}

#[tokio::test]
async fn duplicate_vote_is_rejected_and_not_counted() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  vote(&s, &case.case_id, "alice", 0, at(5)).await;

  let again = ballot::cast_vote(&s, &case, "alice", choice(3), choice(3), at(6)).await;
  assert!(matches!(again, Err(CoreError::DuplicateVote)));

  let stored = s.get_vote(&case.case_id, "alice").await.unwrap().unwrap();
  assert_eq!(stored.verdict, choice(0));
  let agg = s.get_aggregate(&case.case_id).await.unwrap().unwrap();
  assert_eq!(agg.tally.voters, 1);
}

#[tokio::test]
async fn store_refuses_votes_after_close() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  let mut late = ballot::Vote {
    case_id:          case.case_id.clone(),
    user_id:          "late".into(),
    verdict:          choice(0),
    prediction:       choice(0),
    vote_ts:          at(240),
    first_comment_ts: None,
  };
  assert_eq!(s.cast_vote(late.clone()).await.unwrap(), VoteOutcome::Closed);

  late.case_id = "missing".into();
  assert_eq!(s.cast_vote(late).await.unwrap(), VoteOutcome::UnknownCase);

  let closed = lifecycle::load_case(&s, &case.case_id, at(250)).await.unwrap();
  let res = ballot::cast_vote(&s, &closed, "bob", choice(0), choice(0), at(250)).await;
  assert!(matches!(res, Err(CoreError::VotingClosed)));
}

#[tokio::test]
async fn concurrent_votes_lose_no_increments() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();

  let mut handles = Vec::new();
  for i in 0..64_i64 {
    let s = s.clone();
    let case = case.clone();
    handles.push(tokio::spawn(async move {
      let user = format!("user-{i}");
      ballot::cast_vote(&s, &case, &user, choice(i % 4), choice(0), at(10))
        .await
        .unwrap();
    }));
  }
  for h in handles {
    h.await.unwrap();
  }

  let agg = s.get_aggregate(&case.case_id).await.unwrap().unwrap();
  assert_eq!(agg.tally.voters, 64);
  assert_eq!(agg.tally.counts, [16, 16, 16, 16]);
}

#[tokio::test]
async fn racing_duplicates_record_exactly_one_vote() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();

  let mut handles = Vec::new();
  for i in 0..12_i64 {
    let s = s.clone();
    let case = case.clone();
    handles.push(tokio::spawn(async move {
      ballot::cast_vote(&s, &case, "alice", choice(i % 4), choice(0), at(10)).await
    }));
  }
  let mut ok = 0;
  let mut dup = 0;
  for h in handles {
    match h.await.unwrap() {
      Ok(_) => ok += 1,
      Err(CoreError::DuplicateVote) => dup += 1,
      Err(e) => panic!("unexpected error: {e}"),
    }
  }
  assert_eq!(ok, 1);
  assert_eq!(dup, 11);
  let agg = s.get_aggregate(&case.case_id).await.unwrap().unwrap();
  assert_eq!(agg.tally.voters, 1);
}

#[tokio::test]
async fn first_comment_is_marked_once() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  assert!(
    ballot::mark_first_comment(&s, &case.case_id, "alice", at(20))
      .await
      .unwrap()
      .is_none()
  );

  vote(&s, &case.case_id, "alice", 0, at(5)).await;
  let marked = ballot::mark_first_comment(&s, &case.case_id, "alice", at(20))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(marked.first_comment_ts, Some(at(20)));

  let again = ballot::mark_first_comment(&s, &case.case_id, "alice", at(90))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(again.first_comment_ts, Some(at(20)));
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_of_empty_case_is_zero() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  let snap = snapshot::take_snapshot(&s, &case.case_id, at(1)).await.unwrap();
  assert_eq!(snap.tally.voters, 0);
  assert_eq!(snap.tally.counts, [0; 4]);
}

#[tokio::test]
async fn snapshot_lookup_finds_first_at_or_after() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  let ms = |n: i64| t0() + TimeDelta::milliseconds(n);

  vote(&s, &case.case_id, "a", 0, ms(500)).await;
  s.take_snapshot(&case.case_id, ms(1000)).await.unwrap();
  vote(&s, &case.case_id, "b", 1, ms(1500)).await;
  s.take_snapshot(&case.case_id, ms(2000)).await.unwrap();
  vote(&s, &case.case_id, "c", 1, ms(2500)).await;
  s.take_snapshot(&case.case_id, ms(3000)).await.unwrap();

  let found = s.snapshot_at_or_after(&case.case_id, ms(1500)).await.unwrap().unwrap();
  assert_eq!(found.ts, ms(2000));
  assert_eq!(found.tally.counts, [1, 1, 0, 0]);

  let exact = s.snapshot_at_or_after(&case.case_id, ms(1000)).await.unwrap().unwrap();
  assert_eq!(exact.ts, ms(1000));

  assert!(s.snapshot_at_or_after(&case.case_id, ms(4000)).await.unwrap().is_none());
}

#[tokio::test]
async fn snapshot_lookup_on_case_without_snapshots_is_none() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  vote(&s, &case.case_id, "a", 0, at(1)).await;
  assert!(s.snapshot_at_or_after(&case.case_id, t0()).await.unwrap().is_none());
  assert!(s.snapshot_at_or_after("missing", t0()).await.unwrap().is_none());
}

#[tokio::test]
async fn snapshot_sweep_covers_open_cases_only() {
  let s = store().await;
  let town = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  lifecycle::current_case(&s, "city", t0(), &rules()).await.unwrap();

  assert_eq!(snapshot::snapshot_open_cases(&s, at(30)).await.unwrap(), 2);
  let snap = s.snapshot_at_or_after(&town.case_id, t0()).await.unwrap().unwrap();
  assert_eq!(snap.ts, at(30));

  // Past close but not yet swept: skipped.
  assert_eq!(snapshot::snapshot_open_cases(&s, at(241)).await.unwrap(), 0);
}

// ─── Scores ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn settle_requires_reveal() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  vote(&s, &case.case_id, "alice", 0, at(5)).await;
  let res = score::settle_score(&s, &case, "alice", at(10)).await;
  assert!(matches!(res, Err(CoreError::NotRevealed)));
}

#[tokio::test]
async fn two_voter_round_scores_and_boards() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  ballot::cast_vote(&s, &case, "a", choice(0), choice(0), t0()).await.unwrap();
  ballot::cast_vote(&s, &case, "b", choice(1), choice(0), at(180)).await.unwrap();

  let case = lifecycle::load_case(&s, &case.case_id, at(301)).await.unwrap();
  assert!(case.is_revealed());

  let a = score::settle_score(&s, &case, "a", at(302)).await.unwrap().unwrap();
  assert_eq!((a.prediction_match, a.verdict_match, a.timing_bonus), (60, 30, 20));
  assert_eq!(a.total, 110);

  let b = score::settle_score(&s, &case, "b", at(302)).await.unwrap().unwrap();
  assert_eq!((b.prediction_match, b.verdict_match, b.timing_bonus), (60, 0, 5));
  assert_eq!(b.total, 65);

  let board = Board::Case(case.case_id.clone());
  let top = s.leaderboard_top(&board, 10).await.unwrap();
  assert_eq!(top.len(), 2);
  assert_eq!((top[0].user_id.as_str(), top[0].rank), ("a", 1));
  assert_eq!((top[1].user_id.as_str(), top[1].rank), ("b", 2));

  let weekly = Board::Weekly {
    community: "town".into(),
    week:      WeekKey::of(t0()),
  };
  let b_week = s.leaderboard_standing(&weekly, "b").await.unwrap().unwrap();
  assert_eq!((b_week.score, b_week.rank), (65, 2));
  assert_eq!(s.leaderboard_size(&weekly).await.unwrap(), 2);

  let streak = s.get_streak("town", "a").await.unwrap();
  assert_eq!(streak.current, 1);
  assert_eq!(streak.last_played_date, Some(case.date_key));
}

#[tokio::test]
async fn settled_score_is_memoized_and_counted_once() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  vote(&s, &case.case_id, "a", 0, t0()).await;
  let case = lifecycle::load_case(&s, &case.case_id, at(301)).await.unwrap();

  let mut handles = Vec::new();
  for _ in 0..8 {
    let s = s.clone();
    let case = case.clone();
    handles.push(tokio::spawn(async move {
      score::settle_score(&s, &case, "a", at(302)).await.unwrap().unwrap()
    }));
  }
  let mut totals = Vec::new();
  for h in handles {
    totals.push(h.await.unwrap().total);
  }
  assert!(totals.iter().all(|t| *t == totals[0]));

  let weekly = Board::Weekly {
    community: "town".into(),
    week:      case.date_key.week(),
  };
  let standing = s.leaderboard_standing(&weekly, "a").await.unwrap().unwrap();
  assert_eq!(standing.score, u64::from(totals[0]));
  assert_eq!(s.get_streak("town", "a").await.unwrap().current, 1);

  // Later minigame play does not change a stored score.
  score::record_minigame_score(&s, &case.case_id, "a", 500.0).await.unwrap();
  let again = score::settle_score(&s, &case, "a", at(400)).await.unwrap().unwrap();
  assert_eq!(again.total, totals[0]);
}

#[tokio::test]
async fn non_voter_has_no_score() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  vote(&s, &case.case_id, "a", 0, t0()).await;
  let case = lifecycle::load_case(&s, &case.case_id, at(301)).await.unwrap();
  assert!(score::settle_score(&s, &case, "ghost", at(302)).await.unwrap().is_none());
  assert!(s.get_score(&case.case_id, "ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn settlement_credits_board_and_streak_once() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  let first = points(&case.case_id, "a", 60);
  let saved = s.settle_score(settlement(&case, first.clone(), at(1))).await.unwrap();
  assert!(saved.newly_saved);

  let again = s
    .settle_score(settlement(&case, points(&case.case_id, "a", 999), at(2)))
    .await
    .unwrap();
  assert!(!again.newly_saved);
  assert_eq!(again.score, first);

  let weekly = Board::Weekly {
    community: "town".into(),
    week:      case.date_key.week(),
  };
  let standing = s.leaderboard_standing(&weekly, "a").await.unwrap().unwrap();
  assert_eq!(standing.score, 60);
  let streak = s.get_streak("town", "a").await.unwrap();
  assert_eq!((streak.current, streak.best), (1, 1));
  assert_eq!(streak.last_played_date, Some(case.date_key));
}

#[tokio::test]
async fn influence_bonus_uses_snapshot_after_comment() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  vote(&s, &case.case_id, "a", 0, at(1)).await;
  vote(&s, &case.case_id, "b", 1, at(2)).await;
  vote(&s, &case.case_id, "c", 1, at(3)).await;
  ballot::mark_first_comment(&s, &case.case_id, "a", at(10)).await.unwrap();
  // Share of verdict 0 at comment time: 1/3.
  s.take_snapshot(&case.case_id, at(15)).await.unwrap();
  vote(&s, &case.case_id, "d", 0, at(20)).await;
  vote(&s, &case.case_id, "e", 0, at(21)).await;

  let case = lifecycle::load_case(&s, &case.case_id, at(301)).await.unwrap();
  let a = score::settle_score(&s, &case, "a", at(302)).await.unwrap().unwrap();
  assert_eq!(a.influence_bonus, score::INFLUENCE_POINTS);

  let b = score::settle_score(&s, &case, "b", at(302)).await.unwrap().unwrap();
  assert_eq!(b.influence_bonus, 0);
}

#[tokio::test]
async fn weekly_points_accumulate_with_ties_by_first_entry() {
  let s = store().await;
  let first = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  let second = lifecycle::current_case(&s, "town", at(300), &rules()).await.unwrap();
  s.settle_score(settlement(&first, points(&first.case_id, "late", 50), at(10)))
    .await
    .unwrap();
  s.settle_score(settlement(&first, points(&first.case_id, "early", 30), at(1)))
    .await
    .unwrap();
  s.settle_score(settlement(&second, points(&second.case_id, "early", 20), at(320)))
    .await
    .unwrap();

  let board = Board::Weekly {
    community: "town".into(),
    week:      WeekKey::of(t0()),
  };
  let top = s.leaderboard_top(&board, 15).await.unwrap();
  assert_eq!((top[0].user_id.as_str(), top[0].score), ("early", 50));
  assert_eq!((top[1].user_id.as_str(), top[1].score), ("late", 50));

  let late = s.leaderboard_standing(&board, "late").await.unwrap().unwrap();
  assert_eq!(late.rank, 2);
  assert!(s.leaderboard_standing(&board, "nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn leaderboard_view_includes_caller_outside_top() {
  let s = store().await;
  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  for i in 0..5_u32 {
    let user = format!("u{i}");
    s.settle_score(settlement(&case, points(&case.case_id, &user, 100 - i), at(1)))
      .await
      .unwrap();
  }
  s.cache_username("u0", "first_place").await.unwrap();

  let board = Board::Weekly {
    community: "town".into(),
    week:      case.date_key.week(),
  };
  let view = build_leaderboard(&s, &board, Some("u4"), 2).await.unwrap();
  assert_eq!(view.top.len(), 2);
  assert_eq!(view.top[0].username, "first_place");
  assert_eq!(view.top[1].username, "anonymous");
  assert_eq!(view.total_players, 5);
  let me = view.me.unwrap();
  assert_eq!((me.rank, me.score), (5, 96));
}

// ─── Streaks and minigame ────────────────────────────────────────────────────

const DAY: i64 = 86_400;

#[tokio::test]
async fn streak_touches_by_date() {
  let s = store().await;
  assert_eq!(s.get_streak("town", "a").await.unwrap(), Streak::default());

  let d1_first = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  let d1_second = lifecycle::current_case(&s, "town", at(300), &rules()).await.unwrap();
  let d2 = lifecycle::current_case(&s, "town", at(DAY), &rules()).await.unwrap();
  let d4 = lifecycle::current_case(&s, "town", at(3 * DAY), &rules()).await.unwrap();

  for case in [&d1_first, &d1_second, &d2] {
    s.settle_score(settlement(case, points(&case.case_id, "a", 10), at(0)))
      .await
      .unwrap();
  }
  let two = s.get_streak("town", "a").await.unwrap();
  assert_eq!((two.current, two.best), (2, 2));

  s.settle_score(settlement(&d4, points(&d4.case_id, "a", 10), at(0)))
    .await
    .unwrap();
  let reset = s.get_streak("town", "a").await.unwrap();
  assert_eq!((reset.current, reset.best), (1, 2));
  assert_eq!(reset.last_played_date, Some(d4.date_key));
  assert_eq!(s.get_streak("city", "a").await.unwrap().current, 0);
}

#[tokio::test]
async fn case_from_an_earlier_day_settled_late_keeps_streak() {
  let s = store().await;
  let d1_first = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  let d1_second = lifecycle::current_case(&s, "town", at(300), &rules()).await.unwrap();
  let d2 = lifecycle::current_case(&s, "town", at(DAY), &rules()).await.unwrap();

  for case in [&d1_first, &d2, &d1_second] {
    s.settle_score(settlement(case, points(&case.case_id, "a", 10), at(DAY + 400)))
      .await
      .unwrap();
  }

  let streak = s.get_streak("town", "a").await.unwrap();
  assert_eq!((streak.current, streak.best), (2, 2));
  assert_eq!(streak.last_played_date, Some(d2.date_key));
}

#[tokio::test]
async fn next_day_settlement_earns_streak_bonus() {
  let s = store().await;
  let day1 = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  vote(&s, &day1.case_id, "a", 0, at(10)).await;
  let day1 = lifecycle::load_case(&s, &day1.case_id, at(301)).await.unwrap();
  let first = score::settle_score(&s, &day1, "a", at(302)).await.unwrap().unwrap();
  assert_eq!(first.streak_bonus, 0);
  assert_eq!(s.get_streak("town", "a").await.unwrap().current, 1);

  let day2 = lifecycle::current_case(&s, "town", at(DAY), &rules()).await.unwrap();
  assert_eq!(day2.date_key, DateKey::of(at(DAY)));
  vote(&s, &day2.case_id, "a", 0, at(DAY + 10)).await;
  let day2 = lifecycle::load_case(&s, &day2.case_id, at(DAY + 301)).await.unwrap();
  let second = score::settle_score(&s, &day2, "a", at(DAY + 302)).await.unwrap().unwrap();
  assert_eq!(second.streak_bonus, 1);

  let streak = s.get_streak("town", "a").await.unwrap();
  assert_eq!((streak.current, streak.best), (2, 2));
  assert_eq!(streak.last_played_date, Some(day2.date_key));
}

#[tokio::test]
async fn minigame_keeps_best_and_clamps() {
  let s = store().await;
  assert_eq!(s.get_minigame_score("c", "a").await.unwrap(), 0);
  assert_eq!(score::record_minigame_score(&s, "c", "a", 120.4).await.unwrap(), 120);
  assert_eq!(score::record_minigame_score(&s, "c", "a", 80.0).await.unwrap(), 120);
  assert_eq!(score::record_minigame_score(&s, "c", "a", 1e9).await.unwrap(), 9999);
  assert!(matches!(
    score::record_minigame_score(&s, "c", "a", f64::NAN).await,
    Err(CoreError::InvalidInput(_))
  ));
}

// ─── Submissions ─────────────────────────────────────────────────────────────

fn request() -> SubmissionRequest {
  SubmissionRequest {
    text: long_text(),
    ..Default::default()
  }
}

#[tokio::test]
async fn submission_rate_limit_is_per_day() {
  let s = store().await;
  for i in 0..3 {
    submission::submit_case(&s, "town", "a", "alice", request(), format!("s{i}"), at(i))
      .await
      .unwrap();
  }
  let fourth =
    submission::submit_case(&s, "town", "a", "alice", request(), "s3".into(), at(10)).await;
  assert!(matches!(fourth, Err(CoreError::RateLimited(3))));

  // Another user, and the next day, are unaffected.
  submission::submit_case(&s, "town", "b", "bob", request(), "s4".into(), at(10))
    .await
    .unwrap();
  submission::submit_case(&s, "town", "a", "alice", request(), "s5".into(), at(86_400))
    .await
    .unwrap();
}

#[tokio::test]
async fn invalid_submission_is_not_stored() {
  let s = store().await;
  let short = SubmissionRequest {
    text: "too short".into(),
    ..Default::default()
  };
  let res = submission::submit_case(&s, "town", "a", "alice", short, "s0".into(), t0()).await;
  assert!(matches!(res, Err(CoreError::Submission(_))));
  assert!(s.get_submission("s0").await.unwrap().is_none());
}

#[tokio::test]
async fn review_is_applied_once() {
  let s = store().await;
  submission::submit_case(&s, "town", "a", "alice", request(), "s0".into(), t0())
    .await
    .unwrap();
  assert_eq!(s.pending_submissions("town").await.unwrap().len(), 1);

  let rejected = submission::review_submission(
    &s,
    "s0",
    Review::Reject {
      reason: "duplicate".into(),
    },
    "mod",
    at(5),
  )
  .await
  .unwrap();
  assert_eq!(rejected.status, SubmissionStatus::Rejected);
  assert_eq!(rejected.reject_reason.as_deref(), Some("duplicate"));
  assert_eq!(rejected.reviewed_by.as_deref(), Some("mod"));
  assert!(s.pending_submissions("town").await.unwrap().is_empty());

  let date: DateKey = "20250705".parse().unwrap();
  let again = s
    .review_submission("s0", Review::Approve { date }, "mod", at(6))
    .await
    .unwrap();
  assert_eq!(again, ReviewOutcome::AlreadyReviewed);

  let missing =
    submission::review_submission(&s, "nope", Review::Approve { date }, "mod", at(6)).await;
  assert!(matches!(missing, Err(CoreError::SubmissionNotFound)));
}

#[tokio::test]
async fn approved_submission_becomes_case_on_its_date() {
  let s = store().await;
  let req = SubmissionRequest {
    text:            long_text(),
    title:           Some("  Leftover Wars  ".into()),
    labels_override: Some(vec!["Flatmate".into(), "Me".into(), "Both".into(), "Nobody".into()]),
  };
  submission::submit_case(&s, "town", "a", "alice", req, "s0".into(), at(-86_400))
    .await
    .unwrap();
  submission::review_submission(
    &s,
    "s0",
    Review::Approve {
      date: DateKey::of(t0()),
    },
    "mod",
    at(-3600),
  )
  .await
  .unwrap();

  let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
  assert_eq!(case.source, CaseSource::User);
  assert_eq!(case.title, "Leftover Wars");
  assert_eq!(case.labels[0], "Flatmate");
  assert_eq!(case.created_by, "a");

  let used = s.get_submission("s0").await.unwrap().unwrap();
  assert_eq!(used.used_by_case.as_deref(), Some(case.case_id.as_str()));

  // Used submissions are not claimed again.
  let next = lifecycle::current_case(&s, "town", at(300), &rules()).await.unwrap();
  assert_eq!(next.source, CaseSource::Seed);
}

#[tokio::test]
async fn usernames_are_cached() {
  let s = store().await;
  assert!(s.cached_username("a").await.unwrap().is_none());
  s.cache_username("a", "alice").await.unwrap();
  s.cache_username("a", "alice2").await.unwrap();
  assert_eq!(s.cached_username("a").await.unwrap().as_deref(), Some("alice2"));
}

#[tokio::test]
async fn reopening_the_file_keeps_data() {
  let dir = std::env::temp_dir().join(format!("docket-test-{}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("docket.db");
  let _ = std::fs::remove_file(&path);

  let case_id = {
    let s = SqliteStore::open(&path).await.unwrap();
    let case = lifecycle::current_case(&s, "town", t0(), &rules()).await.unwrap();
    vote(&s, &case.case_id, "a", 0, at(1)).await;
    case.case_id
  };

  let s = SqliteStore::open(&path).await.unwrap();
  let agg = s.get_aggregate(&case_id).await.unwrap().unwrap();
  assert_eq!(agg.tally.voters, 1);
  let _ = std::fs::remove_dir_all(&dir);
}
