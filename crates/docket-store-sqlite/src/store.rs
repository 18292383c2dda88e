//! [`SqliteStore`], the SQLite implementation of [`GameStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, types::Value};

use docket_core::{
  ballot::{Aggregate, Vote},
  case::{Case, CaseStatus},
  keys::{CycleKey, DateKey},
  lifecycle::Transition,
  score::ScoreBreakdown,
  snapshot::Snapshot,
  store::{
    Board, GameStore, Inserted, ReviewOutcome, SavedScore, Settlement, Standing,
    SubmitOutcome, Transitioned, VoteOutcome,
  },
  streak::Streak,
  submission::{CaseSubmission, Review, SubmissionStatus},
};

use crate::{
  Error, Result,
  encode::{
    AGGREGATE_COLUMNS, CASE_COLUMNS, RawAggregate, RawCase, RawScore, RawSnapshot,
    RawStreak, RawSubmission, RawTally, RawVote, SCORE_COLUMNS, SNAPSHOT_COLUMNS,
    SUBMISSION_COLUMNS, VOTE_COLUMNS, encode_labels, encode_ts,
  },
  schema::SCHEMA,
};

const COUNT_COLUMNS: [&str; 4] = ["count_0", "count_1", "count_2", "count_3"];

// ─── Store ───────────────────────────────────────────────────────────────────

/// A docket game store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// run one at a time on the connection's thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory store. Used by tests and `:memory:` configs.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row helpers (run on the connection thread) ──────────────────────────────

fn select_case(
  conn: &rusqlite::Connection,
  case_id: &str,
) -> rusqlite::Result<Option<RawCase>> {
  conn
    .query_row(
      &format!("SELECT {CASE_COLUMNS} FROM cases WHERE case_id = ?1"),
      [case_id],
      RawCase::from_row,
    )
    .optional()
}

fn select_vote(
  conn: &rusqlite::Connection,
  case_id: &str,
  user_id: &str,
) -> rusqlite::Result<Option<RawVote>> {
  conn
    .query_row(
      &format!("SELECT {VOTE_COLUMNS} FROM votes WHERE case_id = ?1 AND user_id = ?2"),
      [case_id, user_id],
      RawVote::from_row,
    )
    .optional()
}

fn select_aggregate(
  conn: &rusqlite::Connection,
  case_id: &str,
) -> rusqlite::Result<Option<RawAggregate>> {
  conn
    .query_row(
      &format!("SELECT {AGGREGATE_COLUMNS} FROM aggregates WHERE case_id = ?1"),
      [case_id],
      RawAggregate::from_row,
    )
    .optional()
}

fn select_score(
  conn: &rusqlite::Connection,
  case_id: &str,
  user_id: &str,
) -> rusqlite::Result<Option<RawScore>> {
  conn
    .query_row(
      &format!("SELECT {SCORE_COLUMNS} FROM scores WHERE case_id = ?1 AND user_id = ?2"),
      [case_id, user_id],
      RawScore::from_row,
    )
    .optional()
}

fn select_streak(
  conn: &rusqlite::Connection,
  community: &str,
  user_id: &str,
) -> rusqlite::Result<Option<RawStreak>> {
  conn
    .query_row(
      "SELECT current, best, last_played_date FROM streaks
       WHERE community = ?1 AND user_id = ?2",
      [community, user_id],
      RawStreak::from_row,
    )
    .optional()
}

fn select_submission(
  conn: &rusqlite::Connection,
  submission_id: &str,
) -> rusqlite::Result<Option<RawSubmission>> {
  conn
    .query_row(
      &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE submission_id = ?1"),
      [submission_id],
      RawSubmission::from_row,
    )
    .optional()
}

/// Apply [`Streak::touched`] for `date` to the stored streak.
fn touch_streak(
  tx: &rusqlite::Transaction<'_>,
  community: &str,
  user_id: &str,
  date: DateKey,
) -> tokio_rusqlite::Result<()> {
  let before = select_streak(tx, community, user_id)?
    .map(RawStreak::into_streak)
    .transpose()
    .map_err(other)?
    .unwrap_or_default();
  let after = before.touched(date);
  if after != before {
    tx.execute(
      "INSERT INTO streaks (community, user_id, current, best, last_played_date)
       VALUES (?1, ?2, ?3, ?4, ?5)
       ON CONFLICT (community, user_id) DO UPDATE SET
         current = excluded.current,
         best = excluded.best,
         last_played_date = excluded.last_played_date",
      rusqlite::params![
        community,
        user_id,
        after.current,
        after.best,
        after.last_played_date.map(|d| d.to_string()),
      ],
    )?;
  }
  Ok(())
}

/// Carry a decode failure out of a connection closure.
fn other(e: Error) -> tokio_rusqlite::Error { tokio_rusqlite::Error::Other(Box::new(e)) }

// ─── Boards ──────────────────────────────────────────────────────────────────

/// Where a board lives: table, score and entry-time columns, and a filter
/// over positional parameters `?1..?n` bound to `keys`.
struct BoardSql {
  table:  &'static str,
  score:  &'static str,
  since:  &'static str,
  filter: &'static str,
  keys:   Vec<Value>,
}

impl BoardSql {
  fn of(board: &Board) -> Self {
    match board {
      Board::Case(case_id) => Self {
        table:  "scores",
        score:  "total",
        since:  "saved_at",
        filter: "case_id = ?1",
        keys:   vec![Value::Text(case_id.clone())],
      },
      Board::Weekly { community, week } => Self {
        table:  "weekly_points",
        score:  "points",
        since:  "first_at",
        filter: "community = ?1 AND week_key = ?2",
        keys:   vec![Value::Text(community.clone()), Value::Text(week.to_string())],
      },
    }
  }

  /// Index of the next free positional parameter.
  fn next_param(&self) -> usize { self.keys.len() + 1 }
}

fn to_u64(n: i64) -> u64 { u64::try_from(n).unwrap_or(0) }

// ─── GameStore impl ──────────────────────────────────────────────────────────

enum RawVoteOutcome {
  Recorded(RawVote, RawAggregate),
  Duplicate,
  Closed,
  UnknownCase,
}

enum RawReviewOutcome {
  Reviewed(RawSubmission),
  NotFound,
  AlreadyReviewed,
}

impl GameStore for SqliteStore {
  type Error = Error;

  // ── Cases ─────────────────────────────────────────────────────────────────

  async fn insert_case_if_absent(
    &self,
    case: Case,
    claim: Option<String>,
  ) -> Result<Inserted<Case>> {
    let labels = encode_labels(&case.labels)?;
    let status = case.status.to_string();
    let source = case.source.to_string();

    let (raw, created) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let created = tx.execute(
          "INSERT INTO cases (
             case_id, community, cycle_key, date_key, title, body, labels,
             open_ts, close_ts, reveal_ts, status, source, created_by, post_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
           ON CONFLICT DO NOTHING",
          rusqlite::params![
            case.case_id,
            case.community,
            case.cycle_key.to_string(),
            case.date_key.to_string(),
            case.title,
            case.text,
            labels,
            encode_ts(case.open_ts),
            encode_ts(case.close_ts),
            encode_ts(case.reveal_ts),
            status,
            source,
            case.created_by,
            case.post_id,
          ],
        )? > 0;

        if let Some(submission_id) = claim.filter(|_| created) {
          tx.execute(
            "UPDATE submissions SET used_by_case = ?1
             WHERE submission_id = ?2 AND used_by_case IS NULL",
            rusqlite::params![case.case_id, submission_id],
          )?;
        }

        let raw = tx.query_row(
          &format!(
            "SELECT {CASE_COLUMNS} FROM cases WHERE community = ?1 AND cycle_key = ?2"
          ),
          rusqlite::params![case.community, case.cycle_key.to_string()],
          RawCase::from_row,
        )?;
        tx.commit()?;
        Ok((raw, created))
      })
      .await?;

    Ok(Inserted {
      value: raw.into_case()?,
      created,
    })
  }

  async fn get_case(&self, case_id: &str) -> Result<Option<Case>> {
    let case_id = case_id.to_owned();
    let raw = self
      .conn
      .call(move |conn| Ok(select_case(conn, &case_id)?))
      .await?;
    raw.map(RawCase::into_case).transpose()
  }

  async fn get_case_for_cycle(
    &self,
    community: &str,
    cycle: CycleKey,
  ) -> Result<Option<Case>> {
    let community = community.to_owned();
    let cycle_key = cycle.to_string();
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {CASE_COLUMNS} FROM cases WHERE community = ?1 AND cycle_key = ?2"
              ),
              [community, cycle_key],
              RawCase::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawCase::into_case).transpose()
  }

  async fn transition_case(
    &self,
    case_id: &str,
    transition: Transition,
  ) -> Result<Option<Transitioned>> {
    let case_id = case_id.to_owned();
    let from = transition.from.to_string();
    let to = transition.to.to_string();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let applied = tx.execute(
          "UPDATE cases SET status = ?3 WHERE case_id = ?1 AND status = ?2",
          [&case_id, &from, &to],
        )? > 0;
        let raw = select_case(&tx, &case_id)?;
        tx.commit()?;
        Ok(raw.map(|raw| (raw, applied)))
      })
      .await?;

    outcome
      .map(|(raw, applied)| {
        Ok(Transitioned {
          case: raw.into_case()?,
          applied,
        })
      })
      .transpose()
  }

  async fn set_case_post_id(&self, case_id: &str, post_id: &str) -> Result<bool> {
    let case_id = case_id.to_owned();
    let post_id = post_id.to_owned();
    let set = self
      .conn
      .call(move |conn| {
        Ok(
          conn.execute(
            "UPDATE cases SET post_id = ?2 WHERE case_id = ?1 AND post_id IS NULL",
            [case_id, post_id],
          )? > 0,
        )
      })
      .await?;
    Ok(set)
  }

  async fn reopen_case(&self, case: Case) -> Result<Option<Case>> {
    let labels = encode_labels(&case.labels)?;
    let source = case.source.to_string();
    let open = CaseStatus::Open.to_string();

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE cases SET
             title = ?2, body = ?3, labels = ?4, open_ts = ?5, close_ts = ?6,
             reveal_ts = ?7, source = ?8, created_by = ?9
           WHERE case_id = ?1 AND status = ?10",
          rusqlite::params![
            case.case_id,
            case.title,
            case.text,
            labels,
            encode_ts(case.open_ts),
            encode_ts(case.close_ts),
            encode_ts(case.reveal_ts),
            source,
            case.created_by,
            open,
          ],
        )?;
        let raw = if changed > 0 {
          select_case(&tx, &case.case_id)?
        } else {
          None
        };
        tx.commit()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawCase::into_case).transpose()
  }

  async fn recent_cases(
    &self,
    community: &str,
    status: CaseStatus,
    limit: usize,
  ) -> Result<Vec<Case>> {
    let community = community.to_owned();
    let status = status.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawCase> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CASE_COLUMNS} FROM cases
           WHERE community = ?1 AND status = ?2
           ORDER BY open_ts DESC
           LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![community, status, limit], RawCase::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawCase::into_case).collect()
  }

  async fn cases_with_status(&self, status: CaseStatus) -> Result<Vec<Case>> {
    let status = status.to_string();
    let raws: Vec<RawCase> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CASE_COLUMNS} FROM cases WHERE status = ?1 ORDER BY open_ts"
        ))?;
        let rows = stmt
          .query_map([status], RawCase::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawCase::into_case).collect()
  }

  // ── Votes and aggregates ──────────────────────────────────────────────────

  async fn cast_vote(&self, vote: Vote) -> Result<VoteOutcome> {
    let open = CaseStatus::Open.to_string();
    let column = COUNT_COLUMNS[vote.verdict.index()];
    let vote_ts = encode_ts(vote.vote_ts);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let state: Option<(String, i64)> = tx
          .query_row(
            "SELECT status, close_ts FROM cases WHERE case_id = ?1",
            [&vote.case_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let Some((status, close_ts)) = state else {
          return Ok(RawVoteOutcome::UnknownCase);
        };
        if status != open || vote_ts >= close_ts {
          return Ok(RawVoteOutcome::Closed);
        }

        let inserted = tx.execute(
          "INSERT INTO votes (case_id, user_id, verdict, prediction, vote_ts)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (case_id, user_id) DO NOTHING",
          rusqlite::params![
            vote.case_id,
            vote.user_id,
            vote.verdict.index() as i64,
            vote.prediction.index() as i64,
            vote_ts,
          ],
        )?;
        if inserted == 0 {
          return Ok(RawVoteOutcome::Duplicate);
        }

        tx.execute(
          &format!(
            "INSERT INTO aggregates (case_id, {column}, voters, last_updated_ts)
             VALUES (?1, 1, 1, ?2)
             ON CONFLICT (case_id) DO UPDATE SET
               {column} = {column} + 1,
               voters = voters + 1,
               last_updated_ts = excluded.last_updated_ts"
          ),
          rusqlite::params![vote.case_id, vote_ts],
        )?;

        let raw_vote = select_vote(&tx, &vote.case_id, &vote.user_id)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        let raw_aggregate = select_aggregate(&tx, &vote.case_id)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(RawVoteOutcome::Recorded(raw_vote, raw_aggregate))
      })
      .await?;

    Ok(match outcome {
      RawVoteOutcome::Recorded(vote, aggregate) => VoteOutcome::Recorded {
        vote:      vote.into_vote()?,
        aggregate: aggregate.into_aggregate()?,
      },
      RawVoteOutcome::Duplicate => VoteOutcome::Duplicate,
      RawVoteOutcome::Closed => VoteOutcome::Closed,
      RawVoteOutcome::UnknownCase => VoteOutcome::UnknownCase,
    })
  }

  async fn get_vote(&self, case_id: &str, user_id: &str) -> Result<Option<Vote>> {
    let case_id = case_id.to_owned();
    let user_id = user_id.to_owned();
    let raw = self
      .conn
      .call(move |conn| Ok(select_vote(conn, &case_id, &user_id)?))
      .await?;
    raw.map(RawVote::into_vote).transpose()
  }

  async fn mark_first_comment(
    &self,
    case_id: &str,
    user_id: &str,
    at: DateTime<Utc>,
  ) -> Result<Option<Vote>> {
    let case_id = case_id.to_owned();
    let user_id = user_id.to_owned();
    let at = encode_ts(at);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE votes SET first_comment_ts = ?3
           WHERE case_id = ?1 AND user_id = ?2 AND first_comment_ts IS NULL",
          rusqlite::params![case_id, user_id, at],
        )?;
        let raw = select_vote(&tx, &case_id, &user_id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawVote::into_vote).transpose()
  }

  async fn get_aggregate(&self, case_id: &str) -> Result<Option<Aggregate>> {
    let case_id = case_id.to_owned();
    let raw = self
      .conn
      .call(move |conn| Ok(select_aggregate(conn, &case_id)?))
      .await?;
    raw.map(RawAggregate::into_aggregate).transpose()
  }

  // ── Snapshots ─────────────────────────────────────────────────────────────

  async fn take_snapshot(&self, case_id: &str, at: DateTime<Utc>) -> Result<Snapshot> {
    let case_id = case_id.to_owned();
    let ts = encode_ts(at);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let tally = tx
          .query_row(
            "SELECT count_0, count_1, count_2, count_3, voters
             FROM aggregates WHERE case_id = ?1",
            [&case_id],
            |r| RawTally::from_row(r, 0),
          )
          .optional()?
          .unwrap_or(RawTally {
            counts: [0; 4],
            voters: 0,
          });

        tx.execute(
          "INSERT INTO snapshots (case_id, ts, count_0, count_1, count_2, count_3, voters)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (case_id, ts) DO NOTHING",
          rusqlite::params![
            case_id,
            ts,
            tally.counts[0],
            tally.counts[1],
            tally.counts[2],
            tally.counts[3],
            tally.voters,
          ],
        )?;

        let raw = tx.query_row(
          &format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE case_id = ?1 AND ts = ?2"),
          rusqlite::params![case_id, ts],
          RawSnapshot::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;
    raw.into_snapshot()
  }

  async fn snapshot_at_or_after(
    &self,
    case_id: &str,
    at: DateTime<Utc>,
  ) -> Result<Option<Snapshot>> {
    let case_id = case_id.to_owned();
    let ts = encode_ts(at);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM snapshots
                 WHERE case_id = ?1 AND ts >= ?2
                 ORDER BY ts
                 LIMIT 1"
              ),
              rusqlite::params![case_id, ts],
              RawSnapshot::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawSnapshot::into_snapshot).transpose()
  }

  // ── Scores and leaderboards ───────────────────────────────────────────────

  async fn settle_score(&self, settlement: Settlement) -> Result<SavedScore> {
    let Settlement {
      score,
      community,
      week,
      date,
      at,
    } = settlement;
    let week_key = week.to_string();
    let saved_at = encode_ts(at);

    let (raw, newly_saved) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT INTO scores (
             case_id, user_id, prediction_match, verdict_match, timing_bonus,
             influence_bonus, streak_bonus, mini_game_bonus, total, saved_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
           ON CONFLICT (case_id, user_id) DO NOTHING",
          rusqlite::params![
            score.case_id,
            score.user_id,
            score.prediction_match,
            score.verdict_match,
            score.timing_bonus,
            score.influence_bonus,
            score.streak_bonus,
            score.mini_game_bonus,
            score.total,
            saved_at,
          ],
        )? > 0;
        if inserted {
          tx.execute(
            "INSERT INTO weekly_points (community, week_key, user_id, points, first_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (community, week_key, user_id) DO UPDATE SET
               points = points + excluded.points",
            rusqlite::params![community, week_key, score.user_id, score.total, saved_at],
          )?;
          touch_streak(&tx, &community, &score.user_id, date)?;
        }
        let raw = select_score(&tx, &score.case_id, &score.user_id)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok((raw, inserted))
      })
      .await?;

    Ok(SavedScore {
      score: raw.into_score()?,
      newly_saved,
    })
  }

  async fn get_score(
    &self,
    case_id: &str,
    user_id: &str,
  ) -> Result<Option<ScoreBreakdown>> {
    let case_id = case_id.to_owned();
    let user_id = user_id.to_owned();
    let raw = self
      .conn
      .call(move |conn| Ok(select_score(conn, &case_id, &user_id)?))
      .await?;
    raw.map(RawScore::into_score).transpose()
  }

  async fn leaderboard_top(&self, board: &Board, limit: usize) -> Result<Vec<Standing>> {
    let sql = BoardSql::of(board);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let rows: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let query = format!(
          "SELECT user_id, {score} FROM {table}
           WHERE {filter}
           ORDER BY {score} DESC, {since} ASC, user_id ASC
           LIMIT ?{n}",
          score = sql.score,
          since = sql.since,
          table = sql.table,
          filter = sql.filter,
          n = sql.next_param(),
        );
        let mut params = sql.keys;
        params.push(Value::Integer(limit));

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |r| {
            Ok((r.get(0)?, r.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .zip(1..)
        .map(|((user_id, score), rank)| Standing {
          user_id,
          score: to_u64(score),
          rank,
        })
        .collect(),
    )
  }

  async fn leaderboard_standing(
    &self,
    board: &Board,
    user_id: &str,
  ) -> Result<Option<Standing>> {
    let sql = BoardSql::of(board);
    let user = user_id.to_owned();

    let row: Option<(i64, i64)> = self
      .conn
      .call(move |conn| {
        let n = sql.next_param();
        let own: Option<(i64, i64)> = conn
          .query_row(
            &format!(
              "SELECT {score}, {since} FROM {table} WHERE {filter} AND user_id = ?{n}",
              score = sql.score,
              since = sql.since,
              table = sql.table,
              filter = sql.filter,
            ),
            rusqlite::params_from_iter(
              sql.keys.iter().cloned().chain([Value::Text(user.clone())]),
            ),
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let Some((points, since_at)) = own else {
          return Ok(None);
        };

        let ahead: i64 = conn.query_row(
          &format!(
            "SELECT COUNT(*) FROM {table}
             WHERE {filter} AND (
               {score} > ?{p}
               OR ({score} = ?{p} AND ({since} < ?{s}
                 OR ({since} = ?{s} AND user_id < ?{u})))
             )",
            score = sql.score,
            since = sql.since,
            table = sql.table,
            filter = sql.filter,
            p = n,
            s = n + 1,
            u = n + 2,
          ),
          rusqlite::params_from_iter(sql.keys.iter().cloned().chain([
            Value::Integer(points),
            Value::Integer(since_at),
            Value::Text(user),
          ])),
          |r| r.get(0),
        )?;
        Ok(Some((points, ahead)))
      })
      .await?;

    Ok(row.map(|(points, ahead)| Standing {
      user_id: user_id.to_owned(),
      score:   to_u64(points),
      rank:    to_u64(ahead) + 1,
    }))
  }

  async fn leaderboard_size(&self, board: &Board) -> Result<u64> {
    let sql = BoardSql::of(board);
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!("SELECT COUNT(*) FROM {} WHERE {}", sql.table, sql.filter),
          rusqlite::params_from_iter(sql.keys),
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(to_u64(count))
  }

  // ── Streaks ───────────────────────────────────────────────────────────────

  async fn get_streak(&self, community: &str, user_id: &str) -> Result<Streak> {
    let community = community.to_owned();
    let user_id = user_id.to_owned();
    let raw = self
      .conn
      .call(move |conn| Ok(select_streak(conn, &community, &user_id)?))
      .await?;
    Ok(raw.map(RawStreak::into_streak).transpose()?.unwrap_or_default())
  }

  // ── Minigame ──────────────────────────────────────────────────────────────

  async fn record_minigame_score(
    &self,
    case_id: &str,
    user_id: &str,
    score: u32,
  ) -> Result<u32> {
    let case_id = case_id.to_owned();
    let user_id = user_id.to_owned();

    let best: i64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO minigame_scores (case_id, user_id, best) VALUES (?1, ?2, ?3)
           ON CONFLICT (case_id, user_id) DO UPDATE SET best = MAX(best, excluded.best)",
          rusqlite::params![case_id, user_id, score],
        )?;
        let best = tx.query_row(
          "SELECT best FROM minigame_scores WHERE case_id = ?1 AND user_id = ?2",
          [&case_id, &user_id],
          |r| r.get(0),
        )?;
        tx.commit()?;
        Ok(best)
      })
      .await?;
    Ok(u32::try_from(best).unwrap_or(score))
  }

  async fn get_minigame_score(&self, case_id: &str, user_id: &str) -> Result<u32> {
    let case_id = case_id.to_owned();
    let user_id = user_id.to_owned();
    let best: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT best FROM minigame_scores WHERE case_id = ?1 AND user_id = ?2",
              [case_id, user_id],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(best.and_then(|b| u32::try_from(b).ok()).unwrap_or(0))
  }

  // ── Submissions ───────────────────────────────────────────────────────────

  async fn submit_case(
    &self,
    submission: CaseSubmission,
    daily_limit: u32,
  ) -> Result<SubmitOutcome> {
    let labels = submission
      .labels_override
      .as_ref()
      .map(encode_labels)
      .transpose()?;
    let status = submission.status.to_string();
    let submitted_date = DateKey::of(submission.submitted_at).to_string();

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let already: i64 = tx.query_row(
          "SELECT COUNT(*) FROM submissions
           WHERE community = ?1 AND user_id = ?2 AND submitted_date = ?3",
          [&submission.community, &submission.user_id, &submitted_date],
          |r| r.get(0),
        )?;
        if already >= i64::from(daily_limit) {
          return Ok(None);
        }

        tx.execute(
          "INSERT INTO submissions (
             submission_id, community, user_id, username, body, title,
             labels_override, status, submitted_at, submitted_date
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            submission.submission_id,
            submission.community,
            submission.user_id,
            submission.username,
            submission.text,
            submission.title,
            labels,
            status,
            encode_ts(submission.submitted_at),
            submitted_date,
          ],
        )?;
        let raw = select_submission(&tx, &submission.submission_id)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    Ok(match raw {
      Some(raw) => SubmitOutcome::Accepted(raw.into_submission()?),
      None => SubmitOutcome::RateLimited,
    })
  }

  async fn get_submission(&self, submission_id: &str) -> Result<Option<CaseSubmission>> {
    let submission_id = submission_id.to_owned();
    let raw = self
      .conn
      .call(move |conn| Ok(select_submission(conn, &submission_id)?))
      .await?;
    raw.map(RawSubmission::into_submission).transpose()
  }

  async fn pending_submissions(&self, community: &str) -> Result<Vec<CaseSubmission>> {
    let community = community.to_owned();
    let pending = SubmissionStatus::Pending.to_string();
    let raws: Vec<RawSubmission> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBMISSION_COLUMNS} FROM submissions
           WHERE community = ?1 AND status = ?2
           ORDER BY submitted_at"
        ))?;
        let rows = stmt
          .query_map([community, pending], RawSubmission::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawSubmission::into_submission).collect()
  }

  async fn review_submission(
    &self,
    submission_id: &str,
    review: Review,
    reviewer: &str,
    at: DateTime<Utc>,
  ) -> Result<ReviewOutcome> {
    let submission_id = submission_id.to_owned();
    let reviewer = reviewer.to_owned();
    let at = encode_ts(at);
    let pending = SubmissionStatus::Pending.to_string();
    let (status, assigned_date, reason) = match review {
      Review::Approve { date } => (SubmissionStatus::Approved, Some(date.to_string()), None),
      Review::Reject { reason } => (SubmissionStatus::Rejected, None, Some(reason)),
    };
    let status = status.to_string();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current: Option<String> = tx
          .query_row(
            "SELECT status FROM submissions WHERE submission_id = ?1",
            [&submission_id],
            |r| r.get(0),
          )
          .optional()?;
        match current {
          None => return Ok(RawReviewOutcome::NotFound),
          Some(s) if s != pending => return Ok(RawReviewOutcome::AlreadyReviewed),
          Some(_) => {}
        }

        tx.execute(
          "UPDATE submissions SET
             status = ?2, assigned_date = ?3, reject_reason = ?4,
             reviewed_at = ?5, reviewed_by = ?6
           WHERE submission_id = ?1 AND status = ?7",
          rusqlite::params![
            submission_id,
            status,
            assigned_date,
            reason,
            at,
            reviewer,
            pending,
          ],
        )?;
        let raw = select_submission(&tx, &submission_id)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(RawReviewOutcome::Reviewed(raw))
      })
      .await?;

    Ok(match outcome {
      RawReviewOutcome::Reviewed(raw) => ReviewOutcome::Reviewed(raw.into_submission()?),
      RawReviewOutcome::NotFound => ReviewOutcome::NotFound,
      RawReviewOutcome::AlreadyReviewed => ReviewOutcome::AlreadyReviewed,
    })
  }

  async fn claimable_submission(
    &self,
    community: &str,
    date: DateKey,
  ) -> Result<Option<CaseSubmission>> {
    let community = community.to_owned();
    let date = date.to_string();
    let approved = SubmissionStatus::Approved.to_string();
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SUBMISSION_COLUMNS} FROM submissions
                 WHERE community = ?1 AND status = ?2 AND assigned_date = ?3
                   AND used_by_case IS NULL
                 ORDER BY reviewed_at, submitted_at
                 LIMIT 1"
              ),
              [community, approved, date],
              RawSubmission::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawSubmission::into_submission).transpose()
  }

  // ── Usernames ─────────────────────────────────────────────────────────────

  async fn cache_username(&self, user_id: &str, username: &str) -> Result<()> {
    let user_id = user_id.to_owned();
    let username = username.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO usernames (user_id, username) VALUES (?1, ?2)
           ON CONFLICT (user_id) DO UPDATE SET username = excluded.username",
          [user_id, username],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn cached_username(&self, user_id: &str) -> Result<Option<String>> {
    let user_id = user_id.to_owned();
    let name = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT username FROM usernames WHERE user_id = ?1",
              [user_id],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(name)
  }
}
