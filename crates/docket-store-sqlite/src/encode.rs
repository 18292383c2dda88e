//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are INTEGER milliseconds. Keys and enum tags are stored as
//! their text form. Label sets are compact JSON arrays.

use chrono::{DateTime, Utc};
use docket_core::{
  ballot::{Aggregate, Choice, Tally, Vote},
  case::{Case, Labels},
  score::ScoreBreakdown,
  snapshot::Snapshot,
  streak::Streak,
  submission::CaseSubmission,
};

use crate::{Error, Result};

// ─── Timestamps ──────────────────────────────────────────────────────────────

pub fn encode_ts(dt: DateTime<Utc>) -> i64 { dt.timestamp_millis() }

pub fn decode_ts(ms: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_millis(ms)
    .ok_or_else(|| Error::Decode(format!("timestamp out of range: {ms}")))
}

// ─── Text-tagged values ──────────────────────────────────────────────────────

/// Parse a value stored via its `Display` form.
pub fn decode_tag<T>(s: &str, what: &str) -> Result<T>
where
  T: std::str::FromStr,
{
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {what}: {s:?}")))
}

pub fn encode_labels(labels: &Labels) -> Result<String> {
  Ok(serde_json::to_string(labels)?)
}

pub fn decode_labels(s: &str) -> Result<Labels> { Ok(serde_json::from_str(s)?) }

fn decode_choice(index: i64) -> Result<Choice> {
  Choice::new(index).ok_or_else(|| Error::Decode(format!("choice out of range: {index}")))
}

fn decode_count(n: i64) -> Result<u32> {
  u32::try_from(n).map_err(|_| Error::Decode(format!("count out of range: {n}")))
}

fn decode_counts(counts: [i64; 4]) -> Result<[u32; 4]> {
  Ok([
    decode_count(counts[0])?,
    decode_count(counts[1])?,
    decode_count(counts[2])?,
    decode_count(counts[3])?,
  ])
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const CASE_COLUMNS: &str = "case_id, community, cycle_key, date_key, title, body, \
                                labels, open_ts, close_ts, reveal_ts, status, source, \
                                created_by, post_id";

/// Raw values read directly from a `cases` row.
pub struct RawCase {
  pub case_id:    String,
  pub community:  String,
  pub cycle_key:  String,
  pub date_key:   String,
  pub title:      String,
  pub body:       String,
  pub labels:     String,
  pub open_ts:    i64,
  pub close_ts:   i64,
  pub reveal_ts:  i64,
  pub status:     String,
  pub source:     String,
  pub created_by: String,
  pub post_id:    Option<String>,
}

impl RawCase {
  /// Read a row selected with [`CASE_COLUMNS`].
  pub fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id:    r.get(0)?,
      community:  r.get(1)?,
      cycle_key:  r.get(2)?,
      date_key:   r.get(3)?,
      title:      r.get(4)?,
      body:       r.get(5)?,
      labels:     r.get(6)?,
      open_ts:    r.get(7)?,
      close_ts:   r.get(8)?,
      reveal_ts:  r.get(9)?,
      status:     r.get(10)?,
      source:     r.get(11)?,
      created_by: r.get(12)?,
      post_id:    r.get(13)?,
    })
  }

  pub fn into_case(self) -> Result<Case> {
    Ok(Case {
      case_id:    self.case_id,
      community:  self.community,
      cycle_key:  self.cycle_key.parse()?,
      date_key:   self.date_key.parse()?,
      title:      self.title,
      text:       self.body,
      labels:     decode_labels(&self.labels)?,
      open_ts:    decode_ts(self.open_ts)?,
      close_ts:   decode_ts(self.close_ts)?,
      reveal_ts:  decode_ts(self.reveal_ts)?,
      status:     decode_tag(&self.status, "case status")?,
      source:     decode_tag(&self.source, "case source")?,
      created_by: self.created_by,
      post_id:    self.post_id,
    })
  }
}

pub const VOTE_COLUMNS: &str =
  "case_id, user_id, verdict, prediction, vote_ts, first_comment_ts";

pub struct RawVote {
  pub case_id:          String,
  pub user_id:          String,
  pub verdict:          i64,
  pub prediction:       i64,
  pub vote_ts:          i64,
  pub first_comment_ts: Option<i64>,
}

impl RawVote {
  pub fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id:          r.get(0)?,
      user_id:          r.get(1)?,
      verdict:          r.get(2)?,
      prediction:       r.get(3)?,
      vote_ts:          r.get(4)?,
      first_comment_ts: r.get(5)?,
    })
  }

  pub fn into_vote(self) -> Result<Vote> {
    Ok(Vote {
      case_id:          self.case_id,
      user_id:          self.user_id,
      verdict:          decode_choice(self.verdict)?,
      prediction:       decode_choice(self.prediction)?,
      vote_ts:          decode_ts(self.vote_ts)?,
      first_comment_ts: self.first_comment_ts.map(decode_ts).transpose()?,
    })
  }
}

/// Counts and voters, shared by aggregates and snapshots.
pub struct RawTally {
  pub counts: [i64; 4],
  pub voters: i64,
}

impl RawTally {
  /// Read five columns `count_0..count_3, voters` starting at `offset`.
  pub fn from_row(r: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      counts: [
        r.get(offset)?,
        r.get(offset + 1)?,
        r.get(offset + 2)?,
        r.get(offset + 3)?,
      ],
      voters: r.get(offset + 4)?,
    })
  }

  pub fn into_tally(self) -> Result<Tally> {
    Ok(Tally {
      counts: decode_counts(self.counts)?,
      voters: decode_count(self.voters)?,
    })
  }
}

pub const AGGREGATE_COLUMNS: &str =
  "case_id, count_0, count_1, count_2, count_3, voters, last_updated_ts";

pub struct RawAggregate {
  pub case_id:         String,
  pub tally:           RawTally,
  pub last_updated_ts: i64,
}

impl RawAggregate {
  pub fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id:         r.get(0)?,
      tally:           RawTally::from_row(r, 1)?,
      last_updated_ts: r.get(6)?,
    })
  }

  pub fn into_aggregate(self) -> Result<Aggregate> {
    Ok(Aggregate {
      case_id:         self.case_id,
      tally:           self.tally.into_tally()?,
      last_updated_ts: decode_ts(self.last_updated_ts)?,
    })
  }
}

pub const SNAPSHOT_COLUMNS: &str =
  "case_id, ts, count_0, count_1, count_2, count_3, voters";

pub struct RawSnapshot {
  pub case_id: String,
  pub ts:      i64,
  pub tally:   RawTally,
}

impl RawSnapshot {
  pub fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id: r.get(0)?,
      ts:      r.get(1)?,
      tally:   RawTally::from_row(r, 2)?,
    })
  }

  pub fn into_snapshot(self) -> Result<Snapshot> {
    Ok(Snapshot {
      case_id: self.case_id,
      ts:      decode_ts(self.ts)?,
      tally:   self.tally.into_tally()?,
    })
  }
}

pub const SCORE_COLUMNS: &str = "case_id, user_id, prediction_match, verdict_match, \
                                 timing_bonus, influence_bonus, streak_bonus, \
                                 mini_game_bonus, total";

pub struct RawScore {
  pub case_id:    String,
  pub user_id:    String,
  pub components: [i64; 7],
}

impl RawScore {
  pub fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id:    r.get(0)?,
      user_id:    r.get(1)?,
      components: [
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
        r.get(8)?,
      ],
    })
  }

  pub fn into_score(self) -> Result<ScoreBreakdown> {
    let [prediction, verdict, timing, influence, streak, mini_game, total] =
      self.components;
    Ok(ScoreBreakdown {
      case_id:          self.case_id,
      user_id:          self.user_id,
      prediction_match: decode_count(prediction)?,
      verdict_match:    decode_count(verdict)?,
      timing_bonus:     decode_count(timing)?,
      influence_bonus:  decode_count(influence)?,
      streak_bonus:     decode_count(streak)?,
      mini_game_bonus:  decode_count(mini_game)?,
      total:            decode_count(total)?,
    })
  }
}

pub struct RawStreak {
  pub current:          i64,
  pub best:             i64,
  pub last_played_date: Option<String>,
}

impl RawStreak {
  /// Read `current, best, last_played_date`.
  pub fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      current:          r.get(0)?,
      best:             r.get(1)?,
      last_played_date: r.get(2)?,
    })
  }

  pub fn into_streak(self) -> Result<Streak> {
    Ok(Streak {
      current:          decode_count(self.current)?,
      best:             decode_count(self.best)?,
      last_played_date: self
        .last_played_date
        .as_deref()
        .map(str::parse)
        .transpose()?,
    })
  }
}

pub const SUBMISSION_COLUMNS: &str =
  "submission_id, community, user_id, username, body, title, labels_override, \
   status, submitted_at, reviewed_at, reviewed_by, reject_reason, assigned_date, \
   used_by_case";

pub struct RawSubmission {
  pub submission_id:   String,
  pub community:       String,
  pub user_id:         String,
  pub username:        String,
  pub body:            String,
  pub title:           Option<String>,
  pub labels_override: Option<String>,
  pub status:          String,
  pub submitted_at:    i64,
  pub reviewed_at:     Option<i64>,
  pub reviewed_by:     Option<String>,
  pub reject_reason:   Option<String>,
  pub assigned_date:   Option<String>,
  pub used_by_case:    Option<String>,
}

impl RawSubmission {
  pub fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      submission_id:   r.get(0)?,
      community:       r.get(1)?,
      user_id:         r.get(2)?,
      username:        r.get(3)?,
      body:            r.get(4)?,
      title:           r.get(5)?,
      labels_override: r.get(6)?,
      status:          r.get(7)?,
      submitted_at:    r.get(8)?,
      reviewed_at:     r.get(9)?,
      reviewed_by:     r.get(10)?,
      reject_reason:   r.get(11)?,
      assigned_date:   r.get(12)?,
      used_by_case:    r.get(13)?,
    })
  }

  pub fn into_submission(self) -> Result<CaseSubmission> {
    Ok(CaseSubmission {
      submission_id:   self.submission_id,
      community:       self.community,
      user_id:         self.user_id,
      username:        self.username,
      text:            self.body,
      title:           self.title,
      labels_override: self
        .labels_override
        .as_deref()
        .map(decode_labels)
        .transpose()?,
      status:          decode_tag(&self.status, "submission status")?,
      submitted_at:    decode_ts(self.submitted_at)?,
      reviewed_at:     self.reviewed_at.map(decode_ts).transpose()?,
      reviewed_by:     self.reviewed_by,
      reject_reason:   self.reject_reason,
      assigned_date:   self
        .assigned_date
        .as_deref()
        .map(str::parse)
        .transpose()?,
      used_by_case:    self.used_by_case,
    })
  }
}
