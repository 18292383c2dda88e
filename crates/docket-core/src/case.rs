//! Cases: one round of the game, bound to a cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  keys::{CycleKey, DateKey},
  rules::GameRules,
};

pub type CaseId = String;
pub type UserId = String;
pub type CommunityId = String;

/// The four verdict options of a case, in index order.
pub type Labels = [String; 4];

pub const DEFAULT_LABELS: [&str; 4] =
  ["Right Call", "Wrong Call", "It Depends", "Everyone's Wrong"];

pub fn default_labels() -> Labels { DEFAULT_LABELS.map(String::from) }

/// Build the case id for a community and cycle.
pub fn case_id(community: &str, cycle: CycleKey) -> CaseId {
  format!("{community}-{cycle}")
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status. Only ever moves forward: `Open → Closed → Revealed`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CaseStatus {
  Open,
  Closed,
  Revealed,
}

impl CaseStatus {
  /// The status that follows this one, if any.
  pub fn next(self) -> Option<Self> {
    match self {
      Self::Open => Some(Self::Closed),
      Self::Closed => Some(Self::Revealed),
      Self::Revealed => None,
    }
  }
}

/// Where a case's content came from.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CaseSource {
  Seed,
  User,
}

// ─── Case ────────────────────────────────────────────────────────────────────

/// The text a case is played on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseContent {
  pub title:      String,
  pub text:       String,
  pub labels:     Labels,
  pub source:     CaseSource,
  pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
  pub case_id:    CaseId,
  #[serde(rename = "subId")]
  pub community:  CommunityId,
  pub cycle_key:  CycleKey,
  pub date_key:   DateKey,
  pub title:      String,
  pub text:       String,
  pub labels:     Labels,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub open_ts:    DateTime<Utc>,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub close_ts:   DateTime<Utc>,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub reveal_ts:  DateTime<Utc>,
  pub status:     CaseStatus,
  pub source:     CaseSource,
  pub created_by: String,
  pub post_id:    Option<String>,
}

impl Case {
  /// A freshly opened case for `cycle`, timed from `now`.
  pub fn open(
    community: &str,
    cycle: CycleKey,
    content: CaseContent,
    now: DateTime<Utc>,
    rules: &GameRules,
  ) -> Self {
    let close_ts = now + rules.open_window();
    Self {
      case_id: case_id(community, cycle),
      community: community.to_owned(),
      cycle_key: cycle,
      date_key: cycle.date(),
      title: content.title,
      text: content.text,
      labels: content.labels,
      open_ts: now,
      close_ts,
      reveal_ts: close_ts + rules.reveal_delay(),
      status: CaseStatus::Open,
      source: content.source,
      created_by: content.created_by,
      post_id: None,
    }
  }

  /// Whether a vote cast at `now` may be accepted.
  pub fn accepts_votes(&self, now: DateTime<Utc>) -> bool {
    self.status == CaseStatus::Open && now < self.close_ts
  }

  pub fn is_revealed(&self) -> bool { self.status == CaseStatus::Revealed }

  pub fn label(&self, index: usize) -> Option<&str> {
    self.labels.get(index).map(String::as_str)
  }
}
