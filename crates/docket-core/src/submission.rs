//! User-submitted cases and their moderation workflow.
//!
//! A submission starts `pending` and is reviewed exactly once, ending
//! `approved` (with an assigned date) or `rejected`. Approved submissions
//! are picked up when the first case for their date is materialised.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
  Error, Result,
  case::{CaseId, CommunityId, Labels, UserId},
  keys::DateKey,
  store::{GameStore, ReviewOutcome, SubmitOutcome},
};

pub const MIN_TEXT_CHARS: usize = 30;
pub const MAX_TEXT_CHARS: usize = 600;
pub const MAX_LABEL_CHARS: usize = 30;
pub const MAX_SUBMISSIONS_PER_DAY: u32 = 3;

// ─── Types ───────────────────────────────────────────────────────────────────

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
pub enum SubmissionStatus {
  Pending,
  Approved,
  Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSubmission {
  pub submission_id:   String,
  #[serde(rename = "subId")]
  pub community:       CommunityId,
  pub user_id:         UserId,
  pub username:        String,
  pub text:            String,
  pub title:           Option<String>,
  pub labels_override: Option<Labels>,
  pub status:          SubmissionStatus,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub submitted_at:    DateTime<Utc>,
  #[serde(with = "chrono::serde::ts_milliseconds_option")]
  pub reviewed_at:     Option<DateTime<Utc>>,
  pub reviewed_by:     Option<UserId>,
  pub reject_reason:   Option<String>,
  pub assigned_date:   Option<DateKey>,
  /// The case this submission was played as, once used.
  pub used_by_case:    Option<CaseId>,
}

/// A moderator's decision on a pending submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Review {
  Approve { date: DateKey },
  Reject { reason: String },
}

/// Why submitted text or labels were refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionProblem {
  #[error("Text cannot be empty")]
  Empty,

  #[error("Text must be at least 30 characters")]
  TooShort,

  #[error("Text must be 600 characters or less (currently {0})")]
  TooLong(usize),

  #[error("Submission contains prohibited content (personal info, harmful content)")]
  ProhibitedContent,

  #[error("Submissions cannot request medical or legal advice")]
  AdviceRequest,

  #[error("Labels must be an array of exactly 4 strings")]
  LabelCount,

  #[error("Each label must be a non-empty string")]
  EmptyLabel,

  #[error("Each label must be 30 characters or less")]
  LabelTooLong,
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Check submitted text and return it trimmed.
pub fn validate_text(text: &str) -> Result<String, SubmissionProblem> {
  let trimmed = text.trim();
  let chars = trimmed.chars().count();
  if chars == 0 {
    return Err(SubmissionProblem::Empty);
  }
  if chars > MAX_TEXT_CHARS {
    return Err(SubmissionProblem::TooLong(chars));
  }
  if chars < MIN_TEXT_CHARS {
    return Err(SubmissionProblem::TooShort);
  }
  if contains_personal_info(trimmed) || contains_harmful_words(trimmed) {
    return Err(SubmissionProblem::ProhibitedContent);
  }
  if requests_advice(trimmed) {
    return Err(SubmissionProblem::AdviceRequest);
  }
  Ok(trimmed.to_owned())
}

/// Check a labels override and return it as a fixed set of four.
pub fn validate_labels(labels: Vec<String>) -> Result<Labels, SubmissionProblem> {
  let labels: Labels = labels
    .try_into()
    .map_err(|_| SubmissionProblem::LabelCount)?;
  for label in &labels {
    if label.trim().is_empty() {
      return Err(SubmissionProblem::EmptyLabel);
    }
    if label.chars().count() > MAX_LABEL_CHARS {
      return Err(SubmissionProblem::LabelTooLong);
    }
  }
  Ok(labels)
}

// ─── Pattern scanning ────────────────────────────────────────────────────────
//
// Word boundaries follow the ASCII notion: letters, digits and `_` are word
// characters, everything else separates.

fn is_word(b: u8) -> bool { b.is_ascii_alphanumeric() || b == b'_' }

fn boundary_before(bytes: &[u8], i: usize) -> bool {
  i == 0 || !is_word(bytes[i - 1])
}

fn boundary_after(bytes: &[u8], end: usize) -> bool {
  end >= bytes.len() || !is_word(bytes[end])
}

enum Part {
  Digits(usize),
  OptionalSep(&'static [u8]),
}

/// Match `parts` at `start`, returning the end offset.
fn match_digits(bytes: &[u8], start: usize, parts: &[Part]) -> Option<usize> {
  let mut i = start;
  for part in parts {
    match part {
      Part::Digits(n) => {
        let run = bytes.get(i..i + n)?;
        if !run.iter().all(u8::is_ascii_digit) {
          return None;
        }
        i += n;
      }
      Part::OptionalSep(seps) => {
        if bytes.get(i).is_some_and(|b| seps.contains(b)) {
          i += 1;
        }
      }
    }
  }
  Some(i)
}

const PHONE: &[Part] = &[
  Part::Digits(3),
  Part::OptionalSep(b"-."),
  Part::Digits(3),
  Part::OptionalSep(b"-."),
  Part::Digits(4),
];

const NATIONAL_ID: &[Part] = &[
  Part::Digits(3),
  Part::OptionalSep(b"-"),
  Part::Digits(2),
  Part::OptionalSep(b"-"),
  Part::Digits(4),
];

fn contains_number_pattern(text: &str, parts: &[Part]) -> bool {
  let bytes = text.as_bytes();
  (0..bytes.len())
    .filter(|&i| bytes[i].is_ascii_digit() && boundary_before(bytes, i))
    .any(|i| match_digits(bytes, i, parts).is_some_and(|end| boundary_after(bytes, end)))
}

fn is_local_char(b: u8) -> bool {
  b.is_ascii_alphanumeric() || b"._%+-".contains(&b)
}

fn is_domain_char(b: u8) -> bool { b.is_ascii_alphanumeric() || b == b'.' || b == b'-' }

fn contains_email(text: &str) -> bool {
  let bytes = text.as_bytes();
  bytes.iter().enumerate().filter(|&(_, &b)| b == b'@').any(|(at, _)| {
    let local_start = bytes[..at]
      .iter()
      .rposition(|&b| !is_local_char(b))
      .map_or(0, |p| p + 1);
    let local = &bytes[local_start..at];
    if !local.iter().any(u8::is_ascii_alphanumeric) {
      return false;
    }

    let domain_end = bytes[at + 1..]
      .iter()
      .position(|&b| !is_domain_char(b))
      .map_or(bytes.len(), |p| at + 1 + p);
    let domain = &bytes[at + 1..domain_end];

    // Some `.` inside the domain must be followed by a top-level label of at
    // least two letters that ends on a word boundary.
    domain.iter().enumerate().any(|(k, &b)| {
      if b != b'.' || k == 0 {
        return false;
      }
      let tld_start = at + 1 + k + 1;
      let letters = bytes[tld_start..]
        .iter()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
      letters >= 2 && boundary_after(bytes, tld_start + letters)
    })
  })
}

fn contains_personal_info(text: &str) -> bool {
  contains_number_pattern(text, PHONE)
    || contains_email(text)
    || contains_number_pattern(text, NATIONAL_ID)
}

/// Lowercased ASCII words with the separator text preceding each.
fn words(text: &str) -> Vec<(&str, String)> {
  let bytes = text.as_bytes();
  let mut out = Vec::new();
  let mut gap_start = 0;
  let mut i = 0;
  while i < bytes.len() {
    if is_word(bytes[i]) {
      let start = i;
      while i < bytes.len() && is_word(bytes[i]) {
        i += 1;
      }
      out.push((&text[gap_start..start], text[start..i].to_ascii_lowercase()));
      gap_start = i;
    } else {
      i += 1;
    }
  }
  out
}

const HARMFUL_WORDS: &[&str] =
  &["kill", "murder", "suicide", "selfharm", "doxx", "dox", "swat"];

fn contains_harmful_words(text: &str) -> bool {
  let words = words(text);
  words.iter().any(|(_, w)| HARMFUL_WORDS.contains(&w.as_str()))
    || words.windows(2).any(|pair| {
      let [(_, first), (gap, second)] = pair else {
        return false;
      };
      first == "self" && (*gap == "-" || *gap == " ") && second == "harm"
    })
}

const ADVICE_PHRASES: &[(&[&str], &[&str])] = &[
  (&["medical"], &["advice", "diagnosis", "treatment"]),
  (&["legal"], &["advice", "counsel"]),
  (&["prescription", "medication"], &["advice", "recommendation"]),
];

fn requests_advice(text: &str) -> bool {
  words(text).windows(2).any(|pair| {
    let [(_, first), (gap, second)] = pair else {
      return false;
    };
    if !gap.chars().all(char::is_whitespace) {
      return false;
    }
    ADVICE_PHRASES.iter().any(|(lead, follow)| {
      lead.contains(&first.as_str()) && follow.contains(&second.as_str())
    })
  })
}

// ─── Operations ──────────────────────────────────────────────────────────────

/// What a caller asks to submit, before validation.
#[derive(Debug, Clone, Default)]
pub struct SubmissionRequest {
  pub text:            String,
  pub title:           Option<String>,
  pub labels_override: Option<Vec<String>>,
}

/// Validate and store a new pending submission, enforcing the daily limit.
pub async fn submit_case<S: GameStore>(
  store: &S,
  community: &str,
  user_id: &str,
  username: &str,
  request: SubmissionRequest,
  submission_id: String,
  now: DateTime<Utc>,
) -> Result<CaseSubmission> {
  let text = validate_text(&request.text)?;
  let labels_override = request
    .labels_override
    .map(validate_labels)
    .transpose()?;
  let title = request
    .title
    .map(|t| t.trim().to_owned())
    .filter(|t| !t.is_empty());

  let submission = CaseSubmission {
    submission_id,
    community: community.to_owned(),
    user_id: user_id.to_owned(),
    username: username.to_owned(),
    text,
    title,
    labels_override,
    status: SubmissionStatus::Pending,
    submitted_at: now,
    reviewed_at: None,
    reviewed_by: None,
    reject_reason: None,
    assigned_date: None,
    used_by_case: None,
  };

  match store
    .submit_case(submission, MAX_SUBMISSIONS_PER_DAY)
    .await
    .map_err(Error::store)?
  {
    SubmitOutcome::Accepted(sub) => {
      info!(submission_id = %sub.submission_id, user_id, "case submitted");
      Ok(sub)
    }
    SubmitOutcome::RateLimited => Err(Error::RateLimited(MAX_SUBMISSIONS_PER_DAY)),
  }
}

/// Apply a moderator's review to a pending submission.
pub async fn review_submission<S: GameStore>(
  store: &S,
  submission_id: &str,
  review: Review,
  reviewer: &str,
  now: DateTime<Utc>,
) -> Result<CaseSubmission> {
  match store
    .review_submission(submission_id, review, reviewer, now)
    .await
    .map_err(Error::store)?
  {
    ReviewOutcome::Reviewed(sub) => {
      info!(
        submission_id,
        reviewer,
        status = %sub.status,
        "submission reviewed"
      );
      Ok(sub)
    }
    ReviewOutcome::NotFound => Err(Error::SubmissionNotFound),
    ReviewOutcome::AlreadyReviewed => Err(Error::AlreadyReviewed),
  }
}
