//! Consecutive-day participation per user and community.

use serde::{Deserialize, Serialize};

use crate::keys::DateKey;

pub const MAX_STREAK_BONUS: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
  pub current:          u32,
  pub best:             u32,
  pub last_played_date: Option<DateKey>,
}

impl Streak {
  /// The streak after playing on `date`.
  ///
  /// A date on or before the last counted one changes nothing, so each
  /// calendar date counts once even when cases settle out of order. Playing
  /// on the calendar day after the last one extends the streak; a later
  /// date restarts it at 1.
  pub fn touched(self, date: DateKey) -> Self {
    if self.last_played_date.is_some_and(|last| date <= last) {
      return self;
    }
    let current = match self.last_played_date {
      Some(last) if date.previous() == Some(last) => self.current + 1,
      _ => 1,
    };
    Self {
      current,
      best: self.best.max(current),
      last_played_date: Some(date),
    }
  }
}

pub fn streak_bonus(current: u32) -> u32 { current.min(MAX_STREAK_BONUS) }
