//! Tunable timing and sizing parameters for the game.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Game parameters. Deserialised from the `[game]` table of the server
/// config; every field has a default so the table may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
  /// How long a case accepts votes after it opens.
  pub open_window_secs:        u32,
  /// Delay between closing and revealing results.
  pub reveal_delay_secs:       u32,
  /// Length of one case cycle, counted from UTC midnight.
  pub cycle_secs:              u32,
  /// Period between distribution snapshots of open cases.
  pub snapshot_interval_secs:  u32,
  /// Period of the background lifecycle sweep.
  pub sweep_interval_secs:     u32,
  pub case_leaderboard_size:   usize,
  pub weekly_leaderboard_size: usize,
  pub archive_default:         usize,
  pub archive_max:             usize,
}

impl Default for GameRules {
  fn default() -> Self {
    Self {
      open_window_secs:        240,
      reveal_delay_secs:       60,
      cycle_secs:              300,
      snapshot_interval_secs:  30,
      sweep_interval_secs:     15,
      case_leaderboard_size:   10,
      weekly_leaderboard_size: 15,
      archive_default:         24,
      archive_max:             100,
    }
  }
}

impl GameRules {
  pub fn open_window(&self) -> TimeDelta {
    TimeDelta::seconds(i64::from(self.open_window_secs))
  }

  pub fn reveal_delay(&self) -> TimeDelta {
    TimeDelta::seconds(i64::from(self.reveal_delay_secs))
  }

  pub fn snapshot_interval(&self) -> TimeDelta {
    TimeDelta::seconds(i64::from(self.snapshot_interval_secs))
  }

  /// Clamp a requested archive size into `1..=archive_max`.
  pub fn archive_limit(&self, requested: Option<usize>) -> usize {
    requested
      .unwrap_or(self.archive_default)
      .clamp(1, self.archive_max.max(1))
  }

  /// Reject configurations the lifecycle cannot honour.
  pub fn validate(&self) -> Result<(), String> {
    if self.open_window_secs == 0 {
      return Err("game.open_window_secs must be greater than zero".into());
    }
    if self.cycle_secs < 60 {
      return Err("game.cycle_secs must be at least 60".into());
    }
    if self.sweep_interval_secs == 0 || self.snapshot_interval_secs == 0 {
      return Err("game sweep and snapshot intervals must be non-zero".into());
    }
    Ok(())
  }
}
