//! Server configuration.
//!
//! Layered from an optional TOML file and `DOCKET_`-prefixed environment
//! variables, with `__` separating nested keys:
//!
//! ```text
//! DOCKET_PORT=9000
//! DOCKET_COMMUNITIES=town,city
//! DOCKET_GAME__CYCLE_SECS=600
//! ```

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use config::{Config, Environment, File, FileFormat};
use docket_core::rules::GameRules;
use serde::{Deserialize, Serialize};

/// `store_path` value that selects a throwaway in-memory database.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  pub store_path:        PathBuf,
  /// Community used when a request does not name one.
  pub default_community: String,
  /// Communities the sweeper keeps a live case for. Empty means just the
  /// default community.
  pub communities:       Vec<String>,
  /// Community id to moderator user ids.
  pub moderators:        BTreeMap<String, Vec<String>>,
  /// User id to display name.
  pub usernames:         BTreeMap<String, String>,
  pub game:              GameRules,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:              "127.0.0.1".into(),
      port:              8080,
      store_path:        PathBuf::from("~/.local/share/docket/docket.db"),
      default_community: "general".into(),
      communities:       Vec::new(),
      moderators:        BTreeMap::new(),
      usernames:         BTreeMap::new(),
      game:              GameRules::default(),
    }
  }
}

impl ServerConfig {
  /// Read `path` (if it exists) and overlay the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = Config::builder()
      .add_source(File::from(path).required(false))
      .add_source(
        Environment::with_prefix("DOCKET")
          .prefix_separator("_")
          .separator("__")
          .list_separator(",")
          .with_list_parse_key("communities")
          .try_parsing(true),
      )
      .build()
      .with_context(|| format!("failed to read config from {path:?}"))?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  /// Parse a TOML document, with no environment overlay.
  pub fn from_toml(source: &str) -> anyhow::Result<Self> {
    Config::builder()
      .add_source(File::from_str(source, FileFormat::Toml))
      .build()
      .context("failed to parse config")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn validate(&self) -> anyhow::Result<()> {
    anyhow::ensure!(
      !self.default_community.trim().is_empty(),
      "default_community must not be empty"
    );
    anyhow::ensure!(
      self.communities.iter().all(|c| !c.trim().is_empty()),
      "communities must not contain empty names"
    );
    self.game.validate().map_err(anyhow::Error::msg)
  }

  /// The communities the sweeper materialises cases for.
  pub fn live_communities(&self) -> Vec<String> {
    if self.communities.is_empty() {
      vec![self.default_community.clone()]
    } else {
      self.communities.clone()
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// `None` when the store lives in memory.
  pub fn resolved_store_path(&self) -> Option<PathBuf> {
    if self.store_path.as_os_str() == IN_MEMORY {
      None
    } else {
      Some(expand_tilde(&self.store_path))
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
