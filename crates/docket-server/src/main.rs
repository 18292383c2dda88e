//! docket server binary.
//!
//! Reads `docket.toml` (or the path specified with `--config`), overlays
//! `DOCKET_*` environment variables, opens the SQLite store, starts the
//! lifecycle sweeper and serves the JSON API under `/api`.
//!
//! # Checking configuration
//!
//! ```
//! cargo run -p docket-server -- --check-config
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use docket_core::clock::SystemClock;
use docket_server::{ServerConfig, Sweeper};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Docket game server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "docket.toml")]
  config: PathBuf,

  /// Print the resolved configuration as JSON and exit.
  #[arg(long)]
  check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = ServerConfig::load(&cli.config)?;
  cfg.validate().context("invalid configuration")?;

  if cli.check_config {
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    return Ok(());
  }

  let store = docket_server::open_store(&cfg).await?;
  let state = docket_server::build_state(&cfg, store, Arc::new(SystemClock));

  tokio::spawn(Sweeper::new(state.clone(), cfg.live_communities()).run());

  let app = docket_server::router(state);
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
