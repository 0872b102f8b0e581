//! `carelink-track` prints the live distance between a client's home and
//! their linked caregiver.
//!
//! # Usage
//!
//! ```text
//! carelink-track --url http://localhost:8080 --client cl-1
//! carelink-track --config ~/.config/carelink/track.toml
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use carelink_core::subject::AccountId;
use carelink_tracker::{
  ProximityUpdate, TrackerConfig,
  client::{ApiClient, ApiConfig},
};
use clap::Parser;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "carelink-track", about = "Follow a linked caregiver's live position")]
struct Args {
  /// Path to a TOML config file (url, client, interval_secs).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the carelink server (default: http://localhost:8080).
  #[arg(long, env = "CARELINK_URL")]
  url: Option<String>,

  /// Account id of the client whose caregiver is tracked.
  #[arg(long, env = "CARELINK_CLIENT")]
  client: Option<String>,

  /// Seconds between polls (default: 3).
  #[arg(long)]
  interval_secs: Option<u64>,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:               String,
  #[serde(default)]
  client:            String,
  interval_secs:     Option<u64>,
  read_timeout_secs: Option<u64>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let base_url = args
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| "http://localhost:8080".to_string());
  let Some(client_raw) = args
    .client
    .or_else(|| (!file_cfg.client.is_empty()).then(|| file_cfg.client.clone()))
  else {
    bail!("no client given; pass --client or set CARELINK_CLIENT");
  };
  let client = AccountId::parse(&client_raw).context("invalid client id")?;

  let mut tracker = TrackerConfig::default();
  if let Some(secs) = args.interval_secs.or(file_cfg.interval_secs) {
    tracker.interval = Duration::from_secs(secs.max(1));
  }
  if let Some(secs) = file_cfg.read_timeout_secs {
    tracker.read_timeout = Duration::from_secs(secs.max(1));
  }

  let api = Arc::new(
    ApiClient::new(ApiConfig { base_url, request_timeout: tracker.read_timeout })
      .context("failed to build HTTP client")?,
  );

  let home = match api.client_home(&client).await {
    Ok(Some(view)) => Some(view.coordinates),
    Ok(None) => {
      println!("No home location on file for {client}; distances unavailable.");
      None
    }
    Err(e) => {
      tracing::warn!(error = %e, "home lookup failed");
      None
    }
  };

  let (handle, mut updates) = carelink_tracker::spawn(api, client, home, tracker);

  loop {
    tokio::select! {
      update = updates.recv() => match update {
        Some(update) => print_update(&update),
        None => break,
      },
      _ = tokio::signal::ctrl_c() => {
        handle.cancel();
        break;
      }
    }
  }

  let reason = handle.join().await.context("tracking task failed")?;
  println!("Stopped: {reason:?}");
  Ok(())
}

fn print_update(update: &ProximityUpdate) {
  match update {
    ProximityUpdate::Located { caregiver, fix, distance_km: Some(km) } => println!(
      "{caregiver} is {km:.2} km away ({:.5}, {:.5}) as of {}",
      fix.coordinates.lat, fix.coordinates.lng, fix.updated_at
    ),
    ProximityUpdate::Located { caregiver, fix, distance_km: None } => println!(
      "{caregiver} at ({:.5}, {:.5}) as of {}",
      fix.coordinates.lat, fix.coordinates.lng, fix.updated_at
    ),
    ProximityUpdate::NoDataYet { caregiver } => {
      println!("{caregiver} has not shared a position yet")
    }
    ProximityUpdate::Degraded { consecutive_failures, retry_in } => println!(
      "Connection trouble ({consecutive_failures} failed reads); retrying in {}s",
      retry_in.as_secs()
    ),
  }
}
