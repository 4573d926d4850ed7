//! finstat-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) and
//! `FINSTAT_*` environment variables, opens the configured statement store,
//! and serves the JSON API over HTTP.

mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use finstat_core::store::StatementStore;
use finstat_store_memory::MemoryStore;
use finstat_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::{Backend, ServerConfig};

#[derive(Parser)]
#[command(author, version, about = "Financial statement store server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  init_tracing(cfg.log_json);
  tracing::info!(backend = ?cfg.backend, "starting finstat-server");

  match cfg.backend {
    Backend::Sqlite => {
      let store = SqliteStore::open(&cfg.store_path)
        .await
        .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;
      tracing::info!(path = %cfg.store_path.display(), "opened sqlite store");
      serve(store, &cfg.address()).await
    }
    Backend::Memory => {
      tracing::warn!("memory backend selected; statements will not survive a restart");
      serve(MemoryStore::new(), &cfg.address()).await
    }
  }
}

fn init_tracing(json: bool) {
  let filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy();

  if json {
    tracing_subscriber::fmt().json().with_env_filter(filter).init();
  } else {
    tracing_subscriber::fmt().with_env_filter(filter).init();
  }
}

async fn serve<S>(store: S, address: &str) -> anyhow::Result<()>
where
  S: StatementStore + 'static,
{
  let app = finstat_api::api_router(Arc::new(store)).layer(TraceLayer::new_for_http());

  let listener = TcpListener::bind(address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!("Listening on http://{address}");

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}
