//! Minimal self-updating agent.
//!
//! Polls a local distribution endpoint every few seconds and swaps itself
//! when a newer version is published. Run a static file server on port 8080
//! serving a layout produced by the `packager` binary, then start this with
//! `AGENT_VERSION=v1 cargo run --example agent`.

use selfupdate::{EngineConfig, HttpFetcher, RemoteManifestTrigger, UpdateEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> selfupdate::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,selfupdate=debug".into()),
        )
        .init();

    let version = std::env::var("AGENT_VERSION").unwrap_or_else(|_| "v1".to_string());
    info!(%version, "agent starting");

    let fetcher = Arc::new(HttpFetcher::default());
    let trigger = Arc::new(RemoteManifestTrigger::new(
        "http://localhost:8080",
        "http://localhost:8080",
        "agent",
        "state",
        Duration::from_secs(3),
        fetcher.clone(),
    ));

    let engine = UpdateEngine::new(EngineConfig {
        current_version: version,
        state_dir: "state".into(),
        is_gzipped: true,
        exec_path: None,
        fetcher: Some(fetcher),
        trigger,
        on_success: Some(Arc::new(|candidate| {
            info!(version = %candidate.version, "updated, restart to take effect");
        })),
        on_failure: Some(Arc::new(|candidate, err| {
            info!(version = %candidate.version, error = %err, "update failed");
        })),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    engine.run_background(shutdown_rx).await
}
