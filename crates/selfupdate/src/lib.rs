//! Self-updating binary engine.
//!
//! A long-running subsystem that discovers newer versions of the running
//! executable, downloads either a full replacement or a binary delta,
//! verifies its SHA-256, and atomically swaps the binary on disk with
//! rollback on failure. Discovery ([`Trigger`]) and transport ([`Fetcher`])
//! are pluggable capabilities; the engine is their single consumer.
//!
//! The on-disk invariant: the executable is always runnable. Verified bytes
//! are staged as `.{binary}.new`, the live binary is displaced to
//! `.{binary}.old`, and the stage is renamed in, all within one directory
//! so each step is a single-filesystem rename. A failed swap restores the
//! displaced binary; the new image only takes effect on the next start.
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use selfupdate::{EngineConfig, HttpFetcher, RemoteManifestTrigger, UpdateEngine};
//! use tokio::sync::watch;
//!
//! # async fn demo() -> selfupdate::Result<()> {
//! let fetcher = Arc::new(HttpFetcher::default());
//! let trigger = Arc::new(RemoteManifestTrigger::new(
//!     "https://updates.example.com/api",
//!     "https://updates.example.com/pkg",
//!     "agent",
//!     "state",
//!     Duration::from_secs(3600),
//!     fetcher.clone(),
//! ));
//! let engine = UpdateEngine::new(EngineConfig {
//!     current_version: env!("CARGO_PKG_VERSION").to_string(),
//!     state_dir: "state".into(),
//!     is_gzipped: true,
//!     exec_path: None,
//!     fetcher: Some(fetcher),
//!     trigger,
//!     on_success: None,
//!     on_failure: None,
//! });
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! engine.run_background(shutdown_rx).await
//! # }
//! ```

mod engine;
mod error;
mod fetcher;
mod hash;
mod manifest;
mod patch;
mod swap;
mod trigger;

pub use engine::{EngineConfig, FailureHook, SuccessHook, UpdateEngine, DEV_VERSION};
pub use error::{DecompressError, FetchError, PatchError, Result, UpdateError};
pub use fetcher::{Fetcher, HttpFetcher, HttpFetcherBuilder};
pub use hash::{sha256, verify, HASH_LEN};
pub use manifest::{
    platform_tag, CandidateUpdate, LocalManifest, LocalManifestEntry, ReleaseManifest,
};
pub use patch::{apply_delta, decompress};
pub use trigger::{LocalManifestTrigger, RemoteManifestTrigger, Trigger};
