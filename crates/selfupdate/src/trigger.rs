//! Update discovery: pluggable triggers emitting candidate updates.
//!
//! A trigger owns its schedule. Each tick it consults the persisted
//! next-check instant (`cktime` in the state directory), probes its manifest
//! source, and pushes the next check out by `interval` plus a small random
//! jitter. The engine pulls candidates one at a time, so a slow consumer
//! simply delays the next probe.

use crate::engine::exec_relative;
use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::hash::HASH_LEN;
use crate::manifest::{platform_tag, CandidateUpdate, LocalManifest, ReleaseManifest};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{self, BoxStream};
use rand::Rng;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// File inside the state directory holding the next allowed check instant.
const CHECK_STATE_FILE: &str = "cktime";

/// How soon (minutes) to retry after an unreadable or unparsable `cktime`.
const BAD_STATE_RETRY_MINS: i64 = 5;

/// Upper bound (inclusive, seconds) of the random jitter added to each
/// scheduled check.
const JITTER_MAX_SECS: i64 = 3;

/// Source of update candidates.
///
/// The returned stream is lazy and possibly infinite; it ends when
/// `shutdown` fires and emits nothing afterwards. Restarting discovery
/// means building a new stream.
pub trait Trigger: Send + Sync {
    fn updates(&self, shutdown: watch::Receiver<bool>) -> BoxStream<'static, CandidateUpdate>;
}

/// Persisted check schedule shared by the bundled triggers.
#[derive(Debug, Clone)]
struct CheckSchedule {
    path: PathBuf,
    interval: Duration,
}

impl CheckSchedule {
    fn new(state_dir: &Path, interval: Duration) -> Self {
        Self {
            path: exec_relative(state_dir).join(CHECK_STATE_FILE),
            interval,
        }
    }

    /// Whether the persisted next-check instant has passed.
    fn due(&self) -> bool {
        read_time(&self.path) <= Utc::now()
    }

    /// Persist `now + interval + jitter` as the next allowed check.
    fn record_next(&self) {
        let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_SECS);
        let next = Utc::now()
            + chrono::Duration::seconds(self.interval.as_secs() as i64)
            + chrono::Duration::seconds(jitter);
        if let Err(err) = write_time(&self.path, next) {
            warn!(path = %self.path.display(), error = %err, "could not persist next update check time");
        }
    }
}

/// Read the next-check instant. A missing file means "check immediately".
/// An unreadable or unparsable file schedules a short retry instead of
/// silently suppressing checks.
fn read_time(path: &Path) -> DateTime<Utc> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return DateTime::<Utc>::MIN_UTC,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not read check state, retrying soon");
            return Utc::now() + chrono::Duration::minutes(BAD_STATE_RETRY_MINS);
        }
    };
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(instant) => instant.with_timezone(&Utc),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "malformed check state, retrying soon");
            Utc::now() + chrono::Duration::minutes(BAD_STATE_RETRY_MINS)
        }
    }
}

/// Write an RFC 3339 timestamp, second resolution, no trailing newline.
fn write_time(path: &Path, instant: DateTime<Utc>) -> io::Result<()> {
    use std::io::Write;

    let stamp = instant.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    let mut file = options.open(path)?;
    file.write_all(stamp.as_bytes())
}

/// One probe of a manifest source.
#[async_trait]
trait ProbeSource: Send + Sync {
    async fn probe(&self) -> Result<Option<CandidateUpdate>, ProbeError>;
}

#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("malformed release manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("bad content hash length {0} in release manifest")]
    BadHashLength(usize),
    #[error("manifest read failed: {0}")]
    Io(#[from] io::Error),
}

/// Shared tick loop: sleep, gate on the schedule, probe, record.
///
/// A probe error is logged and does *not* advance the schedule, so the next
/// tick retries. A successful probe advances it whether or not a candidate
/// was found.
fn poll_stream(
    source: Arc<dyn ProbeSource>,
    schedule: CheckSchedule,
    shutdown: watch::Receiver<bool>,
) -> BoxStream<'static, CandidateUpdate> {
    Box::pin(stream::unfold(
        (source, schedule, shutdown),
        |(source, schedule, mut shutdown)| async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(schedule.interval) => {}
                    _ = shutdown.wait_for(|stop| *stop) => return None,
                }
                if !schedule.due() {
                    debug!("next update checkpoint has not arrived yet");
                    continue;
                }
                match source.probe().await {
                    Err(err) => {
                        warn!(error = %err, "update probe failed");
                    }
                    Ok(found) => {
                        schedule.record_next();
                        if let Some(candidate) = found {
                            return Some((candidate, (source, schedule, shutdown)));
                        }
                    }
                }
            }
        },
    ))
}

/// Polls a remote endpoint for `{api_url}/{cmd}/{platform}.json` and emits
/// at most one candidate per tick.
pub struct RemoteManifestTrigger {
    api_url: String,
    bin_url: String,
    cmd_name: String,
    state_dir: PathBuf,
    interval: Duration,
    fetcher: Arc<dyn Fetcher>,
}

impl RemoteManifestTrigger {
    pub fn new(
        api_url: impl Into<String>,
        bin_url: impl Into<String>,
        cmd_name: impl Into<String>,
        state_dir: impl Into<PathBuf>,
        interval: Duration,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            bin_url: bin_url.into(),
            cmd_name: cmd_name.into(),
            state_dir: state_dir.into(),
            interval,
            fetcher,
        }
    }
}

impl Trigger for RemoteManifestTrigger {
    fn updates(&self, shutdown: watch::Receiver<bool>) -> BoxStream<'static, CandidateUpdate> {
        let source = Arc::new(RemoteProbe {
            api_url: self.api_url.clone(),
            bin_url: self.bin_url.clone(),
            cmd_name: self.cmd_name.clone(),
            fetcher: self.fetcher.clone(),
        });
        poll_stream(
            source,
            CheckSchedule::new(&self.state_dir, self.interval),
            shutdown,
        )
    }
}

struct RemoteProbe {
    api_url: String,
    bin_url: String,
    cmd_name: String,
    fetcher: Arc<dyn Fetcher>,
}

#[async_trait]
impl ProbeSource for RemoteProbe {
    async fn probe(&self) -> Result<Option<CandidateUpdate>, ProbeError> {
        let platform = platform_tag();
        let url = format!("{}/{}/{}.json", self.api_url, self.cmd_name, platform);
        let body = self.fetcher.fetch(&url).await?;
        let manifest: ReleaseManifest = serde_json::from_slice(&body)?;

        if manifest.sha256.len() != HASH_LEN {
            return Err(ProbeError::BadHashLength(manifest.sha256.len()));
        }
        if manifest.version.is_empty() {
            return Ok(None);
        }

        Ok(Some(CandidateUpdate {
            download_url: format!(
                "{}/{}/{}/{}.gz",
                self.bin_url, self.cmd_name, manifest.version, platform
            ),
            version: manifest.version,
            content_hash: manifest.sha256,
            is_patch: manifest.is_patch,
            signature: None,
        }))
    }
}

/// Reads a local JSON manifest map (`cmd → entry`) and emits the entry for
/// its own command name, with the binary base URL prepended.
pub struct LocalManifestTrigger {
    check_path: PathBuf,
    bin_url: String,
    cmd_name: String,
    state_dir: PathBuf,
    interval: Duration,
}

impl LocalManifestTrigger {
    pub fn new(
        check_path: impl Into<PathBuf>,
        bin_url: impl Into<String>,
        cmd_name: impl Into<String>,
        state_dir: impl Into<PathBuf>,
        interval: Duration,
    ) -> Self {
        Self {
            check_path: check_path.into(),
            bin_url: bin_url.into(),
            cmd_name: cmd_name.into(),
            state_dir: state_dir.into(),
            interval,
        }
    }
}

impl Trigger for LocalManifestTrigger {
    fn updates(&self, shutdown: watch::Receiver<bool>) -> BoxStream<'static, CandidateUpdate> {
        let source = Arc::new(LocalProbe {
            check_path: self.check_path.clone(),
            bin_url: self.bin_url.clone(),
            cmd_name: self.cmd_name.clone(),
        });
        poll_stream(
            source,
            CheckSchedule::new(&self.state_dir, self.interval),
            shutdown,
        )
    }
}

struct LocalProbe {
    check_path: PathBuf,
    bin_url: String,
    cmd_name: String,
}

#[async_trait]
impl ProbeSource for LocalProbe {
    async fn probe(&self) -> Result<Option<CandidateUpdate>, ProbeError> {
        let body = tokio::fs::read(&self.check_path).await?;
        let manifest: LocalManifest = serde_json::from_slice(&body)?;

        let Some(entry) = manifest.get(&self.cmd_name) else {
            return Ok(None);
        };
        if entry.content_hash.len() != HASH_LEN {
            return Err(ProbeError::BadHashLength(entry.content_hash.len()));
        }
        if entry.version.is_empty() {
            return Ok(None);
        }

        Ok(Some(CandidateUpdate {
            version: entry.version.clone(),
            download_url: format!("{}{}", self.bin_url, entry.download_url),
            content_hash: entry.content_hash.clone(),
            is_patch: entry.is_patch,
            signature: entry.signature.clone(),
        }))
    }
}
