//! The update engine: a single background task driving
//! discovery → fetch → verify → patch → atomic swap → recover.
//!
//! The engine consumes candidates strictly serially from its trigger. A
//! failed delta falls back to a full-binary fetch; a failed full fetch is
//! terminal for that candidate. The executable on disk is always runnable:
//! verified bytes are staged next to the live binary and swapped in with
//! renames that either complete or roll back.

use crate::error::UpdateError;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::hash::{self, HASH_LEN};
use crate::manifest::CandidateUpdate;
use crate::patch;
use crate::swap;
use crate::trigger::Trigger;
use futures::StreamExt;
use std::env;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task;
use tracing::{debug, error, info, warn};

/// Version sentinel that disables all update activity.
pub const DEV_VERSION: &str = "dev";

/// Invoked after a successful swap.
pub type SuccessHook = Arc<dyn Fn(&CandidateUpdate) + Send + Sync>;
/// Invoked when a candidate fails past the patch fallback.
pub type FailureHook = Arc<dyn Fn(&CandidateUpdate, &UpdateError) + Send + Sync>;

/// Fixed engine configuration, assembled once and handed to
/// [`UpdateEngine::new`].
pub struct EngineConfig {
    /// Version the running binary identifies as. [`DEV_VERSION`] disables
    /// updates entirely.
    pub current_version: String,
    /// Directory for trigger bookkeeping. Relative paths resolve against
    /// the executable's directory.
    pub state_dir: PathBuf,
    /// Whether full binaries are transported gzip-compressed.
    pub is_gzipped: bool,
    /// Override for the running executable's path. Defaults to
    /// [`std::env::current_exe`].
    pub exec_path: Option<PathBuf>,
    /// Transport for patch and full-binary downloads. When absent the
    /// engine owns a plain [`HttpFetcher`].
    pub fetcher: Option<Arc<dyn Fetcher>>,
    /// Source of update candidates.
    pub trigger: Arc<dyn Trigger>,
    pub on_success: Option<SuccessHook>,
    pub on_failure: Option<FailureHook>,
}

/// The long-running update state machine. One engine drives one binary.
pub struct UpdateEngine {
    config: EngineConfig,
    fetcher: Arc<dyn Fetcher>,
}

/// Waits for `shutdown` to report `true`, without leaving the non-`Send`
/// `watch::Ref` borrow alive across the `select!` state machine.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) -> Result<(), watch::error::RecvError> {
    shutdown.wait_for(|stop| *stop).await?;
    Ok(())
}

impl UpdateEngine {
    pub fn new(mut config: EngineConfig) -> Self {
        let fetcher = config
            .fetcher
            .take()
            .unwrap_or_else(|| Arc::new(HttpFetcher::default()));
        Self { config, fetcher }
    }

    /// Drive the update loop until `shutdown` fires, the candidate stream
    /// ends, pre-flight fails, or an unrecoverable swap error occurs.
    ///
    /// The engine never panics the host: every per-candidate failure is
    /// logged and reported through the failure hook, and only a swap whose
    /// recovery also failed stops the loop.
    pub async fn run_background(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), UpdateError> {
        self.preflight()?;

        if self.config.current_version == DEV_VERSION {
            info!("running a dev build, self-update disabled");
            let _ = shutdown.wait_for(|stop| *stop).await;
            return Ok(());
        }

        let mut candidates = self.config.trigger.updates(shutdown.clone());
        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => {
                    debug!("update engine shutting down");
                    return Ok(());
                }
                next = candidates.next() => match next {
                    Some(candidate) => self.process(candidate).await?,
                    None => {
                        debug!("candidate stream ended");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Create the state directory and prove the executable's directory is
    /// writable by opening and removing the stage file. This also sweeps a
    /// stage left behind by a cancelled or crashed run.
    fn preflight(&self) -> Result<(), UpdateError> {
        let state_dir = exec_relative(&self.config.state_dir);
        fs::create_dir_all(&state_dir).map_err(|source| UpdateError::Preflight {
            path: state_dir.clone(),
            source,
        })?;

        let exec_path = self.exec_path()?;
        let staged = swap::staged_path(&exec_path);
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&staged)
            .map_err(|source| UpdateError::Preflight {
                path: staged.clone(),
                source,
            })?;
        let _ = fs::remove_file(&staged);
        Ok(())
    }

    fn exec_path(&self) -> Result<PathBuf, UpdateError> {
        let path = match &self.config.exec_path {
            Some(path) => path.clone(),
            None => env::current_exe().map_err(UpdateError::ExecutablePath)?,
        };
        // A symlinked install location resolves to its real target so the
        // swap acts on the actual file.
        Ok(fs::canonicalize(&path).unwrap_or(path))
    }

    /// Run one candidate through the pipeline. Only an unrecoverable swap
    /// propagates an error; everything else skips to the next candidate.
    async fn process(&self, candidate: CandidateUpdate) -> Result<(), UpdateError> {
        if candidate.version == self.config.current_version {
            debug!(version = %candidate.version, "already running announced version");
            return Ok(());
        }
        if candidate.content_hash.len() != HASH_LEN {
            let err = UpdateError::BadHashLength(candidate.content_hash.len());
            warn!(version = %candidate.version, error = %err, "dropping candidate");
            return Ok(());
        }
        let exec_path = match self.exec_path() {
            Ok(path) => path,
            Err(err) => {
                warn!(error = %err, "cannot resolve executable, skipping candidate");
                return Ok(());
            }
        };

        info!(
            version = %candidate.version,
            hash = %hex::encode(&candidate.content_hash),
            "update candidate accepted"
        );

        let bytes = match self.acquire(&candidate, &exec_path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(version = %candidate.version, error = %err, "update failed");
                self.report_failure(&candidate, &err);
                return Ok(());
            }
        };

        let outcome = {
            let exec_path = exec_path.clone();
            let join = task::spawn_blocking(move || {
                swap::stage(&exec_path, &bytes)?;
                swap::swap(&exec_path)
            })
            .await;
            match join {
                Ok(result) => result,
                Err(err) => Err(UpdateError::Io(io::Error::other(err.to_string()))),
            }
        };

        match outcome {
            Ok(()) => {
                info!(
                    version = %candidate.version,
                    "binary updated, new version takes effect on next start"
                );
                if let Some(hook) = &self.config.on_success {
                    hook(&candidate);
                }
                Ok(())
            }
            Err(err @ UpdateError::SwapUnrecoverable { .. }) => {
                error!(error = %err, "binary swap unrecoverable, stopping update engine");
                Err(err)
            }
            Err(err) => {
                warn!(version = %candidate.version, error = %err, "update failed");
                self.report_failure(&candidate, &err);
                Ok(())
            }
        }
    }

    /// Obtain verified new-binary bytes: delta first when announced, full
    /// fetch as primary or fallback.
    async fn acquire(
        &self,
        candidate: &CandidateUpdate,
        exec_path: &Path,
    ) -> Result<Vec<u8>, UpdateError> {
        if candidate.is_patch {
            match self.fetch_patched(candidate, exec_path).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) => {
                    warn!(error = %err, "patch update failed, falling back to full binary");
                }
            }
        }
        self.fetch_full(candidate).await
    }

    async fn fetch_patched(
        &self,
        candidate: &CandidateUpdate,
        exec_path: &Path,
    ) -> Result<Vec<u8>, UpdateError> {
        let old = tokio::fs::read(exec_path).await?;
        let url = format!("{}.patch", candidate.download_url);
        let delta = self.fetcher.fetch(&url).await?;
        let bytes = patch::apply_delta(&old, &delta)?;
        if !hash::verify(&bytes, &candidate.content_hash) {
            return Err(UpdateError::HashMismatch);
        }
        Ok(bytes)
    }

    async fn fetch_full(&self, candidate: &CandidateUpdate) -> Result<Vec<u8>, UpdateError> {
        let body = self.fetcher.fetch(&candidate.download_url).await?;
        let bytes = patch::decompress(body, self.config.is_gzipped)?;
        if !hash::verify(&bytes, &candidate.content_hash) {
            return Err(UpdateError::HashMismatch);
        }
        Ok(bytes)
    }

    fn report_failure(&self, candidate: &CandidateUpdate, err: &UpdateError) {
        if let Some(hook) = &self.config.on_failure {
            hook(candidate, err);
        }
    }
}

/// Resolve a possibly-relative directory against the executable's directory.
pub(crate) fn exec_relative(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use futures::stream::{self, BoxStream};
    use qbsdiff::Bsdiff;
    use std::collections::HashMap;
    use std::io::{Cursor, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    struct MapFetcher {
        responses: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn insert(mut self, url: &str, body: Vec<u8>) -> Self {
            self.responses.insert(url.to_string(), body);
            self
        }
    }

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::BadStatus {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    /// Emits a fixed list of candidates, then ends the stream.
    struct StaticTrigger(Vec<CandidateUpdate>);

    impl Trigger for StaticTrigger {
        fn updates(&self, _shutdown: watch::Receiver<bool>) -> BoxStream<'static, CandidateUpdate> {
            stream::iter(self.0.clone()).boxed()
        }
    }

    /// Never emits; the engine's own select must notice cancellation.
    struct SilentTrigger;

    impl Trigger for SilentTrigger {
        fn updates(&self, _shutdown: watch::Receiver<bool>) -> BoxStream<'static, CandidateUpdate> {
            stream::pending::<CandidateUpdate>().boxed()
        }
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn bsdiff(old: &[u8], new: &[u8]) -> Vec<u8> {
        let mut patch = Vec::new();
        Bsdiff::new(old, new)
            .compare(Cursor::new(&mut patch))
            .unwrap();
        patch
    }

    struct Harness {
        dir: tempfile::TempDir,
        exec: PathBuf,
        successes: Arc<AtomicUsize>,
        failures: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new(initial: &[u8]) -> Self {
            let dir = tempdir().unwrap();
            let exec = dir.path().join("agent");
            fs::write(&exec, initial).unwrap();
            Self {
                dir,
                exec,
                successes: Arc::new(AtomicUsize::new(0)),
                failures: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn engine(
            &self,
            fetcher: Arc<dyn Fetcher>,
            trigger: Arc<dyn Trigger>,
            current_version: &str,
        ) -> UpdateEngine {
            let successes = self.successes.clone();
            let failures = self.failures.clone();
            UpdateEngine::new(EngineConfig {
                current_version: current_version.to_string(),
                state_dir: self.dir.path().join("state"),
                is_gzipped: true,
                exec_path: Some(self.exec.clone()),
                fetcher: Some(fetcher),
                trigger,
                on_success: Some(Arc::new(move |_| {
                    successes.fetch_add(1, Ordering::SeqCst);
                })),
                on_failure: Some(Arc::new(move |_, _| {
                    failures.fetch_add(1, Ordering::SeqCst);
                })),
            })
        }

        fn no_leftovers(&self) {
            assert!(!swap::staged_path(&self.exec).exists());
            assert!(!swap::displaced_path(&self.exec).exists());
        }
    }

    fn candidate(version: &str, url: &str, hash: &[u8], is_patch: bool) -> CandidateUpdate {
        CandidateUpdate {
            version: version.to_string(),
            download_url: url.to_string(),
            content_hash: hash.to_vec(),
            is_patch,
            signature: None,
        }
    }

    async fn run_to_completion(engine: UpdateEngine) -> Result<(), UpdateError> {
        let (_tx, rx) = watch::channel(false);
        engine.run_background(rx).await
    }

    #[tokio::test]
    async fn full_fetch_happy_path_swaps_binary() {
        let new_binary = b"binary-v2-contents".repeat(20);
        let harness = Harness::new(b"binary-v1-contents");
        let url = "https://pkg.example.com/agent/v2/linux-amd64.gz";
        let fetcher = Arc::new(MapFetcher::new().insert(url, gzip(&new_binary)));
        let trigger = Arc::new(StaticTrigger(vec![candidate(
            "v2",
            url,
            &hash::sha256(&new_binary),
            false,
        )]));

        let engine = harness.engine(fetcher, trigger, "v1");
        run_to_completion(engine).await.unwrap();

        assert_eq!(fs::read(&harness.exec).unwrap(), new_binary);
        assert_eq!(harness.successes.load(Ordering::SeqCst), 1);
        assert_eq!(harness.failures.load(Ordering::SeqCst), 0);
        harness.no_leftovers();
    }

    #[tokio::test]
    async fn patch_happy_path_swaps_binary() {
        let old_binary = b"binary-v1-contents".repeat(40);
        let new_binary = {
            let mut bytes = old_binary.clone();
            bytes.extend_from_slice(b"v2 additions");
            bytes
        };
        let harness = Harness::new(&old_binary);
        let url = "https://pkg.example.com/agent/v2/linux-amd64.gz";
        let fetcher = Arc::new(
            MapFetcher::new().insert(
                "https://pkg.example.com/agent/v2/linux-amd64.gz.patch",
                bsdiff(&old_binary, &new_binary),
            ),
        );
        let trigger = Arc::new(StaticTrigger(vec![candidate(
            "v2",
            url,
            &hash::sha256(&new_binary),
            true,
        )]));

        let engine = harness.engine(fetcher.clone(), trigger, "v1");
        run_to_completion(engine).await.unwrap();

        assert_eq!(fs::read(&harness.exec).unwrap(), new_binary);
        assert_eq!(harness.successes.load(Ordering::SeqCst), 1);
        // Only the patch URL was hit; no full-binary fallback.
        assert_eq!(
            fetcher.requests.lock().unwrap().as_slice(),
            ["https://pkg.example.com/agent/v2/linux-amd64.gz.patch"]
        );
        harness.no_leftovers();
    }

    #[tokio::test]
    async fn bad_patch_falls_back_to_full_binary() {
        let old_binary = b"binary-v1-contents".repeat(40);
        let new_binary = b"binary-v2-rewritten".repeat(40);
        let divergent = b"binary-v2-divergent".repeat(40);
        let harness = Harness::new(&old_binary);
        let url = "https://pkg.example.com/agent/v2/linux-amd64.gz";

        // The delta reproduces the wrong bytes; the full artifact is good.
        let fetcher = Arc::new(
            MapFetcher::new()
                .insert(
                    "https://pkg.example.com/agent/v2/linux-amd64.gz.patch",
                    bsdiff(&old_binary, &divergent),
                )
                .insert(url, gzip(&new_binary)),
        );
        let trigger = Arc::new(StaticTrigger(vec![candidate(
            "v2",
            url,
            &hash::sha256(&new_binary),
            true,
        )]));

        let engine = harness.engine(fetcher.clone(), trigger, "v1");
        run_to_completion(engine).await.unwrap();

        assert_eq!(fs::read(&harness.exec).unwrap(), new_binary);
        assert_eq!(harness.successes.load(Ordering::SeqCst), 1);
        assert_eq!(harness.failures.load(Ordering::SeqCst), 0);
        assert_eq!(fetcher.requests.lock().unwrap().len(), 2);
        harness.no_leftovers();
    }

    #[tokio::test]
    async fn full_fetch_hash_mismatch_leaves_binary_untouched() {
        let old_binary = b"binary-v1-contents".to_vec();
        let announced = b"binary-v2-announced".to_vec();
        let served = b"binary-v2-tampered".to_vec();
        let harness = Harness::new(&old_binary);
        let url = "https://pkg.example.com/agent/v2/linux-amd64.gz";
        let fetcher = Arc::new(MapFetcher::new().insert(url, gzip(&served)));
        let trigger = Arc::new(StaticTrigger(vec![candidate(
            "v2",
            url,
            &hash::sha256(&announced),
            false,
        )]));

        let engine = harness.engine(fetcher, trigger, "v1");
        run_to_completion(engine).await.unwrap();

        assert_eq!(fs::read(&harness.exec).unwrap(), old_binary);
        assert_eq!(harness.successes.load(Ordering::SeqCst), 0);
        assert_eq!(harness.failures.load(Ordering::SeqCst), 1);
        harness.no_leftovers();
    }

    #[tokio::test]
    async fn same_version_candidate_is_a_no_op() {
        let old_binary = b"binary-v1-contents".to_vec();
        let harness = Harness::new(&old_binary);
        let fetcher = Arc::new(MapFetcher::new());
        let trigger = Arc::new(StaticTrigger(vec![candidate(
            "v1",
            "https://pkg.example.com/agent/v1/linux-amd64.gz",
            &hash::sha256(&old_binary),
            false,
        )]));

        let engine = harness.engine(fetcher.clone(), trigger, "v1");
        run_to_completion(engine).await.unwrap();

        assert_eq!(fs::read(&harness.exec).unwrap(), old_binary);
        assert_eq!(harness.successes.load(Ordering::SeqCst), 0);
        assert_eq!(harness.failures.load(Ordering::SeqCst), 0);
        assert!(fetcher.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_length_hash_is_rejected_before_any_fetch() {
        let harness = Harness::new(b"binary-v1-contents");
        let fetcher = Arc::new(MapFetcher::new());
        let trigger = Arc::new(StaticTrigger(vec![candidate(
            "v2",
            "https://pkg.example.com/agent/v2/linux-amd64.gz",
            &[0xAA; 16],
            false,
        )]));

        let engine = harness.engine(fetcher.clone(), trigger, "v1");
        run_to_completion(engine).await.unwrap();

        assert!(fetcher.requests.lock().unwrap().is_empty());
        assert_eq!(harness.successes.load(Ordering::SeqCst), 0);
        assert_eq!(harness.failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_failure_fires_failure_hook_and_continues() {
        let new_binary = b"binary-v3-contents".to_vec();
        let harness = Harness::new(b"binary-v1-contents");
        let good_url = "https://pkg.example.com/agent/v3/linux-amd64.gz";
        let fetcher = Arc::new(MapFetcher::new().insert(good_url, gzip(&new_binary)));
        // First candidate 404s everywhere; the second succeeds.
        let trigger = Arc::new(StaticTrigger(vec![
            candidate(
                "v2",
                "https://pkg.example.com/agent/v2/linux-amd64.gz",
                &hash::sha256(b"whatever"),
                false,
            ),
            candidate("v3", good_url, &hash::sha256(&new_binary), false),
        ]));

        let engine = harness.engine(fetcher, trigger, "v1");
        run_to_completion(engine).await.unwrap();

        assert_eq!(fs::read(&harness.exec).unwrap(), new_binary);
        assert_eq!(harness.failures.load(Ordering::SeqCst), 1);
        assert_eq!(harness.successes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_while_awaiting_candidates_returns_promptly() {
        let harness = Harness::new(b"binary-v1-contents");
        let engine = Arc::new(harness.engine(
            Arc::new(MapFetcher::new()),
            Arc::new(SilentTrigger),
            "v1",
        ));

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn({
            let engine = engine.clone();
            async move { engine.run_background(rx).await }
        });

        tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("engine did not honor cancellation")
            .unwrap();
        assert!(result.is_ok());
        harness.no_leftovers();
    }

    #[tokio::test]
    async fn dev_build_never_updates() {
        let old_binary = b"binary-dev-contents".to_vec();
        let harness = Harness::new(&old_binary);
        let fetcher = Arc::new(MapFetcher::new());
        let trigger = Arc::new(StaticTrigger(vec![candidate(
            "v2",
            "https://pkg.example.com/agent/v2/linux-amd64.gz",
            &hash::sha256(b"next"),
            false,
        )]));

        let engine = Arc::new(harness.engine(fetcher.clone(), trigger, DEV_VERSION));
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn({
            let engine = engine.clone();
            async move { engine.run_background(rx).await }
        });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(fs::read(&harness.exec).unwrap(), old_binary);
        assert!(fetcher.requests.lock().unwrap().is_empty());
        assert_eq!(harness.successes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn preflight_fails_when_state_dir_is_unusable() {
        let dir = tempdir().unwrap();
        let exec = dir.path().join("agent");
        fs::write(&exec, b"binary").unwrap();
        // A file where the state dir should be makes create_dir_all fail.
        let blocker = dir.path().join("state");
        fs::write(&blocker, b"not a directory").unwrap();

        let engine = UpdateEngine::new(EngineConfig {
            current_version: "v1".to_string(),
            state_dir: blocker.join("nested"),
            is_gzipped: true,
            exec_path: Some(exec),
            fetcher: Some(Arc::new(MapFetcher::new())),
            trigger: Arc::new(SilentTrigger),
            on_success: None,
            on_failure: None,
        });

        let (_tx, rx) = watch::channel(false);
        let err = engine.run_background(rx).await.unwrap_err();
        assert!(matches!(err, UpdateError::Preflight { .. }));
    }

    #[tokio::test]
    async fn preflight_sweeps_stale_stage_file() {
        let harness = Harness::new(b"binary-v1-contents");
        fs::write(swap::staged_path(&harness.exec), b"stale stage").unwrap();

        let engine = harness.engine(
            Arc::new(MapFetcher::new()),
            Arc::new(StaticTrigger(Vec::new())),
            "v1",
        );
        run_to_completion(engine).await.unwrap();
        assert!(!swap::staged_path(&harness.exec).exists());
    }

    #[tokio::test]
    async fn symlinked_executable_updates_the_real_target() {
        #[cfg(unix)]
        {
            let new_binary = b"binary-v2-contents".to_vec();
            let dir = tempdir().unwrap();
            let real = dir.path().join("agent-real");
            fs::write(&real, b"binary-v1-contents").unwrap();
            let link = dir.path().join("agent");
            std::os::unix::fs::symlink(&real, &link).unwrap();

            let url = "https://pkg.example.com/agent/v2/linux-amd64.gz";
            let engine = UpdateEngine::new(EngineConfig {
                current_version: "v1".to_string(),
                state_dir: dir.path().join("state"),
                is_gzipped: true,
                exec_path: Some(link.clone()),
                fetcher: Some(Arc::new(MapFetcher::new().insert(url, gzip(&new_binary)))),
                trigger: Arc::new(StaticTrigger(vec![candidate(
                    "v2",
                    url,
                    &hash::sha256(&new_binary),
                    false,
                )])),
                on_success: None,
                on_failure: None,
            });

            let (_tx, rx) = watch::channel(false);
            engine.run_background(rx).await.unwrap();

            assert_eq!(fs::read(&real).unwrap(), new_binary);
            // The symlink itself still points at the real target.
            assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        }
    }
}
