use std::io;
use std::path::PathBuf;

/// Convenient result alias for update operations.
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Errors surfaced by a [`Fetcher`](crate::Fetcher) implementation.
///
/// Variants carry the URL so that transport failures are attributable in
/// logs without the caller re-threading request context.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a non-2xx status.
    #[error("bad http status from {url}: {status}")]
    BadStatus { url: String, status: u16 },
    /// Connect, DNS, or read failure below the HTTP layer.
    #[error("transport error fetching {url}: {message}")]
    Transport { url: String, message: String },
    /// The underlying HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(String),
}

/// Errors while applying a binary delta to the installed executable.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// The delta stream is malformed or does not apply to the old bytes.
    #[error("delta stream malformed or inapplicable: {0}")]
    Apply(#[from] io::Error),
}

/// Errors while decoding a gzipped full binary.
#[derive(Debug, thiserror::Error)]
pub enum DecompressError {
    #[error("gzip decode failed: {0}")]
    Gzip(#[from] io::Error),
}

/// Top-level error for the update engine.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// The candidate announced a content hash that is not 32 bytes long.
    /// Rejected before any network or disk I/O.
    #[error("candidate content hash must be 32 bytes, got {0}")]
    BadHashLength(usize),
    /// Downloaded (or patched) bytes do not digest to the announced hash.
    #[error("downloaded binary does not match announced content hash")]
    HashMismatch,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Decompress(#[from] DecompressError),
    /// The running executable's path could not be resolved.
    #[error("could not resolve running executable: {0}")]
    ExecutablePath(#[source] io::Error),
    /// The state directory or the executable's directory is not usable.
    /// Fatal: the engine refuses to start.
    #[error("pre-flight check failed for {path}: {source}")]
    Preflight { path: PathBuf, source: io::Error },
    #[error("io error during update: {0}")]
    Io(#[from] io::Error),
    /// The swap failed but the previously installed binary is still (or
    /// again) in place. The staged file is left behind for the next attempt.
    #[error("binary swap aborted, running executable left intact: {source}")]
    SwapRecovered { source: io::Error },
    /// The swap failed *and* restoring the displaced binary failed. The
    /// engine stops; manual intervention is required.
    #[error("binary swap failed ({source}) and recovery also failed ({recover})")]
    SwapUnrecoverable { source: io::Error, recover: io::Error },
}
