//! Delta application and full-binary decompression.
//!
//! Deltas use the BSDIFF40 stream layout; full binaries arrive gzipped when
//! the engine is configured for gzip transport. Both operations materialize
//! the candidate binary in memory so hash verification can run before any
//! on-disk mutation.

use crate::error::{DecompressError, PatchError};
use flate2::read::GzDecoder;
use qbsdiff::Bspatch;
use std::io::{Cursor, Read};

/// Apply a BSDIFF40 delta to the currently installed binary's bytes.
pub fn apply_delta(old: &[u8], patch: &[u8]) -> Result<Vec<u8>, PatchError> {
    let patcher = Bspatch::new(patch)?;
    let mut new = Vec::with_capacity(patcher.hint_target_size() as usize);
    patcher.apply(old, Cursor::new(&mut new))?;
    Ok(new)
}

/// Gunzip a fetched full binary, or pass it through when the transport is
/// uncompressed.
pub fn decompress(bytes: Vec<u8>, is_gzipped: bool) -> Result<Vec<u8>, DecompressError> {
    if !is_gzipped {
        return Ok(bytes);
    }
    let mut decoder = GzDecoder::new(bytes.as_slice());
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
