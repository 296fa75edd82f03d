//! Release artifact generation.
//!
//! Layout produced under the output directory:
//!
//! ```text
//! {out}/{cmd}/{platform}.json              latest manifest for the platform
//! {out}/{cmd}/{version}/{platform}.gz      gzipped full binary
//! {out}/{cmd}/{version}/{platform}.gz.patch  delta from a prior version
//! ```
//!
//! The delta is computed between the gzip-*decompressed* prior artifact and
//! the new *raw* bytes, matching how the engine patches the installed
//! binary. The manifest's `Sha256` is always the digest of the new raw
//! binary.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use qbsdiff::Bsdiff;
use selfupdate::{sha256, ReleaseManifest};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

/// Write the manifest and one artifact (full or delta) for a single
/// `(binary, version, platform)` release.
pub fn publish(
    binary: &Path,
    cmd_name: &str,
    version: &str,
    platform: &str,
    out: &Path,
    patch_from: Option<&str>,
) -> Result<()> {
    let new_bytes =
        fs::read(binary).with_context(|| format!("reading {}", binary.display()))?;

    let cmd_dir = out.join(cmd_name);
    let version_dir = cmd_dir.join(version);
    fs::create_dir_all(&version_dir)
        .with_context(|| format!("creating {}", version_dir.display()))?;

    let manifest = ReleaseManifest {
        version: version.to_string(),
        sha256: sha256(&new_bytes).to_vec(),
        is_patch: patch_from.is_some(),
    };
    let manifest_path = cmd_dir.join(format!("{platform}.json"));
    fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)
        .with_context(|| format!("writing {}", manifest_path.display()))?;

    match patch_from {
        None => {
            let artifact = version_dir.join(format!("{platform}.gz"));
            fs::write(&artifact, gzip(&new_bytes)?)
                .with_context(|| format!("writing {}", artifact.display()))?;
        }
        Some(prev) => {
            let prev_artifact = cmd_dir.join(prev).join(format!("{platform}.gz"));
            let prev_gz = fs::read(&prev_artifact).with_context(|| {
                format!(
                    "no published {prev} artifact at {}",
                    prev_artifact.display()
                )
            })?;
            let old_bytes = gunzip(&prev_gz)
                .with_context(|| format!("decoding {}", prev_artifact.display()))?;

            let mut delta = Vec::new();
            Bsdiff::new(&old_bytes, &new_bytes)
                .compare(Cursor::new(&mut delta))
                .context("computing delta")?;

            let artifact = version_dir.join(format!("{platform}.gz.patch"));
            fs::write(&artifact, delta)
                .with_context(|| format!("writing {}", artifact.display()))?;
        }
    }

    Ok(())
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
