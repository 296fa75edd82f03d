//! Release packager for the self-update engine.
//!
//! Produces the distribution layout the update triggers and engine consume:
//! a per-platform manifest JSON next to versioned directories holding either
//! gzipped full binaries or BSDIFF40 deltas against a prior version.

mod release;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "packager")]
#[command(author, version, about = "Publish self-update artifacts: manifests, gzipped binaries, deltas")]
struct Cli {
    /// Binary to publish, or a directory of per-platform binaries whose
    /// file names are platform tags (e.g. linux-amd64)
    binary: PathBuf,

    /// Version string announced in the manifest
    version: String,

    /// Target platform tag in the form os-arch
    #[arg(long, default_value_t = selfupdate::platform_tag())]
    platform: String,

    /// Command name the artifacts are published under; defaults to the
    /// binary's file name (required with a directory input)
    #[arg(long)]
    name: Option<String>,

    /// Output directory for the release layout
    #[arg(short, long, default_value = "public")]
    output: PathBuf,

    /// Create a delta against this previously published version instead of
    /// a full binary
    #[arg(long, value_name = "PREV_VERSION")]
    patch: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let metadata = fs::metadata(&cli.binary)
        .with_context(|| format!("cannot read {}", cli.binary.display()))?;

    if metadata.is_dir() {
        let Some(name) = cli.name.as_deref() else {
            bail!("--name is required when publishing a directory of binaries");
        };
        for entry in fs::read_dir(&cli.binary)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let platform = entry.file_name().to_string_lossy().into_owned();
            release::publish(
                &entry.path(),
                name,
                &cli.version,
                &platform,
                &cli.output,
                cli.patch.as_deref(),
            )?;
            println!("published {name} {} for {platform}", cli.version);
        }
        return Ok(());
    }

    let name = match cli.name.as_deref() {
        Some(name) => name.to_string(),
        None => cli
            .binary
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .context("binary path has no file name")?,
    };
    release::publish(
        &cli.binary,
        &name,
        &cli.version,
        &cli.platform,
        &cli.output,
        cli.patch.as_deref(),
    )?;
    println!("published {name} {} for {}", cli.version, cli.platform);
    Ok(())
}
