//! Release manifests and the candidate descriptor they produce.
//!
//! Two manifest dialects exist: the per-platform JSON served by a remote
//! distribution endpoint, and a local JSON map keyed by command name. Byte
//! fields (`Sha256`, `content_hash`, `signature`) travel base64-encoded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One announced update, ready for evaluation by the engine.
///
/// Candidates are ephemeral: a trigger emits them, the engine consumes each
/// exactly once. `version` is an opaque identity compared only for equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUpdate {
    pub version: String,
    /// Base URL the bytes are fetched from; the engine appends `.patch`
    /// when downloading a delta.
    pub download_url: String,
    /// SHA-256 of the uncompressed new binary. Must be exactly 32 bytes.
    pub content_hash: Vec<u8>,
    /// Whether the publisher prepared a delta from the current version.
    pub is_patch: bool,
    /// Carried through untouched; never verified by the engine.
    pub signature: Option<Vec<u8>>,
}

/// Per-platform release manifest served at `{api}/{cmd}/{platform}.json`.
///
/// Field names and base64 byte encoding mirror the publisher's JSON
/// marshaller, so both sides of the wire share this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseManifest {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Sha256", with = "base64_bytes")]
    pub sha256: Vec<u8>,
    #[serde(rename = "IsPatch", default)]
    pub is_patch: bool,
}

/// One entry of the local manifest map (`cmd → entry`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalManifestEntry {
    pub version: String,
    /// Relative to the configured binary base URL.
    #[serde(default)]
    pub download_url: String,
    #[serde(with = "base64_bytes")]
    pub content_hash: Vec<u8>,
    #[serde(default)]
    pub is_patch: bool,
    #[serde(default, with = "base64_opt_bytes", skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,
}

/// The local manifest file: a map from command name to its latest release.
pub type LocalManifest = HashMap<String, LocalManifestEntry>;

/// `{os}-{arch}` tag keying manifests and artifacts, e.g. `linux-amd64`
/// or `darwin-arm64`.
pub fn platform_tag() -> String {
    format!("{}-{}", os_tag(), arch_tag())
}

fn os_tag() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn arch_tag() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        STANDARD
            .decode(raw.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

mod base64_opt_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|value| STANDARD.decode(value.as_bytes()))
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
