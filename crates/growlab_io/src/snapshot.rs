//! Whole-world snapshots.
//!
//! A snapshot file is gzip-compressed. Inside, the first line is a header
//! carrying the SHA-256 of the JSON body that follows it. Files are written
//! beside the target and renamed over it, so a reader never sees half a
//! snapshot.

use crate::error::{IoError, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use growlab_core::context::RngPositions;
use growlab_core::store::GameState;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const HEADER_PREFIX: &str = "growlab-snapshot v1 sha256=";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: DateTime<Utc>,
    /// Fingerprint of the rule config the state was produced under.
    pub config_fingerprint: String,
    pub state: GameState,
    /// Where each seeded service stream stopped, so a restored world keeps
    /// drawing fresh ids.
    #[serde(default)]
    pub rng_positions: RngPositions,
}

impl Snapshot {
    #[must_use]
    pub fn new(saved_at: DateTime<Utc>, config_fingerprint: String, state: GameState) -> Self {
        Self {
            saved_at,
            config_fingerprint,
            state,
            rng_positions: RngPositions::new(),
        }
    }

    #[must_use]
    pub fn with_rng_positions(mut self, positions: RngPositions) -> Self {
        self.rng_positions = positions;
        self
    }
}

#[must_use]
pub fn checksum(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

/// Header plus JSON body, uncompressed.
pub fn encode_plain(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(snapshot)?;
    let mut out = format!("{HEADER_PREFIX}{}\n", checksum(&body)).into_bytes();
    out.extend_from_slice(&body);
    Ok(out)
}

/// Verifies the header and parses the body.
pub fn decode_plain(bytes: &[u8]) -> Result<Snapshot> {
    let split = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| IoError::validation("snapshot header missing"))?;
    let header = std::str::from_utf8(&bytes[..split])
        .map_err(|e| IoError::validation(format!("snapshot header is not UTF-8: {e}")))?;
    let expected = header
        .strip_prefix(HEADER_PREFIX)
        .ok_or_else(|| IoError::validation(format!("unrecognised snapshot header {header:?}")))?;
    let body = &bytes[split + 1..];
    let actual = checksum(body);
    if actual != expected {
        return Err(IoError::validation(format!(
            "snapshot checksum mismatch: header {expected}, body {actual}"
        )));
    }
    serde_json::from_slice(body)
        .map_err(|e| IoError::serialization(format!("snapshot body invalid: {e}")))
}

pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let plain = encode_plain(snapshot)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&plain)
        .map_err(|e| IoError::compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| IoError::compression(e.to_string()))
}

pub fn decode(bytes: &[u8]) -> Result<Snapshot> {
    let mut decoder = GzDecoder::new(bytes);
    let mut plain = Vec::new();
    decoder
        .read_to_end(&mut plain)
        .map_err(|e| IoError::compression(e.to_string()))?;
    decode_plain(&plain)
}

pub fn save<P: AsRef<Path>>(snapshot: &Snapshot, path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode(snapshot)?;
    let staging = staging_path(path);
    let mut file = File::create(&staging).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("creating snapshot {:?}", staging))
    })?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&staging, path).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("moving snapshot into {:?}", path))
    })?;
    tracing::info!(
        path = %path.display(),
        bytes = bytes.len(),
        players = snapshot.state.players.len(),
        plants = snapshot.state.plants.len(),
        "Snapshot saved"
    );
    Ok(())
}

/// `world.snapshot.gz` is staged as `world.snapshot.gz.tmp`.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IoError::not_found(path.display().to_string()));
    }
    let bytes = std::fs::read(path).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("reading snapshot {:?}", path))
    })?;
    let snapshot = decode(&bytes).map_err(|e| e.with_context(format!("loading {:?}", path)))?;
    tracing::info!(path = %path.display(), saved_at = %snapshot.saved_at, "Snapshot loaded");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use growlab_data::Player;

    fn sample() -> Snapshot {
        let mut state = GameState::default();
        let player = Player::new(uuid::Uuid::new_v4(), "grower", 42);
        state.players.insert(player.id, player);
        Snapshot::new(Utc::now(), "abc".to_string(), state)
    }

    #[test]
    fn test_gzip_snapshot_restores_state() {
        let snapshot = sample();
        let bytes = encode(&snapshot).unwrap();
        assert_eq!(decode(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_tampered_body_rejected() {
        let mut plain = encode_plain(&sample()).unwrap();
        let pos = plain
            .windows(4)
            .position(|w| w == b":42,")
            .unwrap();
        plain[pos + 1] = b'9';
        let err = decode_plain(&plain).unwrap_err();
        assert!(matches!(err, IoError::Validation(_)));
    }

    #[test]
    fn test_missing_header_rejected() {
        let err = decode_plain(b"{\"no\":\"header\"}").unwrap_err();
        assert!(matches!(err, IoError::Validation(_)));
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("growlab-{}.snapshot.gz", uuid::Uuid::new_v4()));
        let snapshot = sample();
        save(&snapshot, &path).unwrap();
        assert_eq!(load(&path).unwrap(), snapshot);
        std::fs::remove_file(&path).ok();
        assert!(matches!(load(&path), Err(IoError::NotFound(_))));
    }

    #[test]
    fn test_save_replaces_stale_staging_file() {
        let path = std::env::temp_dir().join(format!("growlab-{}.snapshot.gz", uuid::Uuid::new_v4()));
        let staging = staging_path(&path);
        std::fs::write(&staging, b"half a snapshot").unwrap();
        std::fs::write(&path, b"previous").unwrap();

        let mut positions = RngPositions::new();
        positions.insert(2, 96);
        let snapshot = sample().with_rng_positions(positions);
        save(&snapshot, &path).unwrap();

        assert!(!staging.exists());
        assert_eq!(load(&path).unwrap(), snapshot);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_positions_default_when_absent() {
        let snapshot = sample();
        let mut value = serde_json::to_value(&snapshot).unwrap();
        value.as_object_mut().unwrap().remove("rng_positions");
        let parsed: Snapshot = serde_json::from_value(value).unwrap();
        assert!(parsed.rng_positions.is_empty());
    }
}
