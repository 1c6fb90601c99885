//! Versioned cache-entry codec
//!
//! Encodes a dataset handle's structural metadata (variables, dimensions,
//! coordinate values, chunk index) behind a magic + version header. The
//! layout is not stable across versions: a version bump invalidates old
//! entries wholesale, which costs at worst a one-time miss storm.

use super::dataset::DatasetHandle;
use thiserror::Error;

const MAGIC: &[u8; 4] = b"MDTS";
const FORMAT_VERSION: u8 = 1;

/// Codec failures; decode failures are treated as a cache miss by the reader
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Payload too short to carry a header")]
    Truncated,

    #[error("Bad magic bytes")]
    BadMagic,

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u8),

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Decode failed: {0}")]
    Decode(String),
}

/// Serialize a handle's structural metadata into a cache-entry payload
pub fn encode(handle: &DatasetHandle) -> Result<Vec<u8>, SnapshotError> {
    let body = bincode::serde::encode_to_vec(handle, bincode::config::standard())
        .map_err(|e| SnapshotError::Encode(e.to_string()))?;

    let mut payload = Vec::with_capacity(MAGIC.len() + 1 + body.len());
    payload.extend_from_slice(MAGIC);
    payload.push(FORMAT_VERSION);
    payload.extend_from_slice(&body);
    Ok(payload)
}

/// Reconstruct a handle from a cache-entry payload
pub fn decode(payload: &[u8]) -> Result<DatasetHandle, SnapshotError> {
    if payload.len() < MAGIC.len() + 1 {
        return Err(SnapshotError::Truncated);
    }
    if &payload[..MAGIC.len()] != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let version = payload[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }

    let (handle, _) = bincode::serde::decode_from_slice(
        &payload[MAGIC.len() + 1..],
        bincode::config::standard(),
    )
    .map_err(|e| SnapshotError::Decode(e.to_string()))?;
    Ok(handle)
}
