//! Versioned model blobs
//!
//! Layout: `b"MRVM"` magic, format version (u16 little-endian), SHA-256 of the
//! payload (32 bytes), then the JSON-encoded model. Blobs are written to a
//! temporary sibling and renamed into place.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::training::OutlierModel;
use super::ModelError;

pub const MODEL_MAGIC: &[u8; 4] = b"MRVM";
pub const MODEL_FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = 4 + 2 + 32;

pub fn encode_model(model: &OutlierModel) -> Result<Vec<u8>, ModelError> {
    let payload = serde_json::to_vec(model).map_err(|e| ModelError::Corrupt(e.to_string()))?;
    let digest = Sha256::digest(&payload);

    let mut blob = Vec::with_capacity(HEADER_LEN + payload.len());
    blob.extend_from_slice(MODEL_MAGIC);
    blob.extend_from_slice(&MODEL_FORMAT_VERSION.to_le_bytes());
    blob.extend_from_slice(&digest);
    blob.extend_from_slice(&payload);
    Ok(blob)
}

pub fn decode_model(blob: &[u8]) -> Result<OutlierModel, ModelError> {
    if blob.len() < HEADER_LEN {
        return Err(ModelError::Corrupt(format!("blob too short ({} bytes)", blob.len())));
    }
    if &blob[..4] != MODEL_MAGIC {
        return Err(ModelError::Corrupt("bad magic".into()));
    }
    let version = u16::from_le_bytes([blob[4], blob[5]]);
    if version != MODEL_FORMAT_VERSION {
        return Err(ModelError::UnsupportedVersion(version));
    }

    let payload = &blob[HEADER_LEN..];
    if Sha256::digest(payload).as_slice() != &blob[6..HEADER_LEN] {
        return Err(ModelError::Corrupt("checksum mismatch".into()));
    }

    serde_json::from_slice(payload).map_err(|e| ModelError::Corrupt(e.to_string()))
}

pub fn save_model(path: &Path, model: &OutlierModel) -> Result<(), ModelError> {
    let blob = encode_model(model)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, blob)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a blob; `Ok(None)` when the file does not exist
pub fn load_model(path: &Path) -> Result<Option<OutlierModel>, ModelError> {
    match fs::read(path) {
        Ok(blob) => decode_model(&blob).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
