//! Model blob codec and store persistence.
//!
//! A blob is laid out as:
//!
//! | bytes | content |
//! |-------|---------|
//! | 4     | magic `AERO` |
//! | 4     | format version, `u32` little endian |
//! | 4     | header length `n`, `u32` little endian |
//! | n     | JSON [`DroneNetConfig`] |
//! | rest  | Burn full-precision binary record |

use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use tracing::{debug, info};

use crate::drone_net::{DroneNet, DroneNetConfig};
use crate::error::{ModelError, Result};
use crate::store::ModelStore;

/// Blob magic bytes.
pub const BLOB_MAGIC: [u8; 4] = *b"AERO";

/// Current blob format version.
pub const BLOB_VERSION: u32 = 1;

const PREFIX_LEN: usize = 12;

type BlobRecorder = BinBytesRecorder<FullPrecisionSettings>;

/// Serializes topology and weights into a blob.
///
/// # Errors
///
/// Returns [`ModelError::Persistence`] if the header or weights cannot be
/// encoded.
pub fn encode_model<B: Backend>(
    key: &str,
    model: &DroneNet<B>,
    config: &DroneNetConfig,
) -> Result<Vec<u8>> {
    let header = serde_json::to_vec(config).map_err(|e| ModelError::persistence(key, e.to_string()))?;
    let header_len =
        u32::try_from(header.len()).map_err(|e| ModelError::persistence(key, e.to_string()))?;

    let recorder = BlobRecorder::default();
    let weights = Recorder::<B>::record(&recorder, model.clone().into_record(), ())
        .map_err(|e| ModelError::persistence(key, e.to_string()))?;

    let mut blob = Vec::with_capacity(PREFIX_LEN + header.len() + weights.len());
    blob.extend_from_slice(&BLOB_MAGIC);
    blob.extend_from_slice(&BLOB_VERSION.to_le_bytes());
    blob.extend_from_slice(&header_len.to_le_bytes());
    blob.extend_from_slice(&header);
    blob.extend_from_slice(&weights);
    Ok(blob)
}

/// Reads the topology header of a blob, returning it with the weight bytes.
///
/// # Errors
///
/// Returns [`ModelError::Deserialization`] for a truncated blob, wrong magic,
/// unsupported version or malformed header.
pub fn decode_header<'a>(key: &str, blob: &'a [u8]) -> Result<(DroneNetConfig, &'a [u8])> {
    let bad = |reason: String| ModelError::deserialization(key, reason);

    if blob.len() < PREFIX_LEN {
        return Err(bad(format!("blob is {} bytes, shorter than its prefix", blob.len())));
    }
    let (prefix, rest) = blob.split_at(PREFIX_LEN);
    if prefix[..4] != BLOB_MAGIC {
        return Err(bad("bad magic".to_string()));
    }
    let version = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);
    if version != BLOB_VERSION {
        return Err(bad(format!("unsupported format version {version}")));
    }
    let header_len = u32::from_le_bytes([prefix[8], prefix[9], prefix[10], prefix[11]]) as usize;
    if rest.len() < header_len {
        return Err(bad(format!(
            "header length {header_len} exceeds remaining {} bytes",
            rest.len()
        )));
    }
    let (header, weights) = rest.split_at(header_len);
    let config: DroneNetConfig =
        serde_json::from_slice(header).map_err(|e| bad(format!("header: {e}")))?;
    if !config.is_valid() {
        return Err(bad(format!("header describes an invalid topology: {config:?}")));
    }
    Ok((config, weights))
}

/// Rebuilds a model from a blob.
///
/// # Errors
///
/// Returns [`ModelError::Deserialization`] if the blob is malformed or its
/// weights do not fit the topology in its header.
pub fn decode_model<B: Backend>(
    key: &str,
    blob: &[u8],
    device: &B::Device,
) -> Result<(DroneNetConfig, DroneNet<B>)> {
    let (config, weights) = decode_header(key, blob)?;
    let recorder = BlobRecorder::default();
    let record = Recorder::<B>::load(&recorder, weights.to_vec(), device)
        .map_err(|e| ModelError::deserialization(key, format!("weights: {e}")))?;
    let model = config.init::<B>(device).load_record(record);
    if !model.matches_config(&config) {
        return Err(ModelError::deserialization(
            key,
            "weight shapes do not match header topology",
        ));
    }
    Ok((config, model))
}

/// Encodes a model and writes it to `store` under `key`.
///
/// # Errors
///
/// Returns [`ModelError::Persistence`] or [`ModelError::InvalidKey`].
pub fn save_to_store<B: Backend>(
    store: &dyn ModelStore,
    key: &str,
    model: &DroneNet<B>,
    config: &DroneNetConfig,
) -> Result<()> {
    let blob = encode_model(key, model, config)?;
    store.put(key, &blob)?;
    info!(key, bytes = blob.len(), "saved model");
    Ok(())
}

/// Reads and decodes the model stored under `key`.
///
/// # Errors
///
/// Returns [`ModelError::NotFound`] if nothing is stored under `key`, or
/// [`ModelError::Deserialization`] if the blob is invalid.
pub fn load_from_store<B: Backend>(
    store: &dyn ModelStore,
    key: &str,
    device: &B::Device,
) -> Result<(DroneNetConfig, DroneNet<B>)> {
    let blob = store.get(key)?.ok_or_else(|| ModelError::not_found(key))?;
    let loaded = decode_model(key, &blob, device)?;
    debug!(key, bytes = blob.len(), "loaded model");
    Ok(loaded)
}
