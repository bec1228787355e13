//! Raw embedding byte codec
//!
//! Embeddings are stored as contiguous little-endian f32 (`dim × 4`
//! bytes), bypassing row serialization on the similarity hot path.

use crate::error::{PulseError, Result};

/// Encode an embedding as raw little-endian f32 bytes
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for v in embedding {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode raw little-endian f32 bytes back into an embedding
///
/// Rejects byte strings whose length is not a multiple of 4 — such a blob
/// can only come from corruption.
pub fn embedding_from_bytes(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(PulseError::Corrupt(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
