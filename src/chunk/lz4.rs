//! LZ4-compressed delta payloads
//!
//! The delta payload is block-compressed with its uncompressed size prepended.
//! Decompression happens when the first sample of the chunk is pulled.

use std::sync::Arc;

use super::delta::{self, DeltaDecoder};
use super::ChunkError;
use crate::model::Sample;

/// Encode samples as an LZ4-compressed delta payload
pub fn encode(samples: &[Sample]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(&delta::encode(samples))
}

/// Upper bound on how much one compressed byte can expand to
const MAX_EXPANSION: usize = 255;

/// Check the size prefix without decompressing. The declared size must be
/// reachable from the compressed bytes that follow it.
pub fn validate_header(data: &[u8]) -> Result<(), ChunkError> {
    let prefix: [u8; 4] = data
        .get(..4)
        .and_then(|h| h.try_into().ok())
        .ok_or(ChunkError::Truncated)?;

    let declared = u32::from_le_bytes(prefix) as usize;
    let compressed = data.len() - 4;
    if declared > compressed.saturating_mul(MAX_EXPANSION) {
        return Err(ChunkError::InvalidData);
    }
    Ok(())
}

/// Decompress the payload and start decoding it
pub fn decoder(data: &[u8]) -> Result<DeltaDecoder, ChunkError> {
    let raw = lz4_flex::decompress_size_prepended(data)
        .map_err(|e| ChunkError::Decompress(e.to_string()))?;
    DeltaDecoder::new(Arc::from(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lz4_roundtrip_repetitive_samples() {
        let samples: Vec<Sample> = (0..1000).map(|i| Sample::new(i * 1000, 42.0)).collect();

        let encoded = encode(&samples);
        assert!(encoded.len() < delta::encode(&samples).len());

        let decoded: Result<Vec<Sample>, ChunkError> = decoder(&encoded).unwrap().collect();
        assert_eq!(decoded.unwrap(), samples);
    }

    #[test]
    fn test_lz4_corrupt_payload() {
        let mut encoded = encode(&[Sample::new(1, 1.0), Sample::new(2, 2.0)]);
        let len = encoded.len();
        encoded.truncate(len - 2);

        assert!(validate_header(&encoded).is_ok());
        assert!(matches!(decoder(&encoded), Err(ChunkError::Decompress(_))));
    }

    #[test]
    fn test_lz4_oversized_prefix_rejected() {
        let mut data = u32::MAX.to_le_bytes().to_vec();
        data.extend_from_slice(&[0x10, 0x41]);
        assert_eq!(validate_header(&data), Err(ChunkError::InvalidData));

        assert_eq!(validate_header(&[1, 0, 0]), Err(ChunkError::Truncated));
        assert_eq!(validate_header(&[1, 0, 0, 0]), Err(ChunkError::InvalidData));

        // Highly repetitive payloads still pass
        let samples: Vec<Sample> = (0..5000).map(|i| Sample::new(i, 0.0)).collect();
        assert!(validate_header(&encode(&samples)).is_ok());
    }
}
