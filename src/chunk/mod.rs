//! Compressed sample chunks
//!
//! A chunk is an opaque run of samples for one series, tagged with its
//! encoding and the time bounds of the samples inside it:
//! - Delta: zigzag/XOR varint records, decoded one sample per pull
//! - Lz4: the delta payload block-compressed, decompressed on first pull
//!
//! Headers are validated up front; payloads are only decoded when a consumer
//! iterates the samples.

pub mod delta;
pub mod iterator;
pub mod lz4;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::model::Sample;

pub use iterator::{ChunkIteratorFn, ChunkIteratorKind};

/// Chunk encoding identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkEncoding {
    Delta,
    Lz4,
}

impl ChunkEncoding {
    pub fn as_u8(&self) -> u8 {
        match self {
            ChunkEncoding::Delta => 1,
            ChunkEncoding::Lz4 => 2,
        }
    }
}

impl TryFrom<u8> for ChunkEncoding {
    type Error = ChunkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ChunkEncoding::Delta),
            2 => Ok(ChunkEncoding::Lz4),
            other => Err(ChunkError::UnknownEncoding(other)),
        }
    }
}

/// A validated chunk
#[derive(Debug, Clone)]
pub struct Chunk {
    encoding: ChunkEncoding,
    min_time: i64,
    max_time: i64,
    data: Arc<[u8]>,
}

impl Chunk {
    /// Build a chunk from its wire parts, checking the header but not the payload
    pub fn new(
        encoding: u8,
        min_time: i64,
        max_time: i64,
        data: Vec<u8>,
    ) -> Result<Self, ChunkError> {
        let encoding = ChunkEncoding::try_from(encoding)?;
        if min_time > max_time {
            return Err(ChunkError::InvalidBounds { min_time, max_time });
        }

        match encoding {
            ChunkEncoding::Delta => {
                delta::sample_count(&data)?;
            }
            ChunkEncoding::Lz4 => lz4::validate_header(&data)?,
        }

        Ok(Self {
            encoding,
            min_time,
            max_time,
            data: Arc::from(data),
        })
    }

    /// Encode time-ordered samples into a chunk
    pub fn encode(encoding: ChunkEncoding, samples: &[Sample]) -> Self {
        let data = match encoding {
            ChunkEncoding::Delta => delta::encode(samples),
            ChunkEncoding::Lz4 => lz4::encode(samples),
        };
        let min_time = samples.first().map(|s| s.timestamp_ms).unwrap_or(0);
        let max_time = samples.last().map(|s| s.timestamp_ms).unwrap_or(0);

        Self {
            encoding,
            min_time,
            max_time,
            data: Arc::from(data),
        }
    }

    pub fn encoding(&self) -> ChunkEncoding {
        self.encoding
    }

    pub fn min_time(&self) -> i64 {
        self.min_time
    }

    pub fn max_time(&self) -> i64 {
        self.max_time
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Lazily decode the samples of this chunk
    pub fn samples(&self) -> ChunkSamples {
        ChunkSamples {
            state: DecodeState::Pending(self.clone()),
        }
    }
}

/// Pull-driven sample iterator over one chunk
#[derive(Debug)]
pub struct ChunkSamples {
    state: DecodeState,
}

#[derive(Debug)]
enum DecodeState {
    Pending(Chunk),
    Decoding(delta::DeltaDecoder),
    Done,
}

impl Iterator for ChunkSamples {
    type Item = Result<Sample, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.state {
                DecodeState::Pending(chunk) => {
                    let decoder = match chunk.encoding {
                        ChunkEncoding::Delta => delta::DeltaDecoder::new(Arc::clone(&chunk.data)),
                        ChunkEncoding::Lz4 => lz4::decoder(&chunk.data),
                    };
                    match decoder {
                        Ok(decoder) => self.state = DecodeState::Decoding(decoder),
                        Err(e) => {
                            self.state = DecodeState::Done;
                            return Some(Err(e));
                        }
                    }
                }
                DecodeState::Decoding(decoder) => {
                    let item = decoder.next();
                    if !matches!(item, Some(Ok(_))) {
                        self.state = DecodeState::Done;
                    }
                    return item;
                }
                DecodeState::Done => return None,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChunkError {
    #[error("Invalid chunk data")]
    InvalidData,

    #[error("Truncated chunk data")]
    Truncated,

    #[error("Unknown chunk encoding: {0}")]
    UnknownEncoding(u8),

    #[error("Invalid chunk bounds: min {min_time} > max {max_time}")]
    InvalidBounds { min_time: i64, max_time: i64 },

    #[error("Failed to decompress chunk: {0}")]
    Decompress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_header_validation() {
        let payload = delta::encode(&[Sample::new(1, 1.0)]);

        assert!(Chunk::new(1, 1, 1, payload.clone()).is_ok());
        assert!(matches!(
            Chunk::new(9, 1, 1, payload.clone()),
            Err(ChunkError::UnknownEncoding(9))
        ));
        assert!(matches!(
            Chunk::new(1, 5, 1, payload),
            Err(ChunkError::InvalidBounds { .. })
        ));
        assert!(matches!(Chunk::new(1, 1, 1, vec![0]), Err(ChunkError::Truncated)));
        assert!(matches!(Chunk::new(2, 1, 1, vec![]), Err(ChunkError::Truncated)));
        assert!(matches!(
            Chunk::new(2, 1, 1, vec![0xff, 0xff, 0xff, 0xff, 0x10, 0x41]),
            Err(ChunkError::InvalidData)
        ));
    }

    #[test]
    fn test_chunk_samples_both_encodings() {
        let samples = vec![Sample::new(10, 1.0), Sample::new(20, 2.0), Sample::new(30, 3.0)];

        for encoding in [ChunkEncoding::Delta, ChunkEncoding::Lz4] {
            let chunk = Chunk::encode(encoding, &samples);
            assert_eq!(chunk.min_time(), 10);
            assert_eq!(chunk.max_time(), 30);

            let decoded: Result<Vec<Sample>, ChunkError> = chunk.samples().collect();
            assert_eq!(decoded.unwrap(), samples);
        }
    }

    #[test]
    fn test_chunk_samples_restartable() {
        let chunk = Chunk::encode(ChunkEncoding::Delta, &[Sample::new(1, 1.0)]);
        assert_eq!(chunk.samples().count(), 1);
        assert_eq!(chunk.samples().count(), 1);
    }

    #[test]
    fn test_corrupt_payload_surfaces_on_pull() {
        // Header claims three samples, payload holds none
        let chunk = Chunk::new(1, 0, 10, 3u32.to_le_bytes().to_vec()).unwrap();

        let mut samples = chunk.samples();
        assert!(matches!(samples.next(), Some(Err(ChunkError::Truncated))));
        assert!(samples.next().is_none());
    }
}
