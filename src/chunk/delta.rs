//! Delta chunk payload
//!
//! Layout: a little-endian `u32` sample count followed by one record per
//! sample. Each record is the zigzag varint of the timestamp delta (the first
//! delta is taken from zero) and the varint of the value's bits XOR'd with
//! the previous value's bits. Records are self-delimiting, so the decoder
//! yields samples one at a time without materializing the chunk.

use std::sync::Arc;

use super::ChunkError;
use crate::model::Sample;

pub const HEADER_LEN: usize = 4;

/// Encode samples into a delta payload
pub fn encode(samples: &[Sample]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + samples.len() * 4);
    out.extend_from_slice(&(samples.len() as u32).to_le_bytes());

    let mut prev_ts = 0i64;
    let mut prev_bits = 0u64;
    for sample in samples {
        encode_varint(&mut out, zigzag(sample.timestamp_ms.wrapping_sub(prev_ts)));
        let bits = sample.value.to_bits();
        encode_varint(&mut out, bits ^ prev_bits);
        prev_ts = sample.timestamp_ms;
        prev_bits = bits;
    }

    out
}

/// Read the sample count from a payload header
pub fn sample_count(data: &[u8]) -> Result<usize, ChunkError> {
    let header: [u8; HEADER_LEN] = data
        .get(..HEADER_LEN)
        .and_then(|h| h.try_into().ok())
        .ok_or(ChunkError::Truncated)?;
    Ok(u32::from_le_bytes(header) as usize)
}

/// Pull-driven decoder over a delta payload
#[derive(Debug)]
pub struct DeltaDecoder {
    data: Arc<[u8]>,
    pos: usize,
    remaining: usize,
    prev_ts: i64,
    prev_bits: u64,
    failed: bool,
}

impl DeltaDecoder {
    pub fn new(data: Arc<[u8]>) -> Result<Self, ChunkError> {
        let remaining = sample_count(&data)?;
        Ok(Self {
            data,
            pos: HEADER_LEN,
            remaining,
            prev_ts: 0,
            prev_bits: 0,
            failed: false,
        })
    }

    fn decode_next(&mut self) -> Result<Sample, ChunkError> {
        let (delta, read) = decode_varint(&self.data[self.pos..])?;
        self.pos += read;
        let (bits, read) = decode_varint(&self.data[self.pos..])?;
        self.pos += read;

        self.prev_ts = self.prev_ts.wrapping_add(unzigzag(delta));
        self.prev_bits ^= bits;
        Ok(Sample::new(self.prev_ts, f64::from_bits(self.prev_bits)))
    }
}

impl Iterator for DeltaDecoder {
    type Item = Result<Sample, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        match self.decode_next() {
            Ok(sample) => Some(Ok(sample)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

fn encode_varint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        if v < 0x80 {
            out.push(v as u8);
            break;
        }
        out.push((v as u8) | 0x80);
        v >>= 7;
    }
}

fn decode_varint(data: &[u8]) -> Result<(u64, usize), ChunkError> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in data.iter().enumerate() {
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }

        shift += 7;
        if shift >= 64 {
            return Err(ChunkError::InvalidData);
        }
    }

    Err(ChunkError::Truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(data: Vec<u8>) -> Result<Vec<Sample>, ChunkError> {
        DeltaDecoder::new(data.into())?.collect()
    }

    #[test]
    fn test_delta_timestamps_and_values() {
        let samples: Vec<Sample> = (0..100)
            .map(|i| Sample::new(1_700_000_000_000 + i * 15_000, (i as f64) * 0.5))
            .collect();

        let encoded = encode(&samples);
        assert_eq!(sample_count(&encoded).unwrap(), 100);
        // Regular scrape intervals and slowly changing values stay compact
        assert!(encoded.len() < samples.len() * 16);

        assert_eq!(decode_all(encoded).unwrap(), samples);
    }

    #[test]
    fn test_negative_deltas_and_special_values() {
        let samples = vec![
            Sample::new(100, f64::INFINITY),
            Sample::new(90, -1.0),
            Sample::new(-5, 0.0),
        ];

        let decoded = decode_all(encode(&samples)).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_truncated_payload_errors_once() {
        let samples = vec![Sample::new(1000, 1.0), Sample::new(2000, 2.0)];
        let mut encoded = encode(&samples);
        encoded.truncate(encoded.len() - 1);

        let mut decoder = DeltaDecoder::new(encoded.into()).unwrap();
        assert_eq!(decoder.next().unwrap().unwrap(), Sample::new(1000, 1.0));
        assert!(matches!(decoder.next(), Some(Err(ChunkError::Truncated))));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            DeltaDecoder::new(vec![1u8, 0].into()),
            Err(ChunkError::Truncated)
        ));
    }
}
