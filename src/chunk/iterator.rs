//! Chunk iterator strategies
//!
//! Turns the chunks of one series into a single time-ordered sample stream
//! bounded to the query range. Chunks outside the range are never decoded.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::{Chunk, ChunkError, ChunkSamples};
use crate::model::{Sample, TimeRange};
use crate::series::merge::MergeSampleIterator;
use crate::series::SampleIter;

/// Builds a sample iterator over the chunks of one series
pub trait ChunkIteratorFn: Send + Sync + fmt::Debug {
    fn iterator(&self, chunks: Arc<[Chunk]>, range: TimeRange) -> SampleIter<'static>;
}

/// Built-in chunk iterator strategies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkIteratorKind {
    /// Decode chunks one after another. Samples that do not advance time
    /// are dropped, so overlapping chunks lose their overlap.
    Sequential,
    /// K-way merge across all chunks; handles overlapping chunks.
    #[default]
    Merging,
}

impl ChunkIteratorFn for ChunkIteratorKind {
    fn iterator(&self, chunks: Arc<[Chunk]>, range: TimeRange) -> SampleIter<'static> {
        let order = overlapping_in_time_order(&chunks, range);
        match self {
            ChunkIteratorKind::Sequential => Box::new(SequentialIterator {
                chunks,
                order: order.into_iter(),
                current: None,
                range,
                last_ts: None,
                failed: false,
            }),
            ChunkIteratorKind::Merging => {
                let streams = order
                    .iter()
                    .map(|&i| bounded(chunks[i].samples(), range))
                    .collect();
                Box::new(MergeSampleIterator::new(streams))
            }
        }
    }
}

impl FromStr for ChunkIteratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(ChunkIteratorKind::Sequential),
            "merging" => Ok(ChunkIteratorKind::Merging),
            other => Err(format!("unknown chunk iterator: {}", other)),
        }
    }
}

/// Indices of chunks overlapping the range, ordered by min time (stable)
fn overlapping_in_time_order(chunks: &[Chunk], range: TimeRange) -> Vec<usize> {
    let mut order: Vec<usize> = (0..chunks.len())
        .filter(|&i| range.overlaps(chunks[i].min_time(), chunks[i].max_time()))
        .collect();
    order.sort_by_key(|&i| chunks[i].min_time());
    order
}

struct SequentialIterator {
    chunks: Arc<[Chunk]>,
    order: std::vec::IntoIter<usize>,
    current: Option<ChunkSamples>,
    range: TimeRange,
    last_ts: Option<i64>,
    failed: bool,
}

impl Iterator for SequentialIterator {
    type Item = Result<Sample, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if self.current.is_none() {
                let idx = self.order.next()?;
                self.current = Some(self.chunks[idx].samples());
            }

            let samples = self.current.as_mut()?;
            match samples.next() {
                None => self.current = None,
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                Some(Ok(sample)) => {
                    if sample.timestamp_ms > self.range.max {
                        // Rest of this chunk is past the range
                        self.current = None;
                        continue;
                    }
                    if sample.timestamp_ms < self.range.min
                        || self.last_ts.is_some_and(|last| sample.timestamp_ms <= last)
                    {
                        continue;
                    }
                    self.last_ts = Some(sample.timestamp_ms);
                    return Some(Ok(sample));
                }
            }
        }
    }
}

/// Restrict a time-ordered chunk stream to the range
fn bounded(samples: ChunkSamples, range: TimeRange) -> SampleIter<'static> {
    Box::new(
        samples
            .skip_while(move |item| matches!(item, Ok(s) if s.timestamp_ms < range.min))
            .take_while(move |item| !matches!(item, Ok(s) if s.timestamp_ms > range.max)),
    )
}
