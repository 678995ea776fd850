//! Chained merge of sorted series sets
//!
//! Series sets are merged like a k-way merge sort on label sets. Series that
//! share a label set across inputs become one series whose samples are the
//! time-ordered union of the inputs.
//!
//! Duplicate timestamps: the sample from the input listed first wins and the
//! others are dropped. For streaming reads the raw timeseries set is listed
//! before the chunk set, so raw samples take precedence.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::{SampleIter, Series, SeriesSet};
use crate::chunk::ChunkError;
use crate::model::Sample;
use crate::querier::QueryError;

/// Merges sorted series sets into one sorted set
pub struct MergeSeriesSet {
    sets: Vec<Box<dyn SeriesSet>>,
    /// Whether each input currently has a series
    ready: Vec<bool>,
    /// Inputs that produced the current series and must move next
    consumed: Vec<usize>,
    current: Option<Series>,
    err: Option<QueryError>,
    started: bool,
}

impl MergeSeriesSet {
    pub fn new(sets: Vec<Box<dyn SeriesSet>>) -> Self {
        let n = sets.len();
        Self {
            sets,
            ready: vec![false; n],
            consumed: Vec::new(),
            current: None,
            err: None,
            started: false,
        }
    }

    fn step(&mut self, idx: usize) -> Result<(), QueryError> {
        self.ready[idx] = self.sets[idx].advance();
        if let Some(e) = self.sets[idx].err() {
            return Err(e.clone());
        }
        Ok(())
    }

    fn try_advance(&mut self) -> Result<bool, QueryError> {
        let to_step: Vec<usize> = if self.started {
            std::mem::take(&mut self.consumed)
        } else {
            self.started = true;
            (0..self.sets.len()).collect()
        };
        for idx in to_step {
            self.step(idx)?;
        }

        let mut smallest: Vec<usize> = Vec::new();
        for idx in 0..self.sets.len() {
            if !self.ready[idx] {
                continue;
            }
            let Some(labels) = self.sets[idx].current().map(|s| s.labels()) else {
                continue;
            };
            match smallest.first() {
                None => smallest.push(idx),
                Some(&first) => {
                    let min = self.sets[first].current().map(|s| s.labels());
                    match Some(labels).cmp(&min) {
                        std::cmp::Ordering::Less => {
                            smallest.clear();
                            smallest.push(idx);
                        }
                        std::cmp::Ordering::Equal => smallest.push(idx),
                        std::cmp::Ordering::Greater => {}
                    }
                }
            }
        }

        let mut parts: Vec<Series> = smallest
            .iter()
            .filter_map(|&idx| self.sets[idx].current().cloned())
            .collect();
        self.consumed = smallest;

        self.current = match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => {
                let labels = parts[0].labels().clone();
                Some(Series::merged(labels, parts))
            }
        };
        Ok(self.current.is_some())
    }
}

impl SeriesSet for MergeSeriesSet {
    fn advance(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }
        match self.try_advance() {
            Ok(more) => more,
            Err(e) => {
                self.current = None;
                self.err = Some(e);
                false
            }
        }
    }

    fn current(&self) -> Option<&Series> {
        self.current.as_ref()
    }

    fn err(&self) -> Option<&QueryError> {
        self.err.as_ref()
    }
}

/// Time-ordered union of sample streams.
///
/// Streams are pulled lazily; on equal timestamps the stream with the lower
/// index wins. The first error from any stream ends the merge.
pub struct MergeSampleIterator<'a> {
    streams: Vec<SampleIter<'a>>,
    heads: Vec<Option<Sample>>,
    heap: BinaryHeap<Reverse<(i64, usize)>>,
    started: bool,
    failed: bool,
}

impl<'a> MergeSampleIterator<'a> {
    pub fn new(streams: Vec<SampleIter<'a>>) -> Self {
        let n = streams.len();
        Self {
            streams,
            heads: vec![None; n],
            heap: BinaryHeap::with_capacity(n),
            started: false,
            failed: false,
        }
    }

    fn refill(&mut self, idx: usize) -> Result<(), ChunkError> {
        if let Some(item) = self.streams[idx].next() {
            let sample = item?;
            self.heads[idx] = Some(sample);
            self.heap.push(Reverse((sample.timestamp_ms, idx)));
        }
        Ok(())
    }

    fn next_sample(&mut self) -> Result<Option<Sample>, ChunkError> {
        if !self.started {
            self.started = true;
            for idx in 0..self.streams.len() {
                self.refill(idx)?;
            }
        }

        let Some(Reverse((ts, idx))) = self.heap.pop() else {
            return Ok(None);
        };
        let sample = self.heads[idx].take();
        self.refill(idx)?;

        while let Some(Reverse((next_ts, next_idx))) = self.heap.peek().copied() {
            if next_ts != ts {
                break;
            }
            self.heap.pop();
            self.heads[next_idx] = None;
            self.refill(next_idx)?;
        }

        Ok(sample)
    }
}

impl Iterator for MergeSampleIterator<'_> {
    type Item = Result<Sample, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_sample() {
            Ok(sample) => sample.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
