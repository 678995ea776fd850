//! Series and series sets
//!
//! A [`Series`] pairs a label set with a restartable sample source. The
//! source is one of several shapes (raw samples, encoded chunks, labels only,
//! or a merge of other series), all exposed through the same pull-driven
//! sample iterator.
//!
//! A [`SeriesSet`] is a single-pass cursor over series sorted by label set.

pub mod merge;
pub mod set;

use std::fmt;
use std::sync::Arc;

use crate::chunk::{Chunk, ChunkError, ChunkIteratorFn};
use crate::model::{Labels, Sample, TimeRange};
use crate::querier::QueryError;

pub use merge::{MergeSampleIterator, MergeSeriesSet};
pub use set::{
    matrix_to_series_set, metrics_to_series_set, ConcreteSeriesSet, EmptySeriesSet, ErrSeriesSet,
};

/// Time-ordered samples of one series. An `Err` item ends the stream.
pub type SampleIter<'a> = Box<dyn Iterator<Item = Result<Sample, ChunkError>> + Send + 'a>;

/// One labelled series
#[derive(Clone)]
pub struct Series {
    labels: Labels,
    source: SampleSource,
}

#[derive(Clone)]
enum SampleSource {
    LabelsOnly,
    Samples(Arc<[Sample]>),
    Chunks {
        chunks: Arc<[Chunk]>,
        range: TimeRange,
        iterator_fn: Arc<dyn ChunkIteratorFn>,
    },
    Merged(Vec<Series>),
}

impl Series {
    /// A series backed by already decoded samples
    pub fn from_samples(labels: Labels, samples: Vec<Sample>) -> Self {
        Self {
            labels,
            source: SampleSource::Samples(samples.into()),
        }
    }

    /// A series backed by encoded chunks, decoded lazily within `range`
    pub fn from_chunks(
        labels: Labels,
        chunks: Vec<Chunk>,
        range: TimeRange,
        iterator_fn: Arc<dyn ChunkIteratorFn>,
    ) -> Self {
        Self {
            labels,
            source: SampleSource::Chunks {
                chunks: chunks.into(),
                range,
                iterator_fn,
            },
        }
    }

    /// A series with no samples, used by metadata-only queries
    pub fn labels_only(labels: Labels) -> Self {
        Self {
            labels,
            source: SampleSource::LabelsOnly,
        }
    }

    /// Union of series sharing one label set; earlier series win timestamp ties
    pub fn merged(labels: Labels, series: Vec<Series>) -> Self {
        Self {
            labels,
            source: SampleSource::Merged(series),
        }
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Start a fresh iteration over this series' samples
    pub fn samples(&self) -> SampleIter<'_> {
        match &self.source {
            SampleSource::LabelsOnly => {
                Box::new(std::iter::empty::<Result<Sample, ChunkError>>())
            }
            SampleSource::Samples(samples) => {
                Box::new(samples.iter().copied().map(Ok::<Sample, ChunkError>))
            }
            SampleSource::Chunks {
                chunks,
                range,
                iterator_fn,
            } => iterator_fn.iterator(Arc::clone(chunks), *range),
            SampleSource::Merged(series) => Box::new(MergeSampleIterator::new(
                series.iter().map(|s| s.samples()).collect(),
            )),
        }
    }

    /// Decode all samples, stopping at the first chunk error
    pub fn collect_samples(&self) -> Result<Vec<Sample>, ChunkError> {
        self.samples().collect()
    }
}

impl fmt::Debug for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match &self.source {
            SampleSource::LabelsOnly => "labels_only",
            SampleSource::Samples(_) => "samples",
            SampleSource::Chunks { .. } => "chunks",
            SampleSource::Merged(_) => "merged",
        };
        f.debug_struct("Series")
            .field("labels", &self.labels)
            .field("shape", &shape)
            .finish()
    }
}

/// Single-pass cursor over series sorted by label set
pub trait SeriesSet: Send {
    /// Move to the next series. Returns false when exhausted or failed.
    fn advance(&mut self) -> bool;

    /// The series the cursor is on, valid after `advance` returned true
    fn current(&self) -> Option<&Series>;

    /// The error that stopped iteration, if any
    fn err(&self) -> Option<&QueryError>;
}

/// Drain a series set, returning its series or the error that ended it
pub fn collect_series(mut set: Box<dyn SeriesSet>) -> Result<Vec<Series>, QueryError> {
    let mut out = Vec::new();
    while set.advance() {
        if let Some(series) = set.current() {
            out.push(series.clone());
        }
    }
    match set.err() {
        Some(e) => Err(e.clone()),
        None => Ok(out),
    }
}
