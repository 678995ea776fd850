use super::{Series, SeriesSet};
use crate::distributor::TimeSeries;
use crate::model::Metric;
use crate::querier::QueryError;

/// Series set over an in-memory list, sorted on construction
#[derive(Debug)]
pub struct ConcreteSeriesSet {
    series: std::vec::IntoIter<Series>,
    current: Option<Series>,
}

impl ConcreteSeriesSet {
    pub fn new(mut series: Vec<Series>) -> Self {
        series.sort_by(|a, b| a.labels().cmp(b.labels()));
        Self {
            series: series.into_iter(),
            current: None,
        }
    }

    pub fn len(&self) -> usize {
        self.series.len() + usize::from(self.current.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SeriesSet for ConcreteSeriesSet {
    fn advance(&mut self) -> bool {
        self.current = self.series.next();
        self.current.is_some()
    }

    fn current(&self) -> Option<&Series> {
        self.current.as_ref()
    }

    fn err(&self) -> Option<&QueryError> {
        None
    }
}

/// The canonical empty result
#[derive(Debug, Default)]
pub struct EmptySeriesSet;

impl SeriesSet for EmptySeriesSet {
    fn advance(&mut self) -> bool {
        false
    }

    fn current(&self) -> Option<&Series> {
        None
    }

    fn err(&self) -> Option<&QueryError> {
        None
    }
}

/// A failed result: yields no series and reports the error
#[derive(Debug)]
pub struct ErrSeriesSet {
    err: QueryError,
}

impl ErrSeriesSet {
    pub fn new(err: impl Into<QueryError>) -> Self {
        Self { err: err.into() }
    }
}

impl SeriesSet for ErrSeriesSet {
    fn advance(&mut self) -> bool {
        false
    }

    fn current(&self) -> Option<&Series> {
        None
    }

    fn err(&self) -> Option<&QueryError> {
        Some(&self.err)
    }
}

/// Sorted series set over decoded per-series samples
pub fn matrix_to_series_set(matrix: Vec<TimeSeries>) -> ConcreteSeriesSet {
    ConcreteSeriesSet::new(
        matrix
            .into_iter()
            .map(|ts| Series::from_samples(ts.labels, ts.samples))
            .collect(),
    )
}

/// Sorted series set of label-only series
pub fn metrics_to_series_set(metrics: Vec<Metric>) -> ConcreteSeriesSet {
    ConcreteSeriesSet::new(
        metrics
            .into_iter()
            .map(|m| Series::labels_only(m.labels))
            .collect(),
    )
}
