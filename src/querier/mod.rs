//! Storage-querier contract exposed to the query engine, and its
//! implementations over the ingestion tier.

pub mod distributor;
pub mod exemplar;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::chunk::ChunkError;
use crate::context::QueryContext;
use crate::distributor::DistributorError;
use crate::model::{ExemplarResult, Matcher};
use crate::series::SeriesSet;

pub use distributor::{DistributorQuerier, DistributorQueryable};
pub use exemplar::{DistributorExemplarQuerier, DistributorExemplarQueryable};

/// Non-fatal notes attached to a result
pub type Warnings = Vec<String>;

/// Engine-provided hints for a select
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectHints {
    pub start: i64,
    pub end: i64,
    /// Name of the function the selection feeds; "series" means label sets only
    pub func: Option<String>,
}

impl SelectHints {
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            start,
            end,
            func: None,
        }
    }

    pub fn with_func(mut self, func: impl Into<String>) -> Self {
        self.func = Some(func.into());
        self
    }

    /// Check whether the caller only needs series label sets
    pub fn is_series_only(&self) -> bool {
        self.func.as_deref() == Some("series")
    }
}

/// Builds queriers over a fixed time range
pub trait Queryable: Send + Sync {
    fn querier(&self, ctx: QueryContext, mint: i64, maxt: i64) -> Box<dyn Querier>;
}

/// A queryable that can tell up front whether a query needs it at all
pub trait QueryableWithFilter: Queryable {
    fn use_queryable(&self, now: DateTime<Utc>, query_min_t: i64, query_max_t: i64) -> bool;
}

/// Query access to series and labels over one time range
#[async_trait]
pub trait Querier: Send + Sync {
    /// Select series matching every matcher. The result is always sorted,
    /// so `sort_series` is accepted only for contract compatibility.
    async fn select(
        &self,
        sort_series: bool,
        hints: Option<&SelectHints>,
        matchers: &[Matcher],
    ) -> Box<dyn SeriesSet>;

    async fn label_values(
        &self,
        name: &str,
        matchers: &[Matcher],
    ) -> Result<(Vec<String>, Warnings), QueryError>;

    async fn label_names(&self, matchers: &[Matcher]) -> Result<(Vec<String>, Warnings), QueryError>;

    /// Release held resources
    fn close(&self) -> Result<(), QueryError>;
}

/// Builds exemplar queriers
pub trait ExemplarQueryable: Send + Sync {
    fn exemplar_querier(&self, ctx: QueryContext) -> Box<dyn ExemplarQuerier>;
}

#[async_trait]
pub trait ExemplarQuerier: Send + Sync {
    /// Exemplars in `[start, end]` for series matching any of the matcher sets
    async fn select(
        &self,
        start: i64,
        end: i64,
        matcher_sets: &[Vec<Matcher>],
    ) -> Result<Vec<ExemplarResult>, QueryError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Distributor error: {0}")]
    Distributor(#[from] DistributorError),

    #[error("Chunk error: {0}")]
    Chunk(#[from] ChunkError),
}
