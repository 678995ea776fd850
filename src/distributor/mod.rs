//! Read contract of the ingestion tier
//!
//! The querier only ever talks to the ingestion tier through the
//! [`Distributor`] trait. Replica fan-out, quorum and retries happen behind
//! it. Every operation takes an inclusive millisecond range.

pub mod client;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Label, Labels, Matcher, Metric, MetricMetadata, Sample};

pub use client::HttpDistributor;

/// Decoded samples of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub labels: Labels,
    pub samples: Vec<Sample>,
}

impl TimeSeries {
    pub fn new(labels: Labels, samples: Vec<Sample>) -> Self {
        Self { labels, samples }
    }
}

/// An encoded chunk as sent by the ingestion tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireChunk {
    pub start_timestamp_ms: i64,
    pub end_timestamp_ms: i64,
    pub encoding: u8,
    pub data: Vec<u8>,
}

/// Chunks of one series. Labels arrive in producer order and may repeat names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSeries {
    pub labels: Vec<Label>,
    pub chunks: Vec<WireChunk>,
}

/// Result of a streaming sample read: two disjoint shapes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryStreamResponse {
    #[serde(default)]
    pub timeseries: Vec<TimeSeries>,
    #[serde(default)]
    pub chunkseries: Vec<ChunkSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireExemplar {
    pub labels: Vec<Label>,
    pub value: f64,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExemplarSeries {
    pub labels: Vec<Label>,
    pub exemplars: Vec<WireExemplar>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExemplarQueryResponse {
    #[serde(default)]
    pub timeseries: Vec<ExemplarSeries>,
}

/// Read interface of the ingestion tier
#[async_trait]
pub trait Distributor: Send + Sync {
    /// Samples per series
    async fn query(
        &self,
        from: i64,
        to: i64,
        matchers: &[Matcher],
    ) -> Result<Vec<TimeSeries>, DistributorError>;

    /// Samples as raw timeseries and/or encoded chunk series
    async fn query_stream(
        &self,
        from: i64,
        to: i64,
        matchers: &[Matcher],
    ) -> Result<QueryStreamResponse, DistributorError>;

    /// Exemplars for each matcher set; sets are alternatives
    async fn query_exemplars(
        &self,
        from: i64,
        to: i64,
        matcher_sets: &[Vec<Matcher>],
    ) -> Result<ExemplarQueryResponse, DistributorError>;

    async fn label_values_for_label_name(
        &self,
        from: i64,
        to: i64,
        label: &str,
        matchers: &[Matcher],
    ) -> Result<Vec<String>, DistributorError>;

    async fn label_values_for_label_name_stream(
        &self,
        from: i64,
        to: i64,
        label: &str,
        matchers: &[Matcher],
    ) -> Result<Vec<String>, DistributorError>;

    async fn label_names(&self, from: i64, to: i64) -> Result<Vec<String>, DistributorError>;

    async fn label_names_stream(&self, from: i64, to: i64)
        -> Result<Vec<String>, DistributorError>;

    /// Label sets of matching series, without samples
    async fn metrics_for_label_matchers(
        &self,
        from: i64,
        to: i64,
        matchers: &[Matcher],
    ) -> Result<Vec<Metric>, DistributorError>;

    async fn metrics_for_label_matchers_stream(
        &self,
        from: i64,
        to: i64,
        matchers: &[Matcher],
    ) -> Result<Vec<Metric>, DistributorError>;

    async fn metrics_metadata(&self) -> Result<Vec<MetricMetadata>, DistributorError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DistributorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Query canceled")]
    Canceled,

    #[error("Query deadline exceeded")]
    DeadlineExceeded,
}
