//! Deterministic in-memory distributor for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

use super::{
    ChunkSeries, Distributor, DistributorError, ExemplarQueryResponse, QueryStreamResponse,
    TimeSeries,
};
use crate::model::{matches_all, Labels, Matcher, Metric, MetricMetadata};

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: &'static str,
    pub from: i64,
    pub to: i64,
    pub matchers: Vec<Matcher>,
    /// Label name of a label values read
    pub label: Option<String>,
    /// Matcher groups of an exemplar read, as received
    pub matcher_sets: Vec<Vec<Matcher>>,
}

impl Call {
    fn new(op: &'static str, from: i64, to: i64, matchers: &[Matcher]) -> Self {
        Self {
            op,
            from,
            to,
            matchers: matchers.to_vec(),
            label: None,
            matcher_sets: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct MockDistributor {
    pub matrix: Vec<TimeSeries>,
    pub stream: QueryStreamResponse,
    pub metrics: Vec<Metric>,
    pub label_names: Vec<String>,
    pub label_values: Vec<String>,
    pub exemplars: ExemplarQueryResponse,
    pub metadata: Vec<MetricMetadata>,
    pub fail_with: Option<DistributorError>,
    pub delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
}

impl MockDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(|c| c.op).collect()
    }

    async fn record(&self, call: Call) -> Result<(), DistributorError> {
        self.calls.lock().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

fn raw_labels_match(matchers: &[Matcher], series: &ChunkSeries) -> bool {
    matches_all(matchers, &Labels::new(series.labels.clone()))
}

#[async_trait]
impl Distributor for MockDistributor {
    async fn query(
        &self,
        from: i64,
        to: i64,
        matchers: &[Matcher],
    ) -> Result<Vec<TimeSeries>, DistributorError> {
        self.record(Call::new("query", from, to, matchers)).await?;
        Ok(self
            .matrix
            .iter()
            .filter(|ts| matches_all(matchers, &ts.labels))
            .cloned()
            .collect())
    }

    async fn query_stream(
        &self,
        from: i64,
        to: i64,
        matchers: &[Matcher],
    ) -> Result<QueryStreamResponse, DistributorError> {
        self.record(Call::new("query_stream", from, to, matchers)).await?;
        Ok(QueryStreamResponse {
            timeseries: self
                .stream
                .timeseries
                .iter()
                .filter(|ts| matches_all(matchers, &ts.labels))
                .cloned()
                .collect(),
            chunkseries: self
                .stream
                .chunkseries
                .iter()
                .filter(|cs| raw_labels_match(matchers, cs))
                .cloned()
                .collect(),
        })
    }

    async fn query_exemplars(
        &self,
        from: i64,
        to: i64,
        matcher_sets: &[Vec<Matcher>],
    ) -> Result<ExemplarQueryResponse, DistributorError> {
        self.record(Call {
            matcher_sets: matcher_sets.to_vec(),
            ..Call::new("query_exemplars", from, to, &[])
        })
        .await?;
        Ok(self.exemplars.clone())
    }

    async fn label_values_for_label_name(
        &self,
        from: i64,
        to: i64,
        label: &str,
        matchers: &[Matcher],
    ) -> Result<Vec<String>, DistributorError> {
        self.record(Call {
            label: Some(label.to_string()),
            ..Call::new("label_values", from, to, matchers)
        })
        .await?;
        Ok(self.label_values.clone())
    }

    async fn label_values_for_label_name_stream(
        &self,
        from: i64,
        to: i64,
        label: &str,
        matchers: &[Matcher],
    ) -> Result<Vec<String>, DistributorError> {
        self.record(Call {
            label: Some(label.to_string()),
            ..Call::new("label_values_stream", from, to, matchers)
        })
        .await?;
        Ok(self.label_values.clone())
    }

    async fn label_names(&self, from: i64, to: i64) -> Result<Vec<String>, DistributorError> {
        self.record(Call::new("label_names", from, to, &[])).await?;
        Ok(self.label_names.clone())
    }

    async fn label_names_stream(
        &self,
        from: i64,
        to: i64,
    ) -> Result<Vec<String>, DistributorError> {
        self.record(Call::new("label_names_stream", from, to, &[])).await?;
        Ok(self.label_names.clone())
    }

    async fn metrics_for_label_matchers(
        &self,
        from: i64,
        to: i64,
        matchers: &[Matcher],
    ) -> Result<Vec<Metric>, DistributorError> {
        self.record(Call::new("metrics", from, to, matchers)).await?;
        Ok(self
            .metrics
            .iter()
            .filter(|m| matches_all(matchers, &m.labels))
            .cloned()
            .collect())
    }

    async fn metrics_for_label_matchers_stream(
        &self,
        from: i64,
        to: i64,
        matchers: &[Matcher],
    ) -> Result<Vec<Metric>, DistributorError> {
        self.record(Call::new("metrics_stream", from, to, matchers)).await?;
        Ok(self
            .metrics
            .iter()
            .filter(|m| matches_all(matchers, &m.labels))
            .cloned()
            .collect())
    }

    async fn metrics_metadata(&self) -> Result<Vec<MetricMetadata>, DistributorError> {
        self.record(Call::new("metadata", 0, 0, &[])).await?;
        Ok(self.metadata.clone())
    }
}
