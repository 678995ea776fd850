//! Querier over the ingestion tier
//!
//! Sample selects go through a time-window check first: the ingestion tier
//! only holds recent data, so the lower bound of the query is raised to
//! `now - query_ingesters_within` and queries ending before that point are
//! answered with an empty set without a round trip. Older data is expected to
//! come from long-term storage elsewhere in the engine.
//!
//! Series-only selects skip that check. Series discovery on the ingestion
//! tier ignores time bounds, and narrowing the range would hide series that
//! are still held there.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use super::{
    Querier, QueryError, Queryable, QueryableWithFilter, SelectHints, Warnings,
};
use crate::chunk::{Chunk, ChunkIteratorFn};
use crate::clock::{Clock, SystemClock};
use crate::config::QuerierConfig;
use crate::context::QueryContext;
use crate::distributor::{Distributor, QueryStreamResponse};
use crate::model::{Labels, Matcher, Metric, MetricMetadata, TimeRange};
use crate::series::{
    matrix_to_series_set, metrics_to_series_set, ConcreteSeriesSet, EmptySeriesSet,
    ErrSeriesSet, MergeSeriesSet, Series, SeriesSet,
};

/// Start of the window the ingestion tier is consulted for
fn window_start(now: DateTime<Utc>, within: Duration) -> i64 {
    now.timestamp_millis()
        .saturating_sub(i64::try_from(within.as_millis()).unwrap_or(i64::MAX))
}

/// Factory for queriers over the ingestion tier
#[derive(Clone)]
pub struct DistributorQueryable {
    distributor: Arc<dyn Distributor>,
    streaming: bool,
    streaming_metadata: bool,
    iterator_fn: Arc<dyn ChunkIteratorFn>,
    query_ingesters_within: Duration,
    clock: Arc<dyn Clock>,
}

impl DistributorQueryable {
    pub fn new(distributor: Arc<dyn Distributor>, config: &QuerierConfig) -> Self {
        Self {
            distributor,
            streaming: config.ingester_streaming,
            streaming_metadata: config.ingester_metadata_streaming,
            iterator_fn: Arc::new(config.chunk_iterator),
            query_ingesters_within: config.query_ingesters_within,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_chunk_iterator(mut self, iterator_fn: Arc<dyn ChunkIteratorFn>) -> Self {
        self.iterator_fn = iterator_fn;
        self
    }

    /// Build a querier for `[mint, maxt]`
    pub fn distributor_querier(&self, ctx: QueryContext, mint: i64, maxt: i64) -> DistributorQuerier {
        DistributorQuerier {
            distributor: Arc::clone(&self.distributor),
            ctx,
            mint,
            maxt,
            streaming: self.streaming,
            streaming_metadata: self.streaming_metadata,
            iterator_fn: Arc::clone(&self.iterator_fn),
            query_ingesters_within: self.query_ingesters_within,
            clock: Arc::clone(&self.clock),
        }
    }

    /// Per-metric metadata held by the ingestion tier
    pub async fn metrics_metadata(
        &self,
        ctx: &QueryContext,
    ) -> Result<Vec<MetricMetadata>, QueryError> {
        Ok(ctx.run(self.distributor.metrics_metadata()).await?)
    }
}

impl Queryable for DistributorQueryable {
    fn querier(&self, ctx: QueryContext, mint: i64, maxt: i64) -> Box<dyn Querier> {
        Box::new(self.distributor_querier(ctx, mint, maxt))
    }
}

impl QueryableWithFilter for DistributorQueryable {
    fn use_queryable(&self, now: DateTime<Utc>, _query_min_t: i64, query_max_t: i64) -> bool {
        self.query_ingesters_within.is_zero()
            || query_max_t >= window_start(now, self.query_ingesters_within)
    }
}

/// Querier serving one logical query from the ingestion tier
pub struct DistributorQuerier {
    distributor: Arc<dyn Distributor>,
    ctx: QueryContext,
    mint: i64,
    maxt: i64,
    streaming: bool,
    streaming_metadata: bool,
    iterator_fn: Arc<dyn ChunkIteratorFn>,
    query_ingesters_within: Duration,
    clock: Arc<dyn Clock>,
}

impl DistributorQuerier {
    async fn try_select(
        &self,
        hints: Option<&SelectHints>,
        matchers: &[Matcher],
    ) -> Result<Box<dyn SeriesSet>, QueryError> {
        let mut range = match hints {
            Some(h) => TimeRange::new(h.start, h.end),
            None => TimeRange::new(self.mint, self.maxt),
        };

        if hints.is_some_and(SelectHints::is_series_only) {
            tracing::debug!("series-only select, time range left untouched");
            let metrics = self.metrics_for_label_matchers(matchers).await?;
            return Ok(Box::new(metrics_to_series_set(metrics)));
        }

        if !self.query_ingesters_within.is_zero() {
            let original_min = range.min;
            range = range.with_min_at_least(window_start(self.clock.now(), self.query_ingesters_within));

            if range.min != original_min {
                tracing::debug!(
                    original = original_min,
                    updated = range.min,
                    "min time of the query to ingesters has been manipulated"
                );
            }

            if range.is_empty() {
                tracing::debug!("empty query time range after min time manipulation");
                return Ok(Box::new(EmptySeriesSet));
            }
        }

        if self.streaming {
            let response = self
                .ctx
                .run(self.distributor.query_stream(range.min, range.max, matchers))
                .await?;
            return self.stream_to_series_set(response, range);
        }

        let matrix = self
            .ctx
            .run(self.distributor.query(range.min, range.max, matchers))
            .await?;
        Ok(Box::new(matrix_to_series_set(matrix)))
    }

    fn stream_to_series_set(
        &self,
        response: QueryStreamResponse,
        range: TimeRange,
    ) -> Result<Box<dyn SeriesSet>, QueryError> {
        let mut sets: Vec<Box<dyn SeriesSet>> = Vec::with_capacity(2);

        if !response.timeseries.is_empty() {
            sets.push(Box::new(matrix_to_series_set(response.timeseries)));
        }

        let mut series = Vec::with_capacity(response.chunkseries.len());
        let mut dropped = 0usize;
        for entry in response.chunkseries {
            // Ingesters can send series without data
            if entry.chunks.is_empty() {
                dropped += 1;
                continue;
            }

            let labels = Labels::new(entry.labels);
            let chunks = entry
                .chunks
                .into_iter()
                .map(|c| Chunk::new(c.encoding, c.start_timestamp_ms, c.end_timestamp_ms, c.data))
                .collect::<Result<Vec<_>, _>>()?;

            series.push(Series::from_chunks(
                labels,
                chunks,
                range,
                Arc::clone(&self.iterator_fn),
            ));
        }

        if dropped > 0 {
            tracing::debug!(dropped, "skipped chunk series without chunks");
        }
        if !series.is_empty() {
            sets.push(Box::new(ConcreteSeriesSet::new(series)));
        }

        tracing::debug!(shapes = sets.len(), "streaming select");
        if sets.len() > 1 {
            return Ok(Box::new(MergeSeriesSet::new(sets)));
        }
        Ok(sets.pop().unwrap_or_else(|| Box::new(EmptySeriesSet)))
    }

    async fn metrics_for_label_matchers(&self, matchers: &[Matcher]) -> Result<Vec<Metric>, QueryError> {
        let metrics = if self.streaming_metadata {
            self.ctx
                .run(
                    self.distributor
                        .metrics_for_label_matchers_stream(self.mint, self.maxt, matchers),
                )
                .await?
        } else {
            self.ctx
                .run(
                    self.distributor
                        .metrics_for_label_matchers(self.mint, self.maxt, matchers),
                )
                .await?
        };
        Ok(metrics)
    }

    /// Label names via the metrics read, as there is no native matcher-aware
    /// names read. Transfers whole label sets.
    async fn label_names_with_matchers(&self, matchers: &[Matcher]) -> Result<Vec<String>, QueryError> {
        let metrics = self.metrics_for_label_matchers(matchers).await?;

        let names: BTreeSet<&str> = metrics.iter().flat_map(|m| m.labels.names()).collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }
}

#[async_trait]
impl Querier for DistributorQuerier {
    async fn select(
        &self,
        _sort_series: bool,
        hints: Option<&SelectHints>,
        matchers: &[Matcher],
    ) -> Box<dyn SeriesSet> {
        let span = tracing::debug_span!("distributor_querier.select", mint = self.mint, maxt = self.maxt);

        match self.try_select(hints, matchers).instrument(span).await {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!("Ingester select failed: {}", e);
                Box::new(ErrSeriesSet::new(e))
            }
        }
    }

    async fn label_values(
        &self,
        name: &str,
        matchers: &[Matcher],
    ) -> Result<(Vec<String>, Warnings), QueryError> {
        let span = tracing::debug_span!("distributor_querier.label_values", label = name);

        let values = async {
            if self.streaming_metadata {
                self.ctx
                    .run(self.distributor.label_values_for_label_name_stream(
                        self.mint, self.maxt, name, matchers,
                    ))
                    .await
            } else {
                self.ctx
                    .run(self.distributor.label_values_for_label_name(
                        self.mint, self.maxt, name, matchers,
                    ))
                    .await
            }
        }
        .instrument(span)
        .await?;

        Ok((values, Warnings::new()))
    }

    async fn label_names(&self, matchers: &[Matcher]) -> Result<(Vec<String>, Warnings), QueryError> {
        if !matchers.is_empty() {
            let span = tracing::debug_span!("distributor_querier.label_names_with_matchers");
            let names = self.label_names_with_matchers(matchers).instrument(span).await?;
            return Ok((names, Warnings::new()));
        }

        let span = tracing::debug_span!("distributor_querier.label_names");
        let names = async {
            if self.streaming_metadata {
                self.ctx
                    .run(self.distributor.label_names_stream(self.mint, self.maxt))
                    .await
            } else {
                self.ctx
                    .run(self.distributor.label_names(self.mint, self.maxt))
                    .await
            }
        }
        .instrument(span)
        .await?;

        Ok((names, Warnings::new()))
    }

    fn close(&self) -> Result<(), QueryError> {
        Ok(())
    }
}
