use async_trait::async_trait;
use std::sync::Arc;
use tracing::Instrument;

use super::{ExemplarQuerier, ExemplarQueryable, QueryError};
use crate::context::QueryContext;
use crate::distributor::{Distributor, ExemplarSeries};
use crate::model::{Exemplar, ExemplarResult, Labels, Matcher};

#[derive(Clone)]
pub struct DistributorExemplarQueryable {
    distributor: Arc<dyn Distributor>,
}

impl DistributorExemplarQueryable {
    pub fn new(distributor: Arc<dyn Distributor>) -> Self {
        Self { distributor }
    }
}

impl ExemplarQueryable for DistributorExemplarQueryable {
    fn exemplar_querier(&self, ctx: QueryContext) -> Box<dyn ExemplarQuerier> {
        Box::new(DistributorExemplarQuerier {
            distributor: Arc::clone(&self.distributor),
            ctx,
        })
    }
}

pub struct DistributorExemplarQuerier {
    distributor: Arc<dyn Distributor>,
    ctx: QueryContext,
}

/// Owned result for one series batch
fn to_result(series: ExemplarSeries) -> ExemplarResult {
    let exemplars = series
        .exemplars
        .into_iter()
        .map(|e| Exemplar {
            labels: Labels::new(e.labels),
            value: e.value,
            timestamp_ms: e.timestamp_ms,
        })
        .collect();

    ExemplarResult {
        series_labels: Labels::new(series.labels),
        exemplars,
    }
}

#[async_trait]
impl ExemplarQuerier for DistributorExemplarQuerier {
    async fn select(
        &self,
        start: i64,
        end: i64,
        matcher_sets: &[Vec<Matcher>],
    ) -> Result<Vec<ExemplarResult>, QueryError> {
        let span = tracing::debug_span!(
            "distributor_exemplar_querier.select",
            start,
            end,
            sets = matcher_sets.len()
        );

        let response = self
            .ctx
            .run(self.distributor.query_exemplars(start, end, matcher_sets))
            .instrument(span)
            .await?;

        Ok(response.timeseries.into_iter().map(to_result).collect())
    }
}
