use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    Distributor, DistributorError, ExemplarQueryResponse, QueryStreamResponse, TimeSeries,
};
use crate::model::{Matcher, Metric, MetricMetadata};

pub const QUERY_PATH: &str = "/read/query";
pub const QUERY_STREAM_PATH: &str = "/read/query_stream";
pub const EXEMPLARS_PATH: &str = "/read/exemplars";
pub const LABEL_VALUES_PATH: &str = "/read/label_values";
pub const LABEL_VALUES_STREAM_PATH: &str = "/read/label_values_stream";
pub const LABEL_NAMES_PATH: &str = "/read/label_names";
pub const LABEL_NAMES_STREAM_PATH: &str = "/read/label_names_stream";
pub const METRICS_PATH: &str = "/read/metrics";
pub const METRICS_STREAM_PATH: &str = "/read/metrics_stream";
pub const METADATA_PATH: &str = "/read/metadata";

/// Body of every read request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadRequest {
    pub from: i64,
    pub to: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<Matcher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matcher_sets: Vec<Vec<Matcher>>,
}

impl ReadRequest {
    fn range(from: i64, to: i64) -> Self {
        Self {
            from,
            to,
            ..Default::default()
        }
    }

    fn with_matchers(from: i64, to: i64, matchers: &[Matcher]) -> Self {
        Self {
            matchers: matchers.to_vec(),
            ..Self::range(from, to)
        }
    }
}

/// JSON-over-HTTP client for an ingestion-tier read endpoint
#[derive(Debug, Clone)]
pub struct HttpDistributor {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpDistributor {
    pub fn new(addr: &str, timeout: Duration) -> Result<Self, DistributorError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DistributorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: format!("http://{}", addr),
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &ReadRequest,
    ) -> Result<T, DistributorError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| DistributorError::Network(e.to_string()))?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, DistributorError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DistributorError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| DistributorError::Deserialization(e.to_string()))
    }
}

#[async_trait]
impl Distributor for HttpDistributor {
    async fn query(
        &self,
        from: i64,
        to: i64,
        matchers: &[Matcher],
    ) -> Result<Vec<TimeSeries>, DistributorError> {
        self.post(QUERY_PATH, &ReadRequest::with_matchers(from, to, matchers))
            .await
    }

    async fn query_stream(
        &self,
        from: i64,
        to: i64,
        matchers: &[Matcher],
    ) -> Result<QueryStreamResponse, DistributorError> {
        self.post(QUERY_STREAM_PATH, &ReadRequest::with_matchers(from, to, matchers))
            .await
    }

    async fn query_exemplars(
        &self,
        from: i64,
        to: i64,
        matcher_sets: &[Vec<Matcher>],
    ) -> Result<ExemplarQueryResponse, DistributorError> {
        let request = ReadRequest {
            matcher_sets: matcher_sets.to_vec(),
            ..ReadRequest::range(from, to)
        };
        self.post(EXEMPLARS_PATH, &request).await
    }

    async fn label_values_for_label_name(
        &self,
        from: i64,
        to: i64,
        label: &str,
        matchers: &[Matcher],
    ) -> Result<Vec<String>, DistributorError> {
        let request = ReadRequest {
            label: Some(label.to_string()),
            ..ReadRequest::with_matchers(from, to, matchers)
        };
        self.post(LABEL_VALUES_PATH, &request).await
    }

    async fn label_values_for_label_name_stream(
        &self,
        from: i64,
        to: i64,
        label: &str,
        matchers: &[Matcher],
    ) -> Result<Vec<String>, DistributorError> {
        let request = ReadRequest {
            label: Some(label.to_string()),
            ..ReadRequest::with_matchers(from, to, matchers)
        };
        self.post(LABEL_VALUES_STREAM_PATH, &request).await
    }

    async fn label_names(&self, from: i64, to: i64) -> Result<Vec<String>, DistributorError> {
        self.post(LABEL_NAMES_PATH, &ReadRequest::range(from, to)).await
    }

    async fn label_names_stream(
        &self,
        from: i64,
        to: i64,
    ) -> Result<Vec<String>, DistributorError> {
        self.post(LABEL_NAMES_STREAM_PATH, &ReadRequest::range(from, to))
            .await
    }

    async fn metrics_for_label_matchers(
        &self,
        from: i64,
        to: i64,
        matchers: &[Matcher],
    ) -> Result<Vec<Metric>, DistributorError> {
        self.post(METRICS_PATH, &ReadRequest::with_matchers(from, to, matchers))
            .await
    }

    async fn metrics_for_label_matchers_stream(
        &self,
        from: i64,
        to: i64,
        matchers: &[Matcher],
    ) -> Result<Vec<Metric>, DistributorError> {
        self.post(METRICS_STREAM_PATH, &ReadRequest::with_matchers(from, to, matchers))
            .await
    }

    async fn metrics_metadata(&self) -> Result<Vec<MetricMetadata>, DistributorError> {
        let url = format!("{}{}", self.base_url, METADATA_PATH);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| DistributorError::Network(e.to_string()))?;

        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributor::{ChunkSeries, WireChunk};
    use crate::model::{Label, Labels, Sample};
    use axum::{http::StatusCode, routing::{get, post}, Json, Router};

    async fn stub_query_stream(Json(req): Json<ReadRequest>) -> Json<QueryStreamResponse> {
        // Echo the request back through the labels so the test can inspect it
        let labels = Labels::from_pairs([
            ("__name__", "echo".to_string()),
            ("matchers", req.matchers.len().to_string()),
        ]);
        Json(QueryStreamResponse {
            timeseries: vec![TimeSeries::new(labels, vec![Sample::new(req.from, 1.0)])],
            chunkseries: vec![ChunkSeries {
                labels: vec![Label::new("z", "1"), Label::new("a", "2")],
                chunks: vec![WireChunk {
                    start_timestamp_ms: req.from,
                    end_timestamp_ms: req.to,
                    encoding: 1,
                    data: vec![0, 0, 0, 0],
                }],
            }],
        })
    }

    async fn stub_label_values(Json(req): Json<ReadRequest>) -> Json<Vec<String>> {
        Json(vec![req.label.unwrap_or_default(), "v2".to_string()])
    }

    async fn stub_metadata() -> Json<Vec<MetricMetadata>> {
        Json(vec![MetricMetadata {
            metric_family: "up".to_string(),
            metric_type: "gauge".to_string(),
            help: "Target is up".to_string(),
            unit: String::new(),
        }])
    }

    async fn spawn_stub() -> String {
        let app = Router::new()
            .route(QUERY_STREAM_PATH, post(stub_query_stream))
            .route(LABEL_VALUES_PATH, post(stub_label_values))
            .route(METADATA_PATH, get(stub_metadata))
            .route(
                LABEL_NAMES_PATH,
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "no healthy ingesters") }),
            )
            .route(METRICS_PATH, post(|| async { "not json" }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr.to_string()
    }

    fn client(addr: &str) -> HttpDistributor {
        HttpDistributor::new(addr, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_query_stream_roundtrip() {
        let addr = spawn_stub().await;
        let matchers = vec![Matcher::equal("__name__", "up"), Matcher::equal("job", "api")];

        let response = client(&addr).query_stream(1000, 2000, &matchers).await.unwrap();

        assert_eq!(response.timeseries.len(), 1);
        let series = &response.timeseries[0];
        assert_eq!(series.labels.get("matchers"), Some("2"));
        assert_eq!(series.samples, vec![Sample::new(1000, 1.0)]);

        // Chunk series labels keep producer order on the wire
        assert_eq!(response.chunkseries[0].labels[0].name, "z");
        assert_eq!(response.chunkseries[0].chunks[0].end_timestamp_ms, 2000);
    }

    #[tokio::test]
    async fn test_label_values_sends_label() {
        let addr = spawn_stub().await;

        let values = client(&addr)
            .label_values_for_label_name(0, 10, "job", &[])
            .await
            .unwrap();
        assert_eq!(values, vec!["job", "v2"]);
    }

    #[tokio::test]
    async fn test_metadata() {
        let addr = spawn_stub().await;

        let metadata = client(&addr).metrics_metadata().await.unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata[0].metric_type, "gauge");
    }

    #[tokio::test]
    async fn test_remote_error_status() {
        let addr = spawn_stub().await;

        let err = client(&addr).label_names(0, 10).await.unwrap_err();
        assert_eq!(
            err,
            DistributorError::Remote {
                status: 503,
                message: "no healthy ingesters".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_bad_body_is_deserialization_error() {
        let addr = spawn_stub().await;

        let err = client(&addr)
            .metrics_for_label_matchers(0, 10, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DistributorError::Deserialization(_)));
    }

    #[tokio::test]
    async fn test_unreachable_is_network_error() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = client(&addr).label_names_stream(0, 10).await.unwrap_err();
        assert!(matches!(err, DistributorError::Network(_)));
    }
}
