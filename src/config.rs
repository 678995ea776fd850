use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::chunk::ChunkIteratorKind;

/// Read-path querier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerierConfig {
    /// Only consult the ingestion tier for queries whose end falls within
    /// this window of now. Zero disables the check.
    pub query_ingesters_within: Duration,
    /// Use the streaming sample read instead of the matrix read
    pub ingester_streaming: bool,
    /// Use the streaming variants of the metadata reads
    pub ingester_metadata_streaming: bool,
    /// Strategy for decoding chunk series
    pub chunk_iterator: ChunkIteratorKind,
}

impl Default for QuerierConfig {
    fn default() -> Self {
        Self {
            query_ingesters_within: Duration::ZERO,
            ingester_streaming: true,
            ingester_metadata_streaming: false,
            chunk_iterator: ChunkIteratorKind::default(),
        }
    }
}

impl QuerierConfig {
    /// Load the config from environment variables, falling back to defaults
    /// DISTQ_QUERY_INGESTERS_WITHIN_SECS=3600
    /// DISTQ_INGESTER_STREAMING=true
    /// DISTQ_INGESTER_METADATA_STREAMING=false
    /// DISTQ_CHUNK_ITERATOR=merging
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("DISTQ_QUERY_INGESTERS_WITHIN_SECS") {
            let secs: u64 = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("DISTQ_QUERY_INGESTERS_WITHIN_SECS", &v))?;
            config.query_ingesters_within = Duration::from_secs(secs);
        }
        if let Some(v) = lookup("DISTQ_INGESTER_STREAMING") {
            config.ingester_streaming = parse_bool("DISTQ_INGESTER_STREAMING", &v)?;
        }
        if let Some(v) = lookup("DISTQ_INGESTER_METADATA_STREAMING") {
            config.ingester_metadata_streaming =
                parse_bool("DISTQ_INGESTER_METADATA_STREAMING", &v)?;
        }
        if let Some(v) = lookup("DISTQ_CHUNK_ITERATOR") {
            config.chunk_iterator = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("DISTQ_CHUNK_ITERATOR", &v))?;
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::invalid(key, value)),
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

impl ConfigError {
    fn invalid(key: &str, value: &str) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}
