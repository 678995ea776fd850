//! distq: read-path querier over a replicated ingestion tier
//!
//! Turns label-matcher, time-bounded queries into calls against the
//! ingestion tier's read interface and merges what comes back into one
//! label-sorted series view for a query engine to consume.
//!
//! # Features
//!
//! - **Time-window elision**: queries ending before the ingestion window skip the round trip
//! - **Streaming merge**: raw samples and encoded chunks merged into one sorted view
//! - **Lazy chunk decoding**: samples are decoded as the consumer pulls them
//! - **Metadata-only selects**: series lookups answered from label sets alone
//! - **Label metadata**: label names and values, with matcher support
//! - **Exemplars**: batched exemplar queries reshaped per series
//!
//! # Example
//!
//! ```no_run
//! use distq::{DistributorQueryable, HttpDistributor, Matcher, QuerierConfig, QueryContext, Queryable};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let distributor = Arc::new(HttpDistributor::new("127.0.0.1:9095", Duration::from_secs(30))?);
//! let queryable = DistributorQueryable::new(distributor, &QuerierConfig::from_env()?);
//!
//! let querier = queryable.querier(QueryContext::background(), 0, 60_000);
//! let series = distq::collect_series(
//!     querier.select(true, None, &[Matcher::equal("__name__", "up")]).await,
//! )?;
//! println!("Series: {}", series.len());
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod clock;
pub mod config;
pub mod context;
pub mod distributor;
pub mod model;
pub mod querier;
pub mod series;

// Re-export commonly used types
pub use config::{ConfigError, QuerierConfig};
pub use context::{CancelHandle, QueryContext};
pub use distributor::client::HttpDistributor;
pub use distributor::{Distributor, DistributorError};
pub use model::{Label, Labels, Matcher, Sample};
pub use querier::{
    DistributorExemplarQueryable, DistributorQueryable, ExemplarQuerier, ExemplarQueryable,
    Querier, QueryError, Queryable, QueryableWithFilter, SelectHints,
};
pub use series::{collect_series, Series, SeriesSet};
