pub mod labels;
pub mod matcher;
pub mod sample;

pub use labels::{Label, Labels, Metric, MetricMetadata, METRIC_NAME};
pub use matcher::{matches_all, MatchType, Matcher, MatcherError};
pub use sample::{Exemplar, ExemplarResult, Sample, TimeRange};
