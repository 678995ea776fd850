//! distq command line
//!
//! Run with: cargo run -- <command> [args]
//!
//! Commands:
//! - select <matcher>...         series and samples matching all matchers
//! - series <matcher>...         label sets only
//! - labels [<matcher>...]       label names
//! - values <name>... [-- <matcher>...]  label values, one lookup per name
//! - exemplars <matcher>...      exemplars; each matcher is its own alternative
//!
//! Matchers are written `name=value`, `name!=value`, `name=~regex` or `name!~regex`.
//!
//! Environment variables:
//! - DISTQ_DISTRIBUTOR_ADDR: Ingestion tier read address (default: 127.0.0.1:9095)
//! - DISTQ_TIMEOUT_SECS: Per-request timeout (default: 30)
//! - DISTQ_RANGE_SECS: Query range ending now (default: 3600)
//! - DISTQ_QUERY_INGESTERS_WITHIN_SECS, DISTQ_INGESTER_STREAMING,
//!   DISTQ_INGESTER_METADATA_STREAMING, DISTQ_CHUNK_ITERATOR: querier settings
//! - RUST_LOG: Log level (default: info)

use distq::model::Matcher;
use distq::{
    collect_series, DistributorExemplarQueryable, DistributorQueryable, ExemplarQueryable,
    HttpDistributor, QuerierConfig, Queryable, QueryContext, SelectHints,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: distq <select|series|labels|values|exemplars> [args]";

fn parse_matchers(args: &[String]) -> Result<Vec<Matcher>, Box<dyn std::error::Error>> {
    Ok(args
        .iter()
        .map(|a| a.parse::<Matcher>())
        .collect::<Result<Vec<_>, _>>()?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "distq=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let addr = std::env::var("DISTQ_DISTRIBUTOR_ADDR").unwrap_or_else(|_| "127.0.0.1:9095".to_string());
    let timeout = std::env::var("DISTQ_TIMEOUT_SECS")
        .ok()
        .and_then(|t| t.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(30));
    let range_ms = std::env::var("DISTQ_RANGE_SECS")
        .ok()
        .and_then(|r| r.parse::<i64>().ok())
        .unwrap_or(3600)
        * 1000;
    let config = QuerierConfig::from_env()?;

    tracing::info!("distq configuration:");
    tracing::info!("  Distributor: {}", addr);
    tracing::info!("  Timeout: {:?}", timeout);
    tracing::info!("  Query ingesters within: {:?}", config.query_ingesters_within);
    tracing::info!("  Streaming: {}", config.ingester_streaming);
    tracing::info!("  Metadata streaming: {}", config.ingester_metadata_streaming);

    let distributor = Arc::new(HttpDistributor::new(&addr, timeout)?);
    let maxt = chrono::Utc::now().timestamp_millis();
    let mint = maxt - range_ms;

    let (ctx, cancel) = QueryContext::cancelable();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, canceling query");
            cancel.cancel();
        }
    });

    match command.as_str() {
        "select" | "series" => {
            let matchers = parse_matchers(rest)?;
            let mut hints = SelectHints::new(mint, maxt);
            if command == "series" {
                hints = hints.with_func("series");
            }

            let queryable = DistributorQueryable::new(distributor, &config);
            let querier = queryable.querier(ctx, mint, maxt);
            let series = collect_series(querier.select(true, Some(&hints), &matchers).await)?;
            querier.close()?;

            for s in &series {
                if command == "series" {
                    println!("{}", s.labels());
                    continue;
                }

                let samples = s.collect_samples()?;
                println!("{} => {} samples", s.labels(), samples.len());
                for sample in samples {
                    println!("  {} {}", sample.timestamp_ms, sample.value);
                }
            }
        }
        "labels" => {
            let matchers = parse_matchers(rest)?;
            let queryable = DistributorQueryable::new(distributor, &config);
            let querier = queryable.querier(ctx, mint, maxt);
            let (names, _) = querier.label_names(&matchers).await?;
            for name in names {
                println!("{}", name);
            }
        }
        "values" => {
            let split = rest.iter().position(|a| a == "--").unwrap_or(rest.len());
            let names = &rest[..split];
            let matchers = parse_matchers(rest.get(split + 1..).unwrap_or_default())?;

            let queryable = DistributorQueryable::new(distributor, &config);
            let querier = queryable.querier(ctx, mint, maxt);
            let lookups = names.iter().map(|n| querier.label_values(n, &matchers));
            let results = futures::future::join_all(lookups).await;

            for (name, result) in names.iter().zip(results) {
                let (values, _) = result?;
                println!("{}: {}", name, values.join(", "));
            }
        }
        "exemplars" => {
            let matcher_sets: Vec<Vec<Matcher>> =
                parse_matchers(rest)?.into_iter().map(|m| vec![m]).collect();
            let querier = DistributorExemplarQueryable::new(distributor).exemplar_querier(ctx);
            let results = querier.select(mint, maxt, &matcher_sets).await?;

            for result in results {
                println!("{}", result.series_labels);
                for e in result.exemplars {
                    println!("  {} {} {}", e.timestamp_ms, e.value, e.labels);
                }
            }
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}
