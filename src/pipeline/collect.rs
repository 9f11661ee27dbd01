// src/pipeline/collect.rs

//! Collection pipeline.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{CollectSummary, Config};
use crate::pipeline::worker::{Accepted, Worker};
use crate::services::{Collector, FetchClient, StackExchangeClient};
use crate::storage::CorpusStore;
use crate::utils;

/// Run one collection sweep against the live API.
pub async fn run_collector(
    config: &Config,
    store: Arc<dyn CorpusStore>,
    cancel: CancellationToken,
) -> Result<CollectSummary> {
    let fetcher = Arc::new(StackExchangeClient::new(config.api.clone())?);
    run_collector_with(config, fetcher, store, cancel).await
}

/// Run one collection sweep with the given fetch client.
pub async fn run_collector_with(
    config: &Config,
    fetcher: Arc<dyn FetchClient>,
    store: Arc<dyn CorpusStore>,
    cancel: CancellationToken,
) -> Result<CollectSummary> {
    let start_time = Utc::now();
    utils::log::header("Stack Overflow collection");
    log::info!(
        "Source: {} (site={}, tagged={})",
        utils::get_domain(&config.api.base_url).unwrap_or_else(|| config.api.base_url.clone()),
        config.api.site,
        config.api.tagged
    );

    let collector = Collector::new(fetcher, store.clone(), config.collector.clone(), cancel);
    let stats = collector.run().await;
    store.flush().await?;

    let counts = store.counts().await?;
    let end_time = Utc::now();
    log::info!("Collection finished: {}", stats);
    utils::log::sub_item(&format!(
        "Corpus now holds {} questions, {} answers, {} tags, {} owners",
        counts.questions, counts.answers, counts.tags, counts.owners
    ));
    utils::log::sub_item(&format!(
        "Elapsed: {}s",
        (end_time - start_time).num_seconds()
    ));

    Ok(CollectSummary {
        start_time,
        end_time,
        stats,
    })
}

/// Submit a collection sweep to the worker and return at once.
///
/// The outcome is only logged.
pub fn submit_collection(worker: &Worker, config: Config, store: Arc<dyn CorpusStore>) -> Accepted {
    worker.submit("collect", move |cancel| async move {
        match run_collector(&config, store, cancel).await {
            Ok(summary) if summary.stats.interrupted => {
                log::warn!("Collection stopped early: {}", summary.stats)
            }
            Ok(_) => log::info!("Collection job completed"),
            Err(e) => log::error!("Collection job failed: {}", e),
        }
    })
}
