// src/pipeline/validate.rs

//! Configuration and corpus inspection.

use std::path::Path;

use crate::config::load_all;
use crate::error::Result;
use crate::models::{Config, CorpusCounts};
use crate::storage::CorpusStore;
use crate::utils;

/// Validate the configuration of a storage directory.
pub fn run_validate(storage_dir: &Path) -> Result<Config> {
    utils::log::header("Validating configuration");

    match load_all(storage_dir) {
        Ok(config) => {
            log::info!("Configuration is valid");
            utils::log::sub_item(&format!("Endpoint: {}", config.api.base_url));
            utils::log::sub_item(&format!(
                "Site: {}, tagged: {}, page size: {}",
                config.api.site, config.api.tagged, config.api.page_size
            ));
            utils::log::sub_item(&format!(
                "Sweep: {} years in {}-day windows, {} strategies, {} pages max",
                config.collector.history_years,
                config.collector.window_days,
                config.collector.strategies.len(),
                config.collector.max_pages
            ));
            utils::log::sub_item(&format!(
                "API key: {}",
                if config.api.key.is_some() { "set" } else { "not set" }
            ));
            utils::log::sub_item(&format!(
                "Corpus: {}",
                config.corpus_path(storage_dir).display()
            ));
            Ok(config)
        }
        Err(e) => {
            log::error!("Configuration is invalid: {}", e);
            Err(e)
        }
    }
}

/// Log entity totals of the corpus.
pub async fn run_info(store: &dyn CorpusStore) -> Result<CorpusCounts> {
    let counts = store.counts().await?;
    utils::log::summary(
        "Corpus",
        &[
            ("Questions", counts.questions.to_string()),
            ("Answers", counts.answers.to_string()),
            ("Tags", counts.tags.to_string()),
            ("Owners", counts.owners.to_string()),
        ],
    );
    Ok(counts)
}
