//! Pipeline entry points composed by the CLI.
//!
//! - `run_collector`: Sweep the API into the corpus
//! - `submit_collection`: Start a sweep in the background
//! - `run_analysis`: Answer one analytics query
//! - `run_validate` / `run_info`: Inspect configuration and corpus

pub mod analyze;
pub mod collect;
pub mod validate;
pub mod worker;

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::models::Config;
use crate::storage::LocalStorage;

pub use analyze::{AnalysisRequest, run_analysis};
pub use collect::{run_collector, run_collector_with, submit_collection};
pub use validate::{run_info, run_validate};
pub use worker::{Accepted, Worker};

/// Open the corpus file configured for a storage directory.
pub async fn open_store(config: &Config, storage_dir: &Path) -> Result<Arc<LocalStorage>> {
    let path = config.corpus_path(storage_dir);
    let store = LocalStorage::open(&path).await?;
    log::debug!("Corpus file: {}", store.path().display());
    Ok(Arc::new(store))
}
