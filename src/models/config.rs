//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SortStrategy;

/// Longest history a sweep may cover.
pub const MAX_HISTORY_YEARS: u32 = 100;
/// Widest single collection window.
pub const MAX_WINDOW_DAYS: u32 = 3650;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Q&A API request settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Ingestion sweep and pacing
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Analytics parameters
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Corpus persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Resolve the corpus file against the storage directory.
    pub fn corpus_path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(&self.storage.corpus_file)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(AppError::config("api.base_url is empty"));
        }
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::config("api.user_agent is empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::config("api.timeout_secs must be > 0"));
        }
        if !(1..=100).contains(&self.api.page_size) {
            return Err(AppError::config("api.page_size must be within 1..=100"));
        }
        if !(1..=MAX_HISTORY_YEARS).contains(&self.collector.history_years) {
            return Err(AppError::config(format!(
                "collector.history_years must be within 1..={MAX_HISTORY_YEARS}"
            )));
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.collector.window_days) {
            return Err(AppError::config(format!(
                "collector.window_days must be within 1..={MAX_WINDOW_DAYS}"
            )));
        }
        if self.collector.strategies.is_empty() {
            return Err(AppError::config("No sort strategies defined"));
        }
        if self.collector.max_pages == 0 {
            return Err(AppError::config("collector.max_pages must be > 0"));
        }
        if self.analysis.lexical_tags.is_empty() {
            return Err(AppError::config("analysis.lexical_tags is empty"));
        }
        if self.analysis.lexical_limit == 0 {
            return Err(AppError::config("analysis.lexical_limit must be > 0"));
        }
        if self.analysis.trend_top_tags == 0 {
            return Err(AppError::config("analysis.trend_top_tags must be > 0"));
        }
        if self.storage.corpus_file.trim().is_empty() {
            return Err(AppError::config("storage.corpus_file is empty"));
        }
        Ok(())
    }
}

/// Q&A API request settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Questions endpoint
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Stack Exchange site name
    #[serde(default = "defaults::site")]
    pub site: String,

    /// Tag every fetched question must carry
    #[serde(default = "defaults::tagged")]
    pub tagged: String,

    /// Response filter (must include body and answers)
    #[serde(default = "defaults::filter")]
    pub filter: String,

    /// Items per page
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Optional application key for a larger quota
    #[serde(default)]
    pub key: Option<String>,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            site: defaults::site(),
            tagged: defaults::tagged(),
            filter: defaults::filter(),
            page_size: defaults::page_size(),
            key: None,
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Ingestion sweep and pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// How far back the sweep starts
    #[serde(default = "defaults::history_years")]
    pub history_years: u32,

    /// Length of one time window
    #[serde(default = "defaults::window_days")]
    pub window_days: u32,

    /// Ranking strategies tried for every window, in order
    #[serde(default = "defaults::strategies")]
    pub strategies: Vec<SortStrategy>,

    /// Page ceiling per (window, strategy)
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,

    /// Delay after every page request
    #[serde(default = "defaults::politeness_delay")]
    pub politeness_delay_ms: u64,

    /// Pause after a rate-limit signal before retrying the page
    #[serde(default = "defaults::rate_limit_cooldown")]
    pub rate_limit_cooldown_secs: u64,

    /// Retries of one page before it is skipped
    #[serde(default = "defaults::max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,

    /// Pause after a transient failure before the next page
    #[serde(default = "defaults::error_backoff")]
    pub error_backoff_secs: u64,

    /// Pause between strategies
    #[serde(default = "defaults::strategy_pause")]
    pub strategy_pause_ms: u64,

    /// Pause between windows
    #[serde(default = "defaults::window_pause")]
    pub window_pause_ms: u64,
}

impl CollectorConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn strategy_pause(&self) -> Duration {
        Duration::from_millis(self.strategy_pause_ms)
    }

    pub fn window_pause(&self) -> Duration {
        Duration::from_millis(self.window_pause_ms)
    }

    /// Configuration with every pause set to zero.
    pub fn without_delays(mut self) -> Self {
        self.politeness_delay_ms = 0;
        self.rate_limit_cooldown_secs = 0;
        self.error_backoff_secs = 0;
        self.strategy_pause_ms = 0;
        self.window_pause_ms = 0;
        self
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            history_years: defaults::history_years(),
            window_days: defaults::window_days(),
            strategies: defaults::strategies(),
            max_pages: defaults::max_pages(),
            politeness_delay_ms: defaults::politeness_delay(),
            rate_limit_cooldown_secs: defaults::rate_limit_cooldown(),
            max_rate_limit_retries: defaults::max_rate_limit_retries(),
            error_backoff_secs: defaults::error_backoff(),
            strategy_pause_ms: defaults::strategy_pause(),
            window_pause_ms: defaults::window_pause(),
        }
    }
}

/// Analytics parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Tags selecting the lexical frequency subset
    #[serde(default = "defaults::lexical_tags")]
    pub lexical_tags: Vec<String>,

    /// Terms reported by the lexical frequency analysis
    #[serde(default = "defaults::lexical_limit")]
    pub lexical_limit: usize,

    /// Size of the per-month top tag set used for trendiness
    #[serde(default = "defaults::trend_top_tags")]
    pub trend_top_tags: usize,

    /// Shared top tags needed for a question to count as trendy
    #[serde(default = "defaults::min_shared_top_tags")]
    pub min_shared_top_tags: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            lexical_tags: defaults::lexical_tags(),
            lexical_limit: defaults::lexical_limit(),
            trend_top_tags: defaults::trend_top_tags(),
            min_shared_top_tags: defaults::min_shared_top_tags(),
        }
    }
}

/// Corpus persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Snapshot file name, relative to the storage directory
    #[serde(default = "defaults::corpus_file")]
    pub corpus_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            corpus_file: defaults::corpus_file(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use crate::models::SortStrategy;

    // API defaults
    pub fn base_url() -> String {
        "https://api.stackexchange.com/2.3/questions".into()
    }
    pub fn site() -> String {
        "stackoverflow".into()
    }
    pub fn tagged() -> String {
        "java".into()
    }
    pub fn filter() -> String {
        "!aksql6NjneanAa".into()
    }
    pub fn page_size() -> u32 {
        50
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; stackflow/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Collector defaults
    pub fn history_years() -> u32 {
        15
    }
    pub fn window_days() -> u32 {
        30
    }
    pub fn strategies() -> Vec<SortStrategy> {
        SortStrategy::ALL.to_vec()
    }
    pub fn max_pages() -> u32 {
        25
    }
    pub fn politeness_delay() -> u64 {
        2000
    }
    pub fn rate_limit_cooldown() -> u64 {
        60
    }
    pub fn max_rate_limit_retries() -> u32 {
        5
    }
    pub fn error_backoff() -> u64 {
        5
    }
    pub fn strategy_pause() -> u64 {
        1000
    }
    pub fn window_pause() -> u64 {
        3000
    }

    // Analysis defaults
    pub fn lexical_tags() -> Vec<String> {
        vec!["multithreading".into()]
    }
    pub fn lexical_limit() -> usize {
        50
    }
    pub fn trend_top_tags() -> usize {
        10
    }
    pub fn min_shared_top_tags() -> usize {
        2
    }

    // Storage defaults
    pub fn corpus_file() -> String {
        "corpus.json".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
