// src/models/mod.rs

//! Domain models for the collector and analytics engine.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod api;
mod config;
mod corpus;
mod report;

// Re-export all public types
pub use api::{AnswerDto, ApiErrorBody, ApiResponse, OwnerDto, QuestionDto, SortStrategy};
pub use config::{
    AnalysisConfig, ApiConfig, CollectorConfig, Config, LoggingConfig, MAX_HISTORY_YEARS,
    MAX_WINDOW_DAYS, StorageConfig,
};
pub use corpus::{
    AnswerRecord, AnswerView, CorpusCounts, NewOwner, Owner, OwnerId, OwnerKey, QuestionRecord,
    QuestionView, Tag, TagId,
};
pub use report::{
    CollectStats, CollectSummary, MetricValue, RankedCount, SolvabilityReport, TrendSeries,
    format_pair,
};
