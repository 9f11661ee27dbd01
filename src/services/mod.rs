//! Service layer for the collector application.
//!
//! This module contains the business logic for:
//! - Page fetching (`FetchClient`, `StackExchangeClient`)
//! - Record normalization onto the corpus (`persist_question`)
//! - The ingestion sweep (`Collector`)

pub mod collector;
pub mod fetch;
pub mod normalize;

pub use collector::{CollectContext, Collector};
pub use fetch::{FetchClient, Page, PageQuery, StackExchangeClient, classify_response};
pub use normalize::{owner_from_dto, persist_question};
