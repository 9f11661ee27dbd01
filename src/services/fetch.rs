// src/services/fetch.rs

//! Page fetching against the Stack Exchange questions endpoint.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use url::Url;

use crate::error::{FetchError, Result};
use crate::models::{ApiConfig, ApiErrorBody, ApiResponse, QuestionDto, SortStrategy};
use crate::utils::build_query_url;
use crate::utils::http::{create_async_client, fetch_text};

/// One page request inside a time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    /// 1-based page number
    pub page: u32,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub sort: SortStrategy,
}

/// Decoded page of questions.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<QuestionDto>,
    pub has_more: bool,
    pub quota_remaining: Option<i64>,
    /// Source-requested pause before the next request
    pub backoff: Option<Duration>,
}

/// Source of question pages.
#[async_trait]
pub trait FetchClient: Send + Sync {
    async fn fetch(&self, query: &PageQuery) -> std::result::Result<Page, FetchError>;
}

/// HTTP client for `/questions`.
pub struct StackExchangeClient {
    config: ApiConfig,
    client: Client,
}

impl StackExchangeClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = create_async_client(&config)?;
        Ok(Self { config, client })
    }

    /// Request URL for a page query.
    pub fn build_url(&self, query: &PageQuery) -> Result<Url> {
        build_query_url(
            &self.config.base_url,
            [
                ("page", Some(query.page.to_string())),
                ("pagesize", Some(self.config.page_size.to_string())),
                ("fromdate", Some(query.from.timestamp().to_string())),
                ("todate", Some(query.to.timestamp().to_string())),
                ("order", Some("desc".to_string())),
                ("sort", Some(query.sort.as_str().to_string())),
                ("tagged", Some(self.config.tagged.clone())),
                ("site", Some(self.config.site.clone())),
                ("filter", Some(self.config.filter.clone())),
                ("key", self.config.key.clone()),
            ],
        )
    }
}

#[async_trait]
impl FetchClient for StackExchangeClient {
    async fn fetch(&self, query: &PageQuery) -> std::result::Result<Page, FetchError> {
        let url = self.build_url(query).map_err(FetchError::transient)?;
        log::debug!("GET {}", url);

        let (status, body) = fetch_text(&self.client, url.as_str())
            .await
            .map_err(FetchError::transient)?;
        classify_response(status, &body)
    }
}

fn throttle_wait_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"available in (\d+) seconds").ok())
        .as_ref()
}

/// Map a raw HTTP exchange to a page or a fetch error.
///
/// HTTP 429 and the API's `throttle_violation` error are rate limits; every
/// other failure (status, envelope, decoding) is transient.
pub fn classify_response(status: u16, body: &str) -> std::result::Result<Page, FetchError> {
    if status == 429 {
        return Err(FetchError::RateLimited { retry_after: None });
    }

    if !(200..300).contains(&status) {
        return Err(match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(err) if err.is_throttle() => FetchError::RateLimited {
                retry_after: throttle_wait_pattern()
                    .and_then(|p| p.captures(&err.error_message))
                    .and_then(|c| c[1].parse::<u64>().ok())
                    .map(Duration::from_secs),
            },
            Ok(err) => FetchError::Transient(format!(
                "HTTP {status}: {} ({})",
                err.error_name, err.error_message
            )),
            Err(_) => FetchError::Transient(format!("HTTP {status}")),
        });
    }

    let response: ApiResponse<QuestionDto> = serde_json::from_str(body)?;
    Ok(Page {
        items: response.items,
        has_more: response.has_more,
        quota_remaining: response.quota_remaining,
        backoff: response.backoff.map(Duration::from_secs),
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn query() -> PageQuery {
        PageQuery {
            page: 3,
            from: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
            sort: SortStrategy::Hot,
        }
    }

    #[test]
    fn test_build_url() {
        let client = StackExchangeClient::new(ApiConfig::default()).unwrap();
        let url = client.build_url(&query()).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("api.stackexchange.com"));
        assert!(pairs.contains(&("page".into(), "3".into())));
        assert!(pairs.contains(&("pagesize".into(), "50".into())));
        assert!(pairs.contains(&("fromdate".into(), "1704067200".into())));
        assert!(pairs.contains(&("sort".into(), "hot".into())));
        assert!(pairs.contains(&("tagged".into(), "java".into())));
        assert!(pairs.contains(&("filter".into(), "!aksql6NjneanAa".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "key"));
    }

    #[test]
    fn test_build_url_with_key() {
        let config = ApiConfig {
            key: Some("abc".into()),
            ..ApiConfig::default()
        };
        let client = StackExchangeClient::new(config).unwrap();
        let url = client.build_url(&query()).unwrap();
        assert!(url.query_pairs().any(|(k, v)| k == "key" && v == "abc"));
    }

    #[test]
    fn test_classify_success() {
        let page = classify_response(
            200,
            r#"{"items": [], "has_more": false, "quota_remaining": 10, "backoff": 5}"#,
        )
        .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.quota_remaining, Some(10));
        assert_eq!(page.backoff, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_classify_http_429() {
        assert_eq!(
            classify_response(429, "").unwrap_err(),
            FetchError::RateLimited { retry_after: None }
        );
    }

    #[test]
    fn test_classify_throttle_violation() {
        let body = r#"{"error_id": 502, "error_name": "throttle_violation", "error_message": "too many requests from this IP, more requests available in 120 seconds"}"#;
        assert_eq!(
            classify_response(400, body).unwrap_err(),
            FetchError::RateLimited {
                retry_after: Some(Duration::from_secs(120))
            }
        );
    }

    #[test]
    fn test_classify_other_errors_are_transient() {
        let body = r#"{"error_id": 400, "error_name": "bad_parameter", "error_message": "sort"}"#;
        assert!(matches!(
            classify_response(400, body),
            Err(FetchError::Transient(_))
        ));
        assert!(matches!(
            classify_response(503, "<html>down</html>"),
            Err(FetchError::Transient(_))
        ));
        assert!(matches!(
            classify_response(200, "{truncated"),
            Err(FetchError::Transient(_))
        ));
    }
}
