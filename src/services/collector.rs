// src/services/collector.rs

//! Ingestion pipeline.
//!
//! Sweeps a historical span window by window, tries every configured sort
//! strategy per window, and pages through the API for each pair:
//!
//! ```text
//! run
//! └── window 1..W          (window_days each, oldest first)
//!     └── strategy 1..S    (votes, creation, hot, week, month)
//!         └── page 1..P    (until empty, has_more = false, or max_pages)
//! ```
//!
//! Failures stay inside the pipeline: rate limits cool down and retry the
//! same page, other fetch errors back off and skip it. Only cancellation
//! ends a run early.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Months, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, FetchError, Result};
use crate::models::{CollectStats, CollectorConfig, QuestionDto, SortStrategy};
use crate::services::fetch::{FetchClient, PageQuery};
use crate::services::normalize::persist_question;
use crate::storage::CorpusStore;
use crate::utils;

/// State of one collection run: the dedup ledger and its counters.
#[derive(Debug, Default)]
pub struct CollectContext {
    seen: HashSet<i64>,
    stats: CollectStats,
}

impl CollectContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a question was already persisted in this run.
    pub fn has_seen(&self, question_id: i64) -> bool {
        self.seen.contains(&question_id)
    }

    pub fn unique_questions(&self) -> usize {
        self.seen.len()
    }

    pub fn stats(&self) -> &CollectStats {
        &self.stats
    }

    /// Close the run and hand out its counters.
    pub fn finish(mut self) -> CollectStats {
        self.stats.unique_questions = self.seen.len();
        self.stats
    }
}

/// Drives the fetch client over the window × strategy × page space.
pub struct Collector {
    fetcher: Arc<dyn FetchClient>,
    store: Arc<dyn CorpusStore>,
    config: CollectorConfig,
    cancel: CancellationToken,
}

impl Collector {
    pub fn new(
        fetcher: Arc<dyn FetchClient>,
        store: Arc<dyn CorpusStore>,
        config: CollectorConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            store,
            config,
            cancel,
        }
    }

    /// Sequential windows covering `history_years` up to `now`.
    pub fn windows(&self, now: DateTime<Utc>) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let years = self.config.history_years;
        let origin = now
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .or_else(|| {
                TimeDelta::try_days(365 * i64::from(years)).and_then(|d| now.checked_sub_signed(d))
            })
            .unwrap_or(now);
        let step = TimeDelta::days(i64::from(self.config.window_days.max(1)));

        let mut windows = Vec::new();
        let mut start = origin;
        while start < now {
            // Past the representable range the window simply ends at `now`.
            let end = start.checked_add_signed(step).map_or(now, |e| e.min(now));
            windows.push((start, end));
            start = end;
        }
        windows
    }

    /// Run the full sweep ending now.
    pub async fn run(&self) -> CollectStats {
        self.run_until(Utc::now()).await
    }

    /// Run the full sweep ending at `now`.
    ///
    /// Never fails: page and record failures are counted, cancellation
    /// stops the sweep and sets `interrupted`.
    pub async fn run_until(&self, now: DateTime<Utc>) -> CollectStats {
        let mut ctx = CollectContext::new();
        let windows = self.windows(now);
        let total = windows.len();

        utils::log::header(&format!(
            "Collecting {} windows × {} strategies",
            total,
            self.config.strategies.len()
        ));

        for (index, (start, end)) in windows.into_iter().enumerate() {
            utils::log::step(
                index + 1,
                total,
                &format!("{} .. {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d")),
            );

            let before = ctx.stats.new_records;
            let outcome = self.collect_window(&mut ctx, start, end).await;
            ctx.stats.windows += 1;
            self.flush().await;

            utils::log::sub_item(&format!(
                "window done: {} new, {} unique so far",
                ctx.stats.new_records - before,
                ctx.unique_questions()
            ));

            let interrupted = match outcome {
                Err(_) => true,
                Ok(()) if index + 1 < total => {
                    self.pause(self.config.window_pause()).await.is_err()
                }
                Ok(()) => false,
            };
            if interrupted {
                log::warn!("Collection interrupted after {} windows", ctx.stats.windows);
                ctx.stats.interrupted = true;
                break;
            }
        }

        let stats = ctx.finish();
        utils::log::separator();
        utils::log::summary(
            "Collection",
            &[
                ("Windows", stats.windows.to_string()),
                ("Pages", stats.pages_fetched.to_string()),
                ("New records", stats.new_records.to_string()),
                ("Duplicates", stats.duplicates_skipped.to_string()),
                ("Rate limited", stats.rate_limited.to_string()),
                ("Skipped pages", stats.pages_skipped.to_string()),
                ("Failed records", stats.record_failures.to_string()),
                ("Unique questions", stats.unique_questions.to_string()),
            ],
        );
        stats
    }

    async fn collect_window(
        &self,
        ctx: &mut CollectContext,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let strategies = &self.config.strategies;
        for (index, strategy) in strategies.iter().enumerate() {
            let before = ctx.stats.new_records;
            self.collect_strategy(ctx, start, end, *strategy, self.config.max_pages)
                .await?;
            ctx.stats.strategies_run += 1;
            log::info!(
                "Strategy '{}' done: {} new records",
                strategy,
                ctx.stats.new_records - before
            );

            if index + 1 < strategies.len() {
                self.pause(self.config.strategy_pause()).await?;
            }
        }
        Ok(())
    }

    /// Page through one (window, strategy) pair.
    ///
    /// `max_pages` is clamped to the configured ceiling. The only error is
    /// [`AppError::Interrupted`].
    pub async fn collect_strategy(
        &self,
        ctx: &mut CollectContext,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        strategy: SortStrategy,
        max_pages: u32,
    ) -> Result<()> {
        let max_pages = max_pages.min(self.config.max_pages);
        let mut page = 1;
        let mut rate_limit_retries = 0;

        while page <= max_pages {
            let query = PageQuery {
                page,
                from: window_start,
                to: window_end,
                sort: strategy,
            };

            if self.cancel.is_cancelled() {
                return Err(AppError::Interrupted);
            }
            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(AppError::Interrupted),
                fetched = self.fetcher.fetch(&query) => fetched,
            };

            match fetched {
                Ok(result) => {
                    ctx.stats.pages_fetched += 1;
                    rate_limit_retries = 0;

                    if result.items.is_empty() {
                        log::debug!("[{}] page {} is empty, strategy exhausted", strategy, page);
                        break;
                    }

                    let new = self.ingest_page(ctx, &result.items).await;
                    log::info!(
                        "[{}] page {}: {} fetched, {} new",
                        strategy,
                        page,
                        result.items.len(),
                        new
                    );
                    if let Some(quota) = result.quota_remaining {
                        log::debug!("Quota remaining: {}", quota);
                    }

                    self.pause(self.page_delay(result.backoff)).await?;
                    if !result.has_more {
                        break;
                    }
                    page += 1;
                }
                Err(FetchError::RateLimited { retry_after }) => {
                    ctx.stats.rate_limited += 1;
                    rate_limit_retries += 1;

                    if rate_limit_retries > self.config.max_rate_limit_retries {
                        log::warn!(
                            "[{}] page {} still rate limited after {} retries, skipping",
                            strategy,
                            page,
                            self.config.max_rate_limit_retries
                        );
                        ctx.stats.pages_skipped += 1;
                        rate_limit_retries = 0;
                        page += 1;
                        self.pause(self.config.error_backoff()).await?;
                        continue;
                    }

                    let cooldown = self.cooldown(retry_after);
                    log::warn!(
                        "[{}] rate limited on page {}, cooling down for {:?}",
                        strategy,
                        page,
                        cooldown
                    );
                    self.pause(cooldown).await?;
                }
                Err(FetchError::Transient(reason)) => {
                    ctx.stats.transient_failures += 1;
                    ctx.stats.pages_skipped += 1;
                    log::warn!("[{}] page {} failed: {}, skipping", strategy, page, reason);
                    rate_limit_retries = 0;
                    page += 1;
                    self.pause(self.config.error_backoff()).await?;
                }
            }
        }

        Ok(())
    }

    /// Persist unseen records of one page. Returns how many were new.
    async fn ingest_page(&self, ctx: &mut CollectContext, items: &[QuestionDto]) -> usize {
        let mut new = 0;
        for item in items {
            ctx.stats.records_seen += 1;
            if ctx.has_seen(item.question_id) {
                ctx.stats.duplicates_skipped += 1;
                continue;
            }

            match persist_question(self.store.as_ref(), item).await {
                Ok(()) => {
                    ctx.seen.insert(item.question_id);
                    ctx.stats.new_records += 1;
                    new += 1;
                }
                Err(e) => {
                    ctx.stats.record_failures += 1;
                    log::error!(
                        "Failed to persist question {} ({}): {}",
                        item.question_id,
                        utils::log::truncate(&item.title, 60),
                        e
                    );
                }
            }
        }
        new
    }

    /// Politeness delay after a page, stretched to the source's backoff.
    fn page_delay(&self, backoff: Option<Duration>) -> Duration {
        backoff.map_or(self.config.politeness_delay(), |b| {
            b.max(self.config.politeness_delay())
        })
    }

    fn cooldown(&self, retry_after: Option<Duration>) -> Duration {
        retry_after.map_or(self.config.rate_limit_cooldown(), |r| {
            r.max(self.config.rate_limit_cooldown())
        })
    }

    async fn flush(&self) {
        if let Err(e) = self.store.flush().await {
            log::error!("Failed to flush corpus: {}", e);
        }
    }

    /// Sleep unless cancelled first.
    async fn pause(&self, duration: Duration) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Interrupted);
        }
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Interrupted),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::services::fetch::Page;
    use crate::storage::MemoryStore;

    /// Replays canned responses; answers with empty pages once exhausted.
    struct ScriptedFetcher {
        script: Mutex<VecDeque<std::result::Result<Page, FetchError>>>,
        calls: Mutex<Vec<PageQuery>>,
        cancel_on_call: Option<CancellationToken>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<std::result::Result<Page, FetchError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
                cancel_on_call: None,
            }
        }

        fn pages_requested(&self) -> Vec<u32> {
            self.calls.lock().unwrap().iter().map(|q| q.page).collect()
        }
    }

    #[async_trait]
    impl FetchClient for ScriptedFetcher {
        async fn fetch(&self, query: &PageQuery) -> std::result::Result<Page, FetchError> {
            self.calls.lock().unwrap().push(*query);
            if let Some(token) = &self.cancel_on_call {
                token.cancel();
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Page::default()))
        }
    }

    fn dto(id: i64) -> QuestionDto {
        serde_json::from_value(serde_json::json!({
            "question_id": id,
            "title": format!("Question {id}"),
            "body": "<p>body</p>",
            "creation_date": 1704067200,
            "tags": ["java", "multithreading"],
        }))
        .unwrap()
    }

    fn page(ids: &[i64], has_more: bool) -> std::result::Result<Page, FetchError> {
        Ok(Page {
            items: ids.iter().map(|id| dto(*id)).collect(),
            has_more,
            ..Page::default()
        })
    }

    fn config() -> CollectorConfig {
        CollectorConfig {
            strategies: vec![SortStrategy::Votes, SortStrategy::Creation],
            ..CollectorConfig::default().without_delays()
        }
    }

    fn collector(
        fetcher: Arc<ScriptedFetcher>,
        store: Arc<MemoryStore>,
        config: CollectorConfig,
    ) -> Collector {
        Collector::new(fetcher, store, config, CancellationToken::new())
    }

    fn jan() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_dedup_across_strategies() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            page(&[1, 2], false),
            page(&[2, 3], false),
        ]));
        let store = Arc::new(MemoryStore::new());
        let collector = collector(fetcher.clone(), store.clone(), config());
        let (start, end) = jan();

        let mut ctx = CollectContext::new();
        collector
            .collect_strategy(&mut ctx, start, end, SortStrategy::Votes, 25)
            .await
            .unwrap();
        collector
            .collect_strategy(&mut ctx, start, end, SortStrategy::Hot, 25)
            .await
            .unwrap();

        assert_eq!(ctx.stats().new_records, 3);
        assert_eq!(ctx.stats().duplicates_skipped, 1);
        assert_eq!(ctx.unique_questions(), 3);
        assert_eq!(store.counts().await.unwrap().questions, 3);
        assert_eq!(store.counts().await.unwrap().tags, 2);
    }

    #[tokio::test]
    async fn test_rate_limit_retries_same_page() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            Err(FetchError::RateLimited { retry_after: None }),
            page(&[1], true),
            page(&[], true),
        ]));
        let store = Arc::new(MemoryStore::new());
        let collector = collector(fetcher.clone(), store, config());
        let (start, end) = jan();

        let mut ctx = CollectContext::new();
        collector
            .collect_strategy(&mut ctx, start, end, SortStrategy::Votes, 25)
            .await
            .unwrap();

        assert_eq!(fetcher.pages_requested(), vec![1, 1, 2]);
        assert_eq!(ctx.stats().rate_limited, 1);
        assert_eq!(ctx.stats().pages_skipped, 0);
        assert_eq!(ctx.stats().new_records, 1);
    }

    #[tokio::test]
    async fn test_rate_limit_retries_are_bounded() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            Err(FetchError::RateLimited { retry_after: None }),
            Err(FetchError::RateLimited { retry_after: None }),
            page(&[1], false),
        ]));
        let store = Arc::new(MemoryStore::new());
        let config = CollectorConfig {
            max_rate_limit_retries: 1,
            ..config()
        };
        let collector = collector(fetcher.clone(), store, config);
        let (start, end) = jan();

        let mut ctx = CollectContext::new();
        collector
            .collect_strategy(&mut ctx, start, end, SortStrategy::Votes, 25)
            .await
            .unwrap();

        assert_eq!(fetcher.pages_requested(), vec![1, 1, 2]);
        assert_eq!(ctx.stats().rate_limited, 2);
        assert_eq!(ctx.stats().pages_skipped, 1);
        assert_eq!(ctx.stats().new_records, 1);
    }

    #[tokio::test]
    async fn test_retry_budget_is_per_page() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            Err(FetchError::RateLimited { retry_after: None }),
            Err(FetchError::transient("bad gateway")),
            Err(FetchError::RateLimited { retry_after: None }),
            page(&[2], false),
        ]));
        let store = Arc::new(MemoryStore::new());
        let config = CollectorConfig {
            max_rate_limit_retries: 1,
            ..config()
        };
        let collector = collector(fetcher.clone(), store, config);
        let (start, end) = jan();

        let mut ctx = CollectContext::new();
        collector
            .collect_strategy(&mut ctx, start, end, SortStrategy::Votes, 25)
            .await
            .unwrap();

        // Page 2 gets its own retry after page 1 failed
        assert_eq!(fetcher.pages_requested(), vec![1, 1, 2, 2]);
        assert_eq!(ctx.stats().pages_skipped, 1);
        assert_eq!(ctx.stats().new_records, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_skips_page() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            Err(FetchError::transient("connection reset")),
            page(&[5], false),
        ]));
        let store = Arc::new(MemoryStore::new());
        let collector = collector(fetcher.clone(), store.clone(), config());
        let (start, end) = jan();

        let mut ctx = CollectContext::new();
        collector
            .collect_strategy(&mut ctx, start, end, SortStrategy::Votes, 25)
            .await
            .unwrap();

        assert_eq!(fetcher.pages_requested(), vec![1, 2]);
        assert_eq!(ctx.stats().transient_failures, 1);
        assert!(store.contains_question(5).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_page_stops_strategy() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![page(&[], true), page(&[1], true)]));
        let store = Arc::new(MemoryStore::new());
        let collector = collector(fetcher.clone(), store, config());
        let (start, end) = jan();

        let mut ctx = CollectContext::new();
        collector
            .collect_strategy(&mut ctx, start, end, SortStrategy::Votes, 25)
            .await
            .unwrap();

        assert_eq!(fetcher.pages_requested(), vec![1]);
        assert_eq!(ctx.stats().new_records, 0);
    }

    #[tokio::test]
    async fn test_max_pages_is_clamped_to_ceiling() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            page(&[1], true),
            page(&[2], true),
            page(&[3], true),
        ]));
        let store = Arc::new(MemoryStore::new());
        let config = CollectorConfig {
            max_pages: 2,
            ..config()
        };
        let collector = collector(fetcher.clone(), store, config);
        let (start, end) = jan();

        let mut ctx = CollectContext::new();
        collector
            .collect_strategy(&mut ctx, start, end, SortStrategy::Votes, 10)
            .await
            .unwrap();

        assert_eq!(fetcher.pages_requested(), vec![1, 2]);
    }

    #[test]
    fn test_windows_cover_history() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));
        let config = CollectorConfig {
            history_years: 1,
            window_days: 30,
            ..config()
        };
        let collector = collector(fetcher, Arc::new(MemoryStore::new()), config);
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let windows = collector.windows(now);
        assert_eq!(windows.len(), 13);
        assert_eq!(windows[0].0, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(windows[12].1, now);
        assert!(windows.windows(2).all(|w| w[0].1 == w[1].0));
    }

    #[test]
    fn test_oversized_window_ends_at_now() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));
        let config = CollectorConfig {
            history_years: 1,
            window_days: u32::MAX,
            ..config()
        };
        let collector = collector(fetcher, Arc::new(MemoryStore::new()), config);
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let windows = collector.windows(now);
        assert_eq!(
            windows,
            vec![(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), now)]
        );
    }

    #[test]
    fn test_page_delay_honors_backoff() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));
        let collector = collector(
            fetcher,
            Arc::new(MemoryStore::new()),
            CollectorConfig::default(),
        );

        assert_eq!(collector.page_delay(None), Duration::from_secs(2));
        assert_eq!(
            collector.page_delay(Some(Duration::from_secs(10))),
            Duration::from_secs(10)
        );
        assert_eq!(
            collector.cooldown(Some(Duration::from_secs(1))),
            Duration::from_secs(60)
        );
    }

    #[tokio::test]
    async fn test_run_visits_every_strategy() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            page(&[1], false),
            page(&[1, 2], false),
        ]));
        let store = Arc::new(MemoryStore::new());
        let config = CollectorConfig {
            history_years: 1,
            window_days: 400,
            ..config()
        };
        let collector = collector(fetcher.clone(), store.clone(), config);

        let stats = collector
            .run_until(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
            .await;

        assert_eq!(stats.windows, 1);
        assert_eq!(stats.strategies_run, 2);
        assert_eq!(stats.new_records, 2);
        assert_eq!(stats.duplicates_skipped, 1);
        assert_eq!(stats.unique_questions, 2);
        assert!(!stats.interrupted);
    }

    #[tokio::test]
    async fn test_cancel_during_pause_stops_run() {
        let token = CancellationToken::new();
        let fetcher = Arc::new(ScriptedFetcher {
            cancel_on_call: Some(token.clone()),
            ..ScriptedFetcher::new(vec![page(&[1, 2], true), page(&[3], true)])
        });
        let store = Arc::new(MemoryStore::new());
        let config = CollectorConfig {
            politeness_delay_ms: 3_600_000,
            history_years: 1,
            ..config()
        };
        let collector = Collector::new(fetcher.clone(), store.clone(), config, token);

        let stats = collector
            .run_until(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
            .await;

        assert!(stats.interrupted);
        assert_eq!(fetcher.pages_requested(), vec![1]);
        assert_eq!(stats.new_records, 2);
        assert_eq!(stats.windows, 1);
        assert_eq!(store.counts().await.unwrap().questions, 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_fetches_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let fetcher = Arc::new(ScriptedFetcher::new(vec![page(&[1], false)]));
        let collector = Collector::new(
            fetcher.clone(),
            Arc::new(MemoryStore::new()),
            config(),
            token,
        );

        let stats = collector
            .run_until(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
            .await;

        assert!(stats.interrupted);
        assert!(fetcher.pages_requested().is_empty());
    }
}
