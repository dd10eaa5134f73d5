//! Harvest orchestrator
//!
//! Drives the whole run: authenticate the pool, walk browse pages one at a
//! time, enrich and persist each new record as soon as it is extracted, and
//! fan each page's asset downloads out concurrently. Page-level failures
//! are contained and counted; a run of consecutive failures trips the
//! breaker and aborts the harvest.

use crate::config::Config;
use crate::crawler::downloader::FetchPipeline;
use crate::crawler::pool::SessionPool;
use crate::crawler::rate::RateController;
use crate::crawler::StopSignal;
use crate::output::HarvestStats;
use crate::source::{GallerySource, LoginManager, PageSource, SessionSlot};
use crate::storage::{Record, RecordStore};
use crate::{HarvestError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Pause after a failed page before trying the next one
#[cfg(not(test))]
const PAGE_ERROR_PAUSE: Duration = Duration::from_secs(5);
#[cfg(test)]
const PAGE_ERROR_PAUSE: Duration = Duration::from_millis(10);

/// Owns one harvest run end to end
pub struct Orchestrator {
    config: Arc<Config>,
    store: Box<dyn RecordStore + Send>,
    pool: Arc<SessionPool>,
    source: Arc<dyn PageSource>,
    login: LoginManager,
    rate: RateController,
    pipeline: Arc<FetchPipeline>,
    seen_ids: HashSet<String>,
    stats: HarvestStats,
    stop: StopSignal,
}

impl Orchestrator {
    /// Builds an orchestrator over the configured gallery source
    pub fn new(
        config: Arc<Config>,
        store: Box<dyn RecordStore + Send>,
        stop: StopSignal,
    ) -> Result<Self> {
        let source = Arc::new(GallerySource::new(&config)?);
        Self::with_source(config, store, source, stop)
    }

    /// Builds an orchestrator over an arbitrary page source
    pub fn with_source(
        config: Arc<Config>,
        store: Box<dyn RecordStore + Send>,
        source: Arc<dyn PageSource>,
        stop: StopSignal,
    ) -> Result<Self> {
        let pool = Arc::new(SessionPool::initialize(&config)?);
        let login = LoginManager::new(&config)?;
        let rate = RateController::new(&config.rate_limit);
        let pipeline = Arc::new(FetchPipeline::new(&config)?);

        Ok(Self {
            config,
            store,
            pool,
            source,
            login,
            rate,
            pipeline,
            seen_ids: HashSet::new(),
            stats: HarvestStats::new(),
            stop,
        })
    }

    /// Runs the harvest to completion, stop, or breaker trip
    ///
    /// The pool is torn down and the summary logged on every exit path.
    pub async fn run(&mut self) -> Result<()> {
        let result = self.run_inner().await;
        self.pool.close_all().await;
        self.stats.log_summary();
        result
    }

    /// Counters for the run so far
    pub fn stats(&self) -> &HarvestStats {
        &self.stats
    }

    async fn run_inner(&mut self) -> Result<()> {
        self.seen_ids = self.store.preload_existing_ids()?;
        info!(known = self.seen_ids.len(), "Existing records preloaded");

        self.authenticate_pool().await?;
        self.paging_loop().await
    }

    /// Logs every pooled session in before any harvesting starts
    ///
    /// A login failure here is fatal: nothing useful can happen without an
    /// authenticated pool.
    async fn authenticate_pool(&self) -> Result<()> {
        for session in self.pool.sessions() {
            self.login.login(session).await?;
        }
        info!(sessions = self.pool.sessions().len(), "Pool authenticated");
        Ok(())
    }

    async fn paging_loop(&mut self) -> Result<()> {
        let mut page: u32 = 1;
        let mut consecutive_failures: u32 = 0;
        let mut total_pages: Option<u32> = None;

        loop {
            if self.stop.is_stopped() {
                info!(page, "Stop requested, ending harvest");
                return Ok(());
            }
            if let Some(max) = self.config.harvester.max_pages {
                if page > max {
                    info!(max, "Configured page limit reached");
                    return Ok(());
                }
            }
            if let Some(total) = total_pages {
                if page > total {
                    info!(total, "All pages visited");
                    return Ok(());
                }
            }

            let mut slot = self.pool.acquire().await?;
            let outcome = self.harvest_page(&mut slot, page, &mut total_pages).await;
            self.pool.release(slot);

            match outcome {
                Ok(has_next) => {
                    consecutive_failures = 0;
                    self.rate.record_success();
                    self.stats.pages_scraped += 1;
                    if !has_next {
                        info!(page, "No further pages");
                        return Ok(());
                    }
                    page += 1;
                }
                Err(error) => {
                    consecutive_failures += 1;
                    self.stats.errors += 1;
                    self.rate.record_error();
                    warn!(
                        page,
                        failures = consecutive_failures,
                        %error,
                        "Page harvest failed"
                    );

                    if consecutive_failures >= self.config.harvester.max_consecutive_failures {
                        return Err(HarvestError::TooManyFailures {
                            count: consecutive_failures,
                        });
                    }
                    sleep(PAGE_ERROR_PAUSE).await;
                }
            }
        }
    }

    /// Harvests one browse page; returns whether a further page exists
    async fn harvest_page(
        &mut self,
        slot: &mut SessionSlot,
        page: u32,
        total_pages: &mut Option<u32>,
    ) -> Result<bool> {
        self.rate.wait_for_turn().await;

        if !self.source.navigate_to_page(slot, page).await? {
            warn!(page, "Page did not render a browse grid, stopping");
            return Ok(false);
        }

        // The site drops sessions mid-run; a re-login means the page we got
        // was the logged-out view, so fetch it again.
        if self.login.ensure_logged_in(slot).await? {
            self.source.navigate_to_page(slot, page).await?;
        }

        if total_pages.is_none() {
            *total_pages = self.source.total_pages(slot);
            if let Some(total) = total_pages {
                info!(total, "Total page count announced");
            }
        }

        let records = self.source.list_records(slot).await?;
        self.stats.records_found += records.len() as u64;

        // Grow the seen set as records are filtered so a source id repeated
        // within one page is only taken once.
        let mut fresh: Vec<Record> = Vec::new();
        for record in records {
            if self.seen_ids.insert(record.source_id.clone()) {
                fresh.push(record);
            }
        }
        debug!(page, fresh = fresh.len(), "Page extracted");

        let mut enriched = Vec::with_capacity(fresh.len());
        for mut record in fresh {
            if self.stop.is_stopped() {
                break;
            }
            sleep(Duration::from_millis(self.config.harvester.request_delay_ms)).await;

            // A failed detail fetch costs the extras, not the record
            match self.source.enrich_record(slot, &record.source_id).await {
                Ok(details) => record.apply_details(&details),
                Err(error) => {
                    warn!(source_id = %record.source_id, %error, "Detail fetch failed");
                    self.stats.errors += 1;
                }
            }

            self.store.upsert(&record)?;
            self.stats.records_new += 1;
            enriched.push(record);
        }

        if self.config.downloads.enabled {
            self.download_batch(&enriched).await?;
        }

        self.source.has_next_page(slot)
    }

    /// Downloads a page's assets concurrently and persists each outcome
    async fn download_batch(&mut self, records: &[Record]) -> Result<()> {
        let mut tasks = JoinSet::new();
        for record in records {
            if record.asset_url.is_empty() {
                continue;
            }
            let pipeline = Arc::clone(&self.pipeline);
            let source_id = record.source_id.clone();
            let url = record.asset_url.clone();
            tasks.spawn(async move {
                let outcome = pipeline.download_asset(&source_id, &url).await;
                (source_id, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (source_id, outcome) = match joined {
                Ok(pair) => pair,
                Err(error) => {
                    warn!(%error, "Download task panicked");
                    self.stats.download_failures += 1;
                    continue;
                }
            };

            let local_path = outcome.success.then_some(outcome.local_path.as_str());
            self.store.update_download_status(
                &source_id,
                local_path,
                outcome.success,
                outcome.attempts,
            )?;

            if outcome.success {
                if !outcome.skipped {
                    self.stats.records_downloaded += 1;
                }
            } else {
                self.stats.download_failures += 1;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::sample_config;
    use crate::crawler::stop_channel;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LOGGED_IN_HTML: &str = r#"<html><body><div class="user-menu"></div></body></html>"#;

    /// Serves just enough of a site for the pool to authenticate
    async fn login_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/welcome/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/welcome/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGGED_IN_HTML))
            .mount(&server)
            .await;
        server
    }

    fn config_for(server: &MockServer) -> Arc<Config> {
        let mut config = sample_config();
        config.source.base_url = server.uri();
        config.downloads.enabled = false;
        config.harvester.request_delay_ms = 0;
        config.rate_limit.max_requests_per_minute = 60_000;
        Arc::new(config)
    }

    /// Source that always fails navigation
    struct FailingSource {
        calls: AtomicU32,
    }

    #[async_trait]
    impl PageSource for FailingSource {
        async fn navigate_to_page(&self, _slot: &mut SessionSlot, page: u32) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(HarvestError::Navigation { page })
        }

        async fn list_records(&self, _slot: &mut SessionSlot) -> Result<Vec<Record>> {
            Ok(Vec::new())
        }

        async fn enrich_record(
            &self,
            _slot: &mut SessionSlot,
            _source_id: &str,
        ) -> Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }

        fn has_next_page(&self, _slot: &SessionSlot) -> Result<bool> {
            Ok(false)
        }

        fn total_pages(&self, _slot: &SessionSlot) -> Option<u32> {
            None
        }
    }

    /// Source that serves a fixed set of records on one page
    struct SinglePageSource {
        records: Vec<Record>,
    }

    #[async_trait]
    impl PageSource for SinglePageSource {
        async fn navigate_to_page(&self, slot: &mut SessionSlot, page: u32) -> Result<bool> {
            slot.page.load(
                url::Url::parse("https://gallery.example.com/browse/stills").unwrap(),
                LOGGED_IN_HTML.to_string(),
            );
            slot.page.set_page_number(page);
            Ok(true)
        }

        async fn list_records(&self, _slot: &mut SessionSlot) -> Result<Vec<Record>> {
            Ok(self.records.clone())
        }

        async fn enrich_record(
            &self,
            _slot: &mut SessionSlot,
            _source_id: &str,
        ) -> Result<HashMap<String, String>> {
            let mut details = HashMap::new();
            details.insert("Director".to_string(), "J. Doe".to_string());
            details.insert("Year".to_string(), "1987".to_string());
            Ok(details)
        }

        fn has_next_page(&self, _slot: &SessionSlot) -> Result<bool> {
            Ok(false)
        }

        fn total_pages(&self, _slot: &SessionSlot) -> Option<u32> {
            Some(1)
        }
    }

    /// Source whose one page lists the same source id twice
    struct RepeatingSource {
        enrich_calls: AtomicU32,
    }

    #[async_trait]
    impl PageSource for RepeatingSource {
        async fn navigate_to_page(&self, slot: &mut SessionSlot, page: u32) -> Result<bool> {
            slot.page.load(
                url::Url::parse("https://gallery.example.com/browse/stills").unwrap(),
                LOGGED_IN_HTML.to_string(),
            );
            slot.page.set_page_number(page);
            Ok(true)
        }

        async fn list_records(&self, _slot: &mut SessionSlot) -> Result<Vec<Record>> {
            Ok(vec![Record::new("dup1"), Record::new("dup1")])
        }

        async fn enrich_record(
            &self,
            _slot: &mut SessionSlot,
            _source_id: &str,
        ) -> Result<HashMap<String, String>> {
            self.enrich_calls.fetch_add(1, Ordering::SeqCst);
            Ok(HashMap::new())
        }

        fn has_next_page(&self, _slot: &SessionSlot) -> Result<bool> {
            Ok(false)
        }

        fn total_pages(&self, _slot: &SessionSlot) -> Option<u32> {
            Some(1)
        }
    }

    #[tokio::test]
    async fn test_repeated_id_within_page_is_harvested_once() {
        let server = login_server().await;
        let config = config_for(&server);
        let source = Arc::new(RepeatingSource {
            enrich_calls: AtomicU32::new(0),
        });
        let (_handle, stop) = stop_channel();

        let mut orchestrator = Orchestrator::with_source(
            config,
            Box::new(MemoryStore::new()),
            Arc::clone(&source) as Arc<dyn PageSource>,
            stop,
        )
        .unwrap();

        orchestrator.run().await.unwrap();

        // The second occurrence is filtered, not enriched again
        assert_eq!(source.enrich_calls.load(Ordering::SeqCst), 1);

        let stats = orchestrator.stats();
        assert_eq!(stats.records_found, 2);
        assert_eq!(stats.records_new, 1);
        assert_eq!(orchestrator.store.stats().unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_breaker_trips_after_consecutive_failures() {
        let server = login_server().await;
        let config = config_for(&server);
        let source = Arc::new(FailingSource {
            calls: AtomicU32::new(0),
        });
        let (_handle, stop) = stop_channel();

        let mut orchestrator = Orchestrator::with_source(
            Arc::clone(&config),
            Box::new(MemoryStore::new()),
            Arc::clone(&source) as Arc<dyn PageSource>,
            stop,
        )
        .unwrap();

        let result = orchestrator.run().await;
        assert!(matches!(
            result,
            Err(HarvestError::TooManyFailures { count: 5 })
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
        assert_eq!(orchestrator.stats().errors, 5);
        assert!(orchestrator.pool.is_closed());
    }

    #[tokio::test]
    async fn test_single_page_harvest_persists_enriched_records() {
        let server = login_server().await;
        let config = config_for(&server);
        let records = vec![Record::new("a1"), Record::new("a2")];
        let (_handle, stop) = stop_channel();

        let mut orchestrator = Orchestrator::with_source(
            config,
            Box::new(MemoryStore::new()),
            Arc::new(SinglePageSource { records }),
            stop,
        )
        .unwrap();

        orchestrator.run().await.unwrap();

        let stats = orchestrator.stats();
        assert_eq!(stats.pages_scraped, 1);
        assert_eq!(stats.records_found, 2);
        assert_eq!(stats.records_new, 2);
        assert_eq!(stats.errors, 0);

        let store_stats = orchestrator.store.stats().unwrap();
        assert_eq!(store_stats.total, 2);
    }

    #[tokio::test]
    async fn test_preloaded_ids_are_not_reharvested() {
        let server = login_server().await;
        let config = config_for(&server);
        let records = vec![Record::new("a1"), Record::new("a2")];
        let (_handle, stop) = stop_channel();

        let mut store = MemoryStore::new();
        store.upsert(&Record::new("a1")).unwrap();

        let mut orchestrator = Orchestrator::with_source(
            config,
            Box::new(store),
            Arc::new(SinglePageSource { records }),
            stop,
        )
        .unwrap();

        orchestrator.run().await.unwrap();

        let stats = orchestrator.stats();
        assert_eq!(stats.records_found, 2);
        assert_eq!(stats.records_new, 1);
    }

    #[tokio::test]
    async fn test_stop_signal_ends_run_cleanly() {
        let server = login_server().await;
        let config = config_for(&server);
        let (handle, stop) = stop_channel();
        handle.stop();

        let mut orchestrator = Orchestrator::with_source(
            config,
            Box::new(MemoryStore::new()),
            Arc::new(SinglePageSource {
                records: vec![Record::new("a1")],
            }),
            stop,
        )
        .unwrap();

        orchestrator.run().await.unwrap();
        assert_eq!(orchestrator.stats().pages_scraped, 0);
        assert!(orchestrator.pool.is_closed());
    }

    #[tokio::test]
    async fn test_failed_login_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/welcome/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/welcome/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<p class="login-error">Bad password</p>"#),
            )
            .mount(&server)
            .await;

        let config = config_for(&server);
        let (_handle, stop) = stop_channel();
        let mut orchestrator = Orchestrator::with_source(
            config,
            Box::new(MemoryStore::new()),
            Arc::new(SinglePageSource {
                records: Vec::new(),
            }),
            stop,
        )
        .unwrap();

        let result = orchestrator.run().await;
        assert!(matches!(result, Err(HarvestError::Auth(_))));
        assert!(orchestrator.pool.is_closed());
    }
}
