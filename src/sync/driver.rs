//! Ladder mirroring run
//!
//! One run walks every queue type across every shard, fetches the top league
//! page, merges it into the store and saves after each shard. State is loaded
//! from disk before the first page of the first run. A run that is dropped or
//! fails part way resumes at the first unsaved page on the next call.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::api::{LeagueSource, RankedSource};
use crate::config::Config;
use crate::error::SyncError;
use crate::models::LeagueBracket;
use crate::store::{EntityStore, MergeSummary};

use super::retry::RetryManager;
use super::scheduler::{SyncResult, Syncable};

/// Fetch, merge and persist across queue types and shards
pub struct SyncDriver<S> {
    source: S,
    store: EntityStore,
    shards: Vec<String>,
    queue_types: Vec<String>,
    bracket: LeagueBracket,
    max_shards: Option<usize>,
    retry: RetryManager,
    loaded: bool,
    next_page: usize,
}

impl<S> SyncDriver<S>
where
    S: LeagueSource + RankedSource,
{
    /// Create a driver over every shard in `shards`
    pub fn new(
        source: S,
        store: EntityStore,
        shards: Vec<String>,
        queue_types: Vec<String>,
    ) -> Self {
        Self {
            source,
            store,
            shards,
            queue_types,
            bracket: LeagueBracket::default(),
            max_shards: None,
            retry: RetryManager::with_defaults(),
            loaded: false,
            next_page: 0,
        }
    }

    /// Create a driver from configuration
    pub fn from_config(source: S, config: &Config) -> Self {
        let mut driver = Self::new(
            source,
            EntityStore::from_config(&config.sync),
            config.sync.shards.clone(),
            config.sync.queue_types.clone(),
        )
        .with_bracket(config.sync.bracket)
        .with_retry(RetryManager::new(config.retry.clone()));
        driver.max_shards = config.sync.max_shards;
        driver
    }

    /// League bracket to fetch
    pub fn with_bracket(mut self, bracket: LeagueBracket) -> Self {
        self.bracket = bracket;
        self
    }

    /// Visit only the first `limit` shards of each queue
    pub fn with_max_shards(mut self, limit: usize) -> Self {
        self.max_shards = Some(limit);
        self
    }

    /// Retry policy for page fetches
    pub fn with_retry(mut self, retry: RetryManager) -> Self {
        self.retry = retry;
        self
    }

    /// The mirror
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// The data source
    pub fn source(&self) -> &S {
        &self.source
    }

    fn active_shards(&self) -> &[String] {
        match self.max_shards {
            Some(limit) => &self.shards[..limit.min(self.shards.len())],
            None => &self.shards,
        }
    }

    /// (queue, shard) pages of one pass, queue-major
    fn pass_pages(&self) -> Vec<(String, String)> {
        let shards = self.active_shards();
        self.queue_types
            .iter()
            .flat_map(|queue| shards.iter().map(move |shard| (queue.clone(), shard.clone())))
            .collect()
    }

    /// Index of the next page to fetch within the current pass
    pub fn next_page(&self) -> usize {
        self.next_page
    }

    /// Run one pass
    ///
    /// A page missing on the remote (`NotFound`) is skipped. Any other fetch
    /// failure, after retries, aborts the pass; shards already merged stay
    /// saved. The position advances after every saved page, so the next call
    /// continues an interrupted pass instead of starting over.
    pub async fn run(&mut self) -> Result<SyncResult, SyncError> {
        if !self.loaded {
            self.store.load(None).await?;
            self.loaded = true;
        }

        let pages = self.pass_pages();
        if self.next_page >= pages.len() {
            self.next_page = 0;
        }
        if let Some(limit) = self.max_shards {
            info!(
                limit,
                total = self.shards.len(),
                "Shard iteration limited by max_shards"
            );
        }
        if self.next_page > 0 {
            info!(
                resume_at = self.next_page,
                pages = pages.len(),
                "Resuming interrupted pass"
            );
        }

        let mut total = SyncResult::default();
        for (queue, shard) in pages.iter().skip(self.next_page) {
            let source = &self.source;
            let bracket = self.bracket;

            let page = match self
                .retry
                .execute(shard, queue, || source.top_league(shard, queue, bracket))
                .await
            {
                Ok(page) => page,
                Err(SyncError::NotFound) => {
                    warn!(shard = %shard, queue = %queue, "No league page, skipping");
                    self.next_page += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let merged = self.store.add(&page, shard, source).await?;
            self.store.save(None).await?;
            self.next_page += 1;

            info!(
                shard = %shard,
                queue = %queue,
                entries = page.entries.len(),
                created = merged.created,
                updated = merged.updated,
                records = self.store.len(),
                "Shard synced"
            );
            total.absorb(&page_result(&merged));
        }

        self.next_page = 0;
        Ok(total)
    }
}

fn page_result(merged: &MergeSummary) -> SyncResult {
    SyncResult {
        pages_merged: 1,
        records_created: merged.created,
        records_updated: merged.updated,
        history_appended: merged.history_appended,
    }
}

/// Scheduler job that repeats [`SyncDriver::run`]
pub struct LadderSync<S> {
    driver: Mutex<SyncDriver<S>>,
    interval: Duration,
}

impl<S> LadderSync<S>
where
    S: LeagueSource + RankedSource,
{
    /// Wrap a driver, repeating every `interval`
    pub fn new(driver: SyncDriver<S>, interval: Duration) -> Self {
        Self {
            driver: Mutex::new(driver),
            interval,
        }
    }
}

#[async_trait]
impl<S> Syncable for LadderSync<S>
where
    S: LeagueSource + RankedSource,
{
    fn name(&self) -> &str {
        "ladder"
    }

    fn sync_interval(&self) -> Duration {
        self.interval
    }

    async fn sync(&self) -> Result<SyncResult, SyncError> {
        self.driver.lock().await.run().await
    }
}
