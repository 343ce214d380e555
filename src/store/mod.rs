//! Identity-keyed player mirror
//!
//! [`EntityStore`] merges league pages into [`PlayerRecord`]s and persists the
//! whole collection as CSV. Records are keyed by puuid, falling back to the
//! summoner id for rows that never had one. Records are never removed.

pub mod csv;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::RankedSource;
use crate::config::SyncConfig;
use crate::error::{StoreError, SyncError};
use crate::models::{HistoryEntry, LeagueItem, LeagueList, PlayerRecord, RankedStats, Summoner};

/// When a sighting appends to a queue's history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// Every sighting appends one entry
    #[default]
    AppendAlways,
    /// Append only when the standing differs from the latest entry
    AppendOnChange,
}

/// Counts produced by one [`EntityStore::add`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Records seen for the first time
    pub created: u64,
    /// Existing records refreshed
    pub updated: u64,
    /// History entries appended across all queues
    pub history_appended: u64,
    /// Page entries dropped because the summoner no longer exists
    pub skipped: u64,
}

/// In-memory mirror backed by a CSV file
#[derive(Debug)]
pub struct EntityStore {
    records: Vec<PlayerRecord>,
    by_puuid: HashMap<String, usize>,
    by_summoner: HashMap<String, usize>,
    queue_types: Vec<String>,
    path: PathBuf,
    policy: HistoryPolicy,
}

impl EntityStore {
    /// Empty store persisted at `path`, with columns for `queue_types` first
    pub fn new(path: impl Into<PathBuf>, queue_types: Vec<String>) -> Self {
        Self {
            records: Vec::new(),
            by_puuid: HashMap::new(),
            by_summoner: HashMap::new(),
            queue_types,
            path: path.into(),
            policy: HistoryPolicy::default(),
        }
    }

    /// Empty store configured from the sync section
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(&config.store_path, config.queue_types.clone()).with_policy(config.history_policy)
    }

    /// Set the history policy
    pub fn with_policy(mut self, policy: HistoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Default file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the store holds no record
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in insertion order
    pub fn records(&self) -> &[PlayerRecord] {
        &self.records
    }

    /// Look up a record by puuid or summoner id
    pub fn get(&self, key: &str) -> Option<&PlayerRecord> {
        self.by_puuid
            .get(key)
            .or_else(|| self.by_summoner.get(key))
            .map(|&i| &self.records[i])
    }

    /// Merge a league page seen on `region`, stamping history with the current time
    pub async fn add<S>(
        &mut self,
        page: &LeagueList,
        region: &str,
        source: &S,
    ) -> Result<MergeSummary, SyncError>
    where
        S: RankedSource + ?Sized,
    {
        self.add_at(page, region, source, Utc::now()).await
    }

    /// Merge a league page, stamping history with `at`
    ///
    /// Identity and ranked stats of every entry are fetched through `source`.
    /// Entries whose summoner is gone (`NotFound`) are skipped; any other
    /// failure aborts the merge, keeping the entries merged so far.
    pub async fn add_at<S>(
        &mut self,
        page: &LeagueList,
        region: &str,
        source: &S,
        at: DateTime<Utc>,
    ) -> Result<MergeSummary, SyncError>
    where
        S: RankedSource + ?Sized,
    {
        let mut summary = MergeSummary::default();

        for item in &page.entries {
            let summoner = match source.summoner(region, &item.summoner_id).await {
                Ok(summoner) => summoner,
                Err(SyncError::NotFound) => {
                    warn!(region, summoner_id = %item.summoner_id, "Summoner not found, skipping");
                    summary.skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };
            let summoner_id = if summoner.id.is_empty() {
                item.summoner_id.as_str()
            } else {
                summoner.id.as_str()
            };
            let stats = match source.ranked_stats(region, summoner_id).await {
                Ok(stats) => stats,
                Err(SyncError::NotFound) => BTreeMap::new(),
                Err(err) => return Err(err),
            };

            let (created, appended) = self.upsert(region, item, &summoner, &stats, at);
            if created {
                summary.created += 1;
            } else {
                summary.updated += 1;
            }
            summary.history_appended += appended;
        }

        debug!(
            region,
            entries = page.entries.len(),
            created = summary.created,
            updated = summary.updated,
            "Merged league page"
        );
        Ok(summary)
    }

    /// Create or refresh one record; returns (created, history entries appended)
    fn upsert(
        &mut self,
        region: &str,
        item: &LeagueItem,
        summoner: &Summoner,
        stats: &BTreeMap<String, RankedStats>,
        at: DateTime<Utc>,
    ) -> (bool, u64) {
        let summoner_id = if summoner.id.is_empty() {
            &item.summoner_id
        } else {
            &summoner.id
        };

        let existing = (!summoner.puuid.is_empty())
            .then(|| self.by_puuid.get(&summoner.puuid))
            .flatten()
            .or_else(|| self.by_summoner.get(summoner_id))
            .copied();

        let (idx, created) = match existing {
            Some(idx) => {
                self.unindex(idx);
                (idx, false)
            }
            None => {
                self.records.push(PlayerRecord::default());
                (self.records.len() - 1, true)
            }
        };

        let policy = self.policy;
        let record = &mut self.records[idx];
        record.region = region.to_string();
        if !summoner.puuid.is_empty() {
            record.puuid.clone_from(&summoner.puuid);
        }
        record.summoner_id.clone_from(summoner_id);
        if !summoner.name.is_empty() {
            record.summoner_name.clone_from(&summoner.name);
        } else if let Some(name) = item.summoner_name.as_ref().filter(|n| !n.is_empty()) {
            record.summoner_name.clone_from(name);
        }

        let mut appended = 0;
        for (queue, standing) in stats {
            let queue_stats = record.queues.entry(queue.clone()).or_default();
            let append = match policy {
                HistoryPolicy::AppendAlways => true,
                HistoryPolicy::AppendOnChange => queue_stats
                    .latest()
                    .map_or(true, |latest| !latest.same_standing(standing)),
            };
            queue_stats.update(standing);
            if append {
                queue_stats.push_history(HistoryEntry::snapshot(standing, at));
                appended += 1;
            }
        }

        self.index(idx);
        (created, appended)
    }

    fn index(&mut self, idx: usize) {
        let record = &self.records[idx];
        if !record.puuid.is_empty() {
            self.by_puuid.insert(record.puuid.clone(), idx);
        }
        if !record.summoner_id.is_empty() {
            self.by_summoner.insert(record.summoner_id.clone(), idx);
        }
    }

    fn unindex(&mut self, idx: usize) {
        let record = &self.records[idx];
        if self.by_puuid.get(&record.puuid) == Some(&idx) {
            self.by_puuid.remove(&record.puuid);
        }
        if self.by_summoner.get(&record.summoner_id) == Some(&idx) {
            self.by_summoner.remove(&record.summoner_id);
        }
    }

    /// Queue column order: configured queues, then any other queue seen
    fn column_order(&self) -> Vec<String> {
        let extra: BTreeSet<&String> = self
            .records
            .iter()
            .flat_map(|r| r.queues.keys())
            .filter(|q| !self.queue_types.contains(*q))
            .collect();

        self.queue_types
            .iter()
            .cloned()
            .chain(extra.into_iter().cloned())
            .collect()
    }

    /// Write every record to `path` (or the default path)
    ///
    /// The file is replaced atomically: content goes to a sibling temp file
    /// that is then renamed over the target.
    pub async fn save(&self, path: Option<&Path>) -> Result<(), StoreError> {
        let path = path.unwrap_or(self.path.as_path());
        let bytes = csv::encode(&self.records, &self.column_order())?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp_name = path
            .file_name()
            .ok_or_else(|| StoreError::Malformed(format!("{} is not a file path", path.display())))?
            .to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;

        info!(
            path = %path.display(),
            records = self.records.len(),
            bytes = bytes.len(),
            "Saved player store"
        );
        Ok(())
    }

    /// Replace the in-memory records with the contents of `path`
    ///
    /// Returns `Ok(false)` and leaves the store untouched when the file does
    /// not exist.
    pub async fn load(&mut self, path: Option<&Path>) -> Result<bool, StoreError> {
        let path = path.unwrap_or(self.path.as_path()).to_path_buf();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No saved store, starting empty");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        let (records, _) = csv::decode(&bytes)?;

        let mut by_puuid = HashMap::new();
        let mut by_summoner = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            let key = record.identity_key();
            let index = if record.puuid.is_empty() {
                &mut by_summoner
            } else {
                &mut by_puuid
            };
            if index.insert(key.to_string(), idx).is_some() {
                return Err(StoreError::Malformed(format!(
                    "duplicate identity {:?} in {}",
                    key,
                    path.display()
                )));
            }
        }
        for (idx, record) in records.iter().enumerate() {
            if !record.puuid.is_empty() && !record.summoner_id.is_empty() {
                by_summoner.entry(record.summoner_id.clone()).or_insert(idx);
            }
        }

        self.records = records;
        self.by_puuid = by_puuid;
        self.by_summoner = by_summoner;

        info!(path = %path.display(), records = self.records.len(), "Loaded player store");
        Ok(true)
    }
}
