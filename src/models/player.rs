//! Mirrored player records
//!
//! A [`PlayerRecord`] is created on the first sighting of a summoner and
//! mutated on every later sighting. Per-queue history only grows.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::league::RankedStats;

/// Snapshot of one queue standing at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Tier
    pub tier: String,
    /// Division
    pub rank: String,
    /// League points
    pub league_points: i64,
    /// Wins
    pub wins: i64,
    /// Losses
    pub losses: i64,
}

impl HistoryEntry {
    /// Snapshot `stats` at `timestamp`
    pub fn snapshot(stats: &RankedStats, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            tier: stats.tier.clone(),
            rank: stats.rank.clone(),
            league_points: stats.league_points,
            wins: stats.wins,
            losses: stats.losses,
        }
    }

    /// True when this snapshot records the same standing as `stats`
    pub fn same_standing(&self, stats: &RankedStats) -> bool {
        self.tier == stats.tier
            && self.rank == stats.rank
            && self.league_points == stats.league_points
            && self.wins == stats.wins
            && self.losses == stats.losses
    }
}

/// Current standing in one queue plus its history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tier
    pub tier: String,
    /// Division
    pub rank: String,
    /// League points
    pub league_points: i64,
    /// Wins
    pub wins: i64,
    /// Losses
    pub losses: i64,
    history: Vec<HistoryEntry>,
}

impl QueueStats {
    /// Rebuild a queue from persisted parts
    pub fn from_parts(stats: RankedStats, history: Vec<HistoryEntry>) -> Self {
        Self {
            tier: stats.tier,
            rank: stats.rank,
            league_points: stats.league_points,
            wins: stats.wins,
            losses: stats.losses,
            history,
        }
    }

    /// Overwrite the current standing
    pub fn update(&mut self, stats: &RankedStats) {
        self.tier.clone_from(&stats.tier);
        self.rank.clone_from(&stats.rank);
        self.league_points = stats.league_points;
        self.wins = stats.wins;
        self.losses = stats.losses;
    }

    /// Append a history entry
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    /// Ordered history, oldest first
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Most recent history entry
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    /// Current standing without history
    pub fn stats(&self) -> RankedStats {
        RankedStats {
            tier: self.tier.clone(),
            rank: self.rank.clone(),
            league_points: self.league_points,
            wins: self.wins,
            losses: self.losses,
        }
    }
}

/// One mirrored player
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerRecord {
    /// Shard the player was last seen on
    pub region: String,
    /// Globally unique player id (may be empty for legacy rows)
    pub puuid: String,
    /// Encrypted summoner id
    pub summoner_id: String,
    /// Display name
    pub summoner_name: String,
    /// Standing per queue type
    pub queues: BTreeMap<String, QueueStats>,
}

impl PlayerRecord {
    /// New record with no queue data
    pub fn new(
        region: impl Into<String>,
        puuid: impl Into<String>,
        summoner_id: impl Into<String>,
        summoner_name: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            puuid: puuid.into(),
            summoner_id: summoner_id.into(),
            summoner_name: summoner_name.into(),
            queues: BTreeMap::new(),
        }
    }

    /// Identity key: puuid, falling back to the summoner id
    pub fn identity_key(&self) -> &str {
        if self.puuid.is_empty() {
            &self.summoner_id
        } else {
            &self.puuid
        }
    }

    /// Standing in `queue_type`
    pub fn queue(&self, queue_type: &str) -> Option<&QueueStats> {
        self.queues.get(queue_type)
    }
}
