//! Ladder DTOs returned by the remote ranked API
//!
//! Field names follow the remote JSON (camelCase). Fields the mirror does not
//! use are left out; serde ignores them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-of-ladder bracket fetched per shard and queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeagueBracket {
    /// Challenger league
    #[default]
    Challenger,
    /// Grandmaster league
    Grandmaster,
    /// Master league
    Master,
}

impl LeagueBracket {
    /// Path segment used by the league endpoints
    pub fn path_segment(&self) -> &'static str {
        match self {
            LeagueBracket::Challenger => "challengerleagues",
            LeagueBracket::Grandmaster => "grandmasterleagues",
            LeagueBracket::Master => "masterleagues",
        }
    }
}

impl std::fmt::Display for LeagueBracket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeagueBracket::Challenger => write!(f, "challenger"),
            LeagueBracket::Grandmaster => write!(f, "grandmaster"),
            LeagueBracket::Master => write!(f, "master"),
        }
    }
}

/// One page of league standings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueList {
    /// League id
    #[serde(default)]
    pub league_id: String,

    /// Tier of the whole league (e.g. CHALLENGER)
    #[serde(default)]
    pub tier: String,

    /// Queue type of the league
    #[serde(default)]
    pub queue: String,

    /// Ranked entries
    #[serde(default)]
    pub entries: Vec<LeagueItem>,
}

/// A single standing inside a league page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueItem {
    /// Encrypted summoner id
    pub summoner_id: String,

    /// Display name, when the remote still sends it
    #[serde(default)]
    pub summoner_name: Option<String>,

    /// League points
    #[serde(default)]
    pub league_points: i64,

    /// Division inside the tier
    #[serde(default)]
    pub rank: String,

    /// Wins
    #[serde(default)]
    pub wins: i64,

    /// Losses
    #[serde(default)]
    pub losses: i64,
}

impl LeagueItem {
    /// Entry carrying only the summoner id
    pub fn new(summoner_id: impl Into<String>) -> Self {
        Self {
            summoner_id: summoner_id.into(),
            ..Default::default()
        }
    }
}

/// Canonical identity of a summoner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summoner {
    /// Encrypted summoner id
    pub id: String,

    /// Globally unique player id
    #[serde(default)]
    pub puuid: String,

    /// Display name
    #[serde(default)]
    pub name: String,
}

/// Ranked standing of one summoner in one queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueEntry {
    /// Queue type (e.g. RANKED_SOLO_5x5)
    pub queue_type: String,

    /// Tier (e.g. GOLD)
    #[serde(default)]
    pub tier: String,

    /// Division (e.g. II)
    #[serde(default)]
    pub rank: String,

    /// League points
    #[serde(default)]
    pub league_points: i64,

    /// Wins
    #[serde(default)]
    pub wins: i64,

    /// Losses
    #[serde(default)]
    pub losses: i64,
}

/// Queue-independent part of a ranked standing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedStats {
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

impl RankedStats {
    /// Group a summoner's league entries by queue type
    ///
    /// When the remote reports the same queue twice, the later entry wins.
    pub fn by_queue(entries: Vec<LeagueEntry>) -> BTreeMap<String, RankedStats> {
        entries
            .into_iter()
            .map(|e| {
                (
                    e.queue_type,
                    RankedStats {
                        tier: e.tier,
                        rank: e.rank,
                        league_points: e.league_points,
                        wins: e.wins,
                        losses: e.losses,
                    },
                )
            })
            .collect()
    }
}
