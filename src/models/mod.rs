//! Domain models for ranked-mirror
//!
//! This module contains the wire-level ladder DTOs returned by the remote API
//! and the mirrored player records persisted by the entity store.

pub mod league;
pub mod player;

pub use league::{LeagueBracket, LeagueEntry, LeagueItem, LeagueList, RankedStats, Summoner};
pub use player::{HistoryEntry, PlayerRecord, QueueStats};
