//! Tabular encoding of the player mirror
//!
//! One row per player. Fixed identity columns come first, then six columns
//! per queue type: `{Q}_tier`, `{Q}_rank`, `{Q}_leaguePoints`, `{Q}_wins`,
//! `{Q}_losses`, `{Q}_history`. History is a JSON array of entries. A player
//! without standing in a queue leaves that queue's cells empty.

use std::collections::BTreeMap;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::error::StoreError;
use crate::models::{HistoryEntry, PlayerRecord, QueueStats, RankedStats};

const IDENTITY_COLUMNS: [&str; 4] = ["region", "puuid", "summonerId", "summonerName"];
const QUEUE_SUFFIXES: [&str; 6] = [
    "_tier",
    "_rank",
    "_leaguePoints",
    "_wins",
    "_losses",
    "_history",
];

/// Header row for `queues`, in order
pub fn header(queues: &[String]) -> Vec<String> {
    IDENTITY_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(
            queues
                .iter()
                .flat_map(|q| QUEUE_SUFFIXES.iter().map(move |s| format!("{}{}", q, s))),
        )
        .collect()
}

/// Encode records with one column group per queue in `queues`
pub fn encode(records: &[PlayerRecord], queues: &[String]) -> Result<Vec<u8>, StoreError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(header(queues))?;

    for record in records {
        let mut row = vec![
            record.region.clone(),
            record.puuid.clone(),
            record.summoner_id.clone(),
            record.summoner_name.clone(),
        ];
        for queue in queues {
            match record.queue(queue) {
                Some(stats) => {
                    row.push(stats.tier.clone());
                    row.push(stats.rank.clone());
                    row.push(stats.league_points.to_string());
                    row.push(stats.wins.to_string());
                    row.push(stats.losses.to_string());
                    row.push(serde_json::to_string(stats.history())?);
                }
                None => row.extend(std::iter::repeat(String::new()).take(QUEUE_SUFFIXES.len())),
            }
        }
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|e| StoreError::Malformed(format!("Failed to flush CSV buffer: {}", e)))
}

/// Decode records and the queue column order from CSV bytes
pub fn decode(bytes: &[u8]) -> Result<(Vec<PlayerRecord>, Vec<String>), StoreError> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let headers = reader.headers()?.clone();
    let queues = queues_from_header(&headers)?;

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        records.push(decode_row(&row, &queues, line + 2)?);
    }

    Ok((records, queues))
}

fn queues_from_header(headers: &StringRecord) -> Result<Vec<String>, StoreError> {
    for (i, expected) in IDENTITY_COLUMNS.iter().enumerate() {
        if headers.get(i) != Some(*expected) {
            return Err(StoreError::Malformed(format!(
                "expected column {} to be {:?}, found {:?}",
                i + 1,
                expected,
                headers.get(i)
            )));
        }
    }

    let rest: Vec<&str> = headers.iter().skip(IDENTITY_COLUMNS.len()).collect();
    if rest.len() % QUEUE_SUFFIXES.len() != 0 {
        return Err(StoreError::Malformed(format!(
            "{} queue columns is not a multiple of {}",
            rest.len(),
            QUEUE_SUFFIXES.len()
        )));
    }

    rest.chunks(QUEUE_SUFFIXES.len())
        .map(|group| {
            let queue = group[0].strip_suffix(QUEUE_SUFFIXES[0]).ok_or_else(|| {
                StoreError::Malformed(format!("unexpected queue column {:?}", group[0]))
            })?;
            for (column, suffix) in group.iter().zip(QUEUE_SUFFIXES) {
                if *column != format!("{}{}", queue, suffix) {
                    return Err(StoreError::Malformed(format!(
                        "expected {}{}, found {:?}",
                        queue, suffix, column
                    )));
                }
            }
            Ok(queue.to_string())
        })
        .collect()
}

fn cell(row: &StringRecord, i: usize, line: usize) -> Result<&str, StoreError> {
    row.get(i)
        .ok_or_else(|| StoreError::Malformed(format!("line {}: missing column {}", line, i + 1)))
}

fn number(row: &StringRecord, i: usize, line: usize) -> Result<i64, StoreError> {
    let raw = cell(row, i, line)?;
    raw.trim().parse().map_err(|_| {
        StoreError::Malformed(format!("line {}: expected a number, found {:?}", line, raw))
    })
}

fn decode_row(row: &StringRecord, queues: &[String], line: usize) -> Result<PlayerRecord, StoreError> {
    let at = |i: usize| cell(row, i, line);

    let mut record = PlayerRecord::new(at(0)?, at(1)?, at(2)?, at(3)?);
    if record.identity_key().is_empty() {
        return Err(StoreError::Malformed(format!(
            "line {}: record has neither puuid nor summonerId",
            line
        )));
    }

    let mut queues_out = BTreeMap::new();
    for (q, queue) in queues.iter().enumerate() {
        let base = IDENTITY_COLUMNS.len() + q * QUEUE_SUFFIXES.len();
        let cells = (base..base + QUEUE_SUFFIXES.len())
            .map(&at)
            .collect::<Result<Vec<_>, _>>()?;
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }

        let stats = RankedStats {
            tier: cells[0].to_string(),
            rank: cells[1].to_string(),
            league_points: number(row, base + 2, line)?,
            wins: number(row, base + 3, line)?,
            losses: number(row, base + 4, line)?,
        };
        let history: Vec<HistoryEntry> = if cells[5].is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(cells[5])?
        };
        queues_out.insert(queue.clone(), QueueStats::from_parts(stats, history));
    }
    record.queues = queues_out;

    Ok(record)
}
