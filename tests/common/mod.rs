//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::path::Path;

use ranked_mirror::config::{ApiConfig, Config, RetryConfig, SyncConfig, WindowConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Successful JSON response carrying a complete set of quota headers
pub fn quota_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/json")
        .set_body_string(body)
        .insert_header("X-App-Rate-Limit", "100:1,1000:120")
        .insert_header("X-App-Rate-Limit-Count", "1:1,1:120")
        .insert_header("X-Method-Rate-Limit", "100:10")
        .insert_header("X-Method-Rate-Limit-Count", "1:10")
}

/// Quota-exceeded response with a server hint
pub fn quota_exceeded(retry_after_secs: u64) -> ResponseTemplate {
    ResponseTemplate::new(429)
        .insert_header("Retry-After", retry_after_secs.to_string().as_str())
        .insert_header("X-App-Rate-Limit", "100:1,1000:120")
        .insert_header("X-App-Rate-Limit-Count", "1:1,1:120")
}

/// Configuration pointing at a mock server, persisting under `dir`
pub fn test_config(server: &MockServer, dir: &Path, shards: &[&str], queues: &[&str]) -> Config {
    let mut config = Config {
        api: ApiConfig {
            api_key: Some("RGAPI-test".to_string()),
            base_url: format!("{}/{{platform}}", server.uri()),
            timeout_secs: 5,
            ..Default::default()
        },
        sync: SyncConfig {
            shards: shards.iter().map(|s| s.to_string()).collect(),
            queue_types: queues.iter().map(|q| q.to_string()).collect(),
            store_path: dir.join("players.csv").to_string_lossy().into_owned(),
            ..Default::default()
        },
        retry: RetryConfig {
            max_retries: 0,
            initial_backoff_secs: 0,
            jitter: false,
            ..Default::default()
        },
        ..Default::default()
    };
    config.rate_limit.margin = 0.0;
    config.rate_limit.fallback_wait_ms = 10;
    config
        .rate_limit
        .tiers
        .insert(config.rate_limit.account_tier, vec![WindowConfig::new(1000, 1)]);
    config
}

/// Mount a league page listing `summoner_ids`
pub async fn mount_league(server: &MockServer, shard: &str, queue: &str, summoner_ids: &[&str]) {
    let entries: Vec<String> = summoner_ids
        .iter()
        .map(|id| format!(r#"{{"summonerId":"{}","leaguePoints":1000,"rank":"I"}}"#, id))
        .collect();
    let body = format!(
        r#"{{"leagueId":"L1","tier":"CHALLENGER","queue":"{}","entries":[{}]}}"#,
        queue,
        entries.join(",")
    );
    Mock::given(method("GET"))
        .and(path(format!(
            "/{}/lol/league/v4/challengerleagues/by-queue/{}",
            shard, queue
        )))
        .respond_with(quota_response(&body))
        .mount(server)
        .await;
}

/// Mount identity and standing of one summoner
pub async fn mount_player(
    server: &MockServer,
    shard: &str,
    summoner_id: &str,
    puuid: &str,
    name: &str,
    standings: &[(&str, &str, &str, i64, i64, i64)],
) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/{}/lol/summoner/v4/summoners/{}",
            shard, summoner_id
        )))
        .respond_with(quota_response(&format!(
            r#"{{"id":"{}","puuid":"{}","name":"{}"}}"#,
            summoner_id, puuid, name
        )))
        .mount(server)
        .await;

    let entries: Vec<String> = standings
        .iter()
        .map(|(queue, tier, rank, lp, wins, losses)| {
            format!(
                r#"{{"queueType":"{}","tier":"{}","rank":"{}","leaguePoints":{},"wins":{},"losses":{}}}"#,
                queue, tier, rank, lp, wins, losses
            )
        })
        .collect();
    Mock::given(method("GET"))
        .and(path(format!(
            "/{}/lol/league/v4/entries/by-summoner/{}",
            shard, summoner_id
        )))
        .respond_with(quota_response(&format!("[{}]", entries.join(","))))
        .mount(server)
        .await;
}
