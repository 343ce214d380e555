//! Ladder sync integration tests
//!
//! Tests a full pass against a mock ranked API including:
//! - Merging a league page into the store
//! - CSV persistence and reload
//! - History growth across passes
//! - Shard limits and missing pages
//! - Scheduler startup and shutdown

mod common;

use std::sync::Arc;
use std::time::Duration;

use ranked_mirror::api::RiotApi;
use ranked_mirror::store::{EntityStore, HistoryPolicy};
use ranked_mirror::sync::{LadderSync, SchedulerConfig, SyncDriver, SyncScheduler, Syncable};
use tempfile::TempDir;
use tokio::sync::broadcast;
use wiremock::MockServer;

use common::{mount_league, mount_player, test_config};

/// Test 1: One page is fetched, merged and persisted
#[tokio::test]
async fn test_single_pass_persists_player() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path(), &["EU"], &["RANKED_SOLO"]);

    mount_league(&server, "EU", "RANKED_SOLO", &["S1"]).await;
    mount_player(
        &server,
        "EU",
        "S1",
        "P1",
        "Alice",
        &[("RANKED_SOLO", "GOLD", "II", 50, 10, 8)],
    )
    .await;

    let api = RiotApi::from_config(&config, None).unwrap();
    let mut driver = SyncDriver::from_config(api, &config);
    let summary = driver.run().await.unwrap();

    assert_eq!(summary.pages_merged, 1);
    assert_eq!(summary.records_created, 1);
    assert_eq!(summary.history_appended, 1);

    let record = driver.store().get("P1").unwrap();
    assert_eq!(record.region, "EU");
    assert_eq!(record.summoner_id, "S1");
    assert_eq!(record.summoner_name, "Alice");
    let solo = record.queue("RANKED_SOLO").unwrap();
    assert_eq!(solo.tier, "GOLD");
    assert_eq!(solo.league_points, 50);
    assert_eq!(solo.history().len(), 1);

    let csv = std::fs::read_to_string(dir.path().join("players.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "region,puuid,summonerId,summonerName,RANKED_SOLO_tier,RANKED_SOLO_rank,\
         RANKED_SOLO_leaguePoints,RANKED_SOLO_wins,RANKED_SOLO_losses,RANKED_SOLO_history"
    );
    assert!(lines.next().unwrap().starts_with("EU,P1,S1,Alice,GOLD,II,50,10,8,"));

    let mut reloaded = EntityStore::new(dir.path().join("players.csv"), vec![]);
    assert!(reloaded.load(None).await.unwrap());
    assert_eq!(reloaded.records(), driver.store().records());
}

/// Test 2: A second pass updates in place and grows history
#[tokio::test]
async fn test_second_pass_appends_history() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path(), &["EU"], &["RANKED_SOLO"]);

    mount_league(&server, "EU", "RANKED_SOLO", &["S1"]).await;
    mount_player(
        &server,
        "EU",
        "S1",
        "P1",
        "Alice",
        &[("RANKED_SOLO", "GOLD", "II", 50, 10, 8)],
    )
    .await;

    let api = RiotApi::from_config(&config, None).unwrap();
    let mut driver = SyncDriver::from_config(api, &config);
    driver.run().await.unwrap();
    let summary = driver.run().await.unwrap();

    assert_eq!(summary.records_created, 0);
    assert_eq!(summary.records_updated, 1);
    assert_eq!(driver.store().len(), 1);
    let solo = driver.store().get("P1").unwrap().queue("RANKED_SOLO").unwrap();
    assert_eq!(solo.history().len(), 2);
}

/// Test 3: A fresh driver resumes from the saved file
#[tokio::test]
async fn test_resume_from_saved_store() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path(), &["EU"], &["RANKED_SOLO"]);
    config.sync.history_policy = HistoryPolicy::AppendOnChange;

    mount_league(&server, "EU", "RANKED_SOLO", &["S1"]).await;
    mount_player(
        &server,
        "EU",
        "S1",
        "P1",
        "Alice",
        &[("RANKED_SOLO", "GOLD", "II", 50, 10, 8)],
    )
    .await;

    let api = RiotApi::from_config(&config, None).unwrap();
    SyncDriver::from_config(api, &config).run().await.unwrap();

    let api = RiotApi::from_config(&config, None).unwrap();
    let mut resumed = SyncDriver::from_config(api, &config);
    let summary = resumed.run().await.unwrap();

    assert_eq!(summary.records_created, 0);
    assert_eq!(summary.records_updated, 1);
    assert_eq!(summary.history_appended, 0);
    let solo = resumed.store().get("S1").unwrap().queue("RANKED_SOLO").unwrap();
    assert_eq!(solo.history().len(), 1);
}

/// Test 4: Missing pages are skipped and shard limits apply
#[tokio::test]
async fn test_shard_limit_and_missing_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(
        &server,
        dir.path(),
        &["EU", "NA", "KR"],
        &["RANKED_SOLO", "RANKED_FLEX"],
    );
    config.sync.max_shards = Some(2);

    // NA has no pages at all; KR is beyond the limit
    mount_league(&server, "EU", "RANKED_SOLO", &["S1"]).await;
    mount_league(&server, "EU", "RANKED_FLEX", &["S1"]).await;
    mount_league(&server, "KR", "RANKED_SOLO", &["K1"]).await;
    mount_player(
        &server,
        "EU",
        "S1",
        "P1",
        "Alice",
        &[
            ("RANKED_SOLO", "GOLD", "II", 50, 10, 8),
            ("RANKED_FLEX", "SILVER", "I", 20, 3, 4),
        ],
    )
    .await;
    mount_player(&server, "KR", "K1", "PK", "Kim", &[]).await;

    let api = RiotApi::from_config(&config, None).unwrap();
    let mut driver = SyncDriver::from_config(api, &config);
    let summary = driver.run().await.unwrap();

    assert_eq!(summary.pages_merged, 2);
    assert_eq!(driver.store().len(), 1);
    assert!(driver.store().get("PK").is_none());
    let alice = driver.store().get("P1").unwrap();
    assert_eq!(alice.queue("RANKED_FLEX").unwrap().tier, "SILVER");
}

/// Test 5: The scheduler runs the ladder job and stops on shutdown
#[tokio::test]
async fn test_scheduler_runs_ladder_job() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path(), &["EU"], &["RANKED_SOLO"]);
    config.sync.jitter_secs = 0;

    mount_league(&server, "EU", "RANKED_SOLO", &["S1"]).await;
    mount_player(
        &server,
        "EU",
        "S1",
        "P1",
        "Alice",
        &[("RANKED_SOLO", "GOLD", "II", 50, 10, 8)],
    )
    .await;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let api = RiotApi::from_config(&config, None).unwrap();
    let driver = SyncDriver::from_config(api, &config);
    let job: Arc<dyn Syncable> = Arc::new(LadderSync::new(driver, Duration::from_secs(3600)));

    let scheduler = SyncScheduler::new(SchedulerConfig::from(&config.sync), vec![job], shutdown_rx);
    let handle = tokio::spawn(scheduler.run());

    let store_file = dir.path().join("players.csv");
    for _ in 0..100 {
        if store_file.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let _ = shutdown_tx.send(());
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop")
        .unwrap();

    assert!(store_file.exists());
    let mut on_disk = EntityStore::new(&store_file, vec![]);
    assert!(on_disk.load(None).await.unwrap());
    assert_eq!(on_disk.len(), 1);
    assert_eq!(on_disk.get("P1").unwrap().summoner_name, "Alice");
}
