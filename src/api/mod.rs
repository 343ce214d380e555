//! Ranked API endpoints
//!
//! [`RiotApi`] builds endpoint URLs, routes every call through one shared
//! [`RequestDispatcher`] and decodes the JSON bodies. The store and the sync
//! driver only see the [`LeagueSource`] and [`RankedSource`] traits.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, SyncError};
use crate::limiter::ScopeSet;
use crate::models::{LeagueBracket, LeagueEntry, LeagueList, RankedStats, Summoner};
use crate::sync::{ApiRequest, ReqwestTransport, RequestDispatcher, Transport};

/// Application scope shared by every call made with the configured key
pub const APPLICATION_SCOPE: &str = "default";

/// Top-of-ladder pages
#[async_trait]
pub trait LeagueSource: Send + Sync {
    /// The `bracket` league of `queue` on `region`
    async fn top_league(
        &self,
        region: &str,
        queue: &str,
        bracket: LeagueBracket,
    ) -> Result<LeagueList, SyncError>;
}

/// Identity and standings of individual summoners
#[async_trait]
pub trait RankedSource: Send + Sync {
    /// Canonical identity of a summoner
    async fn summoner(&self, region: &str, summoner_id: &str) -> Result<Summoner, SyncError>;

    /// Standing in every ranked queue, keyed by queue type
    async fn ranked_stats(
        &self,
        region: &str,
        summoner_id: &str,
    ) -> Result<BTreeMap<String, RankedStats>, SyncError>;
}

/// Ranked API client
pub struct RiotApi<T: Transport = ReqwestTransport> {
    dispatcher: Mutex<RequestDispatcher<T>>,
    base_url: String,
}

impl RiotApi<ReqwestTransport> {
    /// Build a client with an HTTP transport from configuration
    pub fn from_config(
        config: &Config,
        shutdown: Option<broadcast::Receiver<()>>,
    ) -> Result<Self, AppError> {
        let transport = ReqwestTransport::new(&config.api)?;
        let mut dispatcher =
            RequestDispatcher::from_config(transport, &config.rate_limit, &config.sync.shards)
                .map_err(|e| AppError::Config(e.to_string()))?;
        if let Some(rx) = shutdown {
            dispatcher = dispatcher.with_shutdown(rx);
        }
        Ok(Self::new(dispatcher, &config.api.base_url))
    }
}

impl<T: Transport> RiotApi<T> {
    /// Wrap a dispatcher; `base_url` may contain a `{platform}` placeholder
    pub fn new(dispatcher: RequestDispatcher<T>, base_url: impl Into<String>) -> Self {
        Self {
            dispatcher: Mutex::new(dispatcher),
            base_url: base_url.into(),
        }
    }

    /// Absolute URL of `path` on `region`
    pub fn url(&self, region: &str, path: &str) -> String {
        format!(
            "{}{}",
            self.base_url.replace("{platform}", region).trim_end_matches('/'),
            path
        )
    }

    /// Exclusive access to the dispatcher
    pub async fn dispatcher(&self) -> tokio::sync::MutexGuard<'_, RequestDispatcher<T>> {
        self.dispatcher.lock().await
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        region: &str,
        path: &str,
        method: &str,
    ) -> Result<R, SyncError> {
        let url = self.url(region, path);
        let scopes = ScopeSet::new(region, APPLICATION_SCOPE, method);
        let request = ApiRequest::get(&url);

        let response = self.dispatcher.lock().await.dispatch(&request, &scopes).await?;

        match response.status {
            status if status.is_success() => serde_json::from_slice(&response.body).map_err(|e| {
                warn!(url = %url, error = %e, "Undecodable response body");
                SyncError::InvalidData(e.to_string())
            }),
            StatusCode::NOT_FOUND => {
                debug!(url = %url, "Resource not found (404)");
                Err(SyncError::NotFound)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(url = %url, status = response.status.as_u16(), "Unauthorized");
                Err(SyncError::Unauthorized)
            }
            status => {
                warn!(url = %url, status = status.as_u16(), "Unexpected status");
                Err(SyncError::ServerError(status.as_u16()))
            }
        }
    }
}

#[async_trait]
impl<T: Transport> LeagueSource for RiotApi<T> {
    async fn top_league(
        &self,
        region: &str,
        queue: &str,
        bracket: LeagueBracket,
    ) -> Result<LeagueList, SyncError> {
        let path = format!(
            "/lol/league/v4/{}/by-queue/{}",
            bracket.path_segment(),
            queue
        );
        self.get_json(region, &path, &format!("league-v4.{}", bracket))
            .await
    }
}

#[async_trait]
impl<T: Transport> RankedSource for RiotApi<T> {
    async fn summoner(&self, region: &str, summoner_id: &str) -> Result<Summoner, SyncError> {
        let path = format!("/lol/summoner/v4/summoners/{}", summoner_id);
        self.get_json(region, &path, "summoner-v4.by-id").await
    }

    async fn ranked_stats(
        &self,
        region: &str,
        summoner_id: &str,
    ) -> Result<BTreeMap<String, RankedStats>, SyncError> {
        let path = format!("/lol/league/v4/entries/by-summoner/{}", summoner_id);
        let entries: Vec<LeagueEntry> = self
            .get_json(region, &path, "league-v4.entries-by-summoner")
            .await?;
        Ok(RankedStats::by_queue(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::limiter::{QuotaPair, QuotaProtocol, RateLimitRegistry, ScopeKey};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quota_ok(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_string(body)
            .insert_header("X-App-Rate-Limit", "20:1,100:120")
            .insert_header("X-App-Rate-Limit-Count", "1:1,1:120")
            .insert_header("X-Method-Rate-Limit", "50:10")
            .insert_header("X-Method-Rate-Limit-Count", "1:10")
    }

    fn api(server: &MockServer) -> RiotApi {
        let transport = ReqwestTransport::new(&ApiConfig {
            api_key: Some("RGAPI-test".to_string()),
            ..Default::default()
        })
        .unwrap();
        let registry = RateLimitRegistry::new(
            vec![QuotaPair::new(100, Duration::from_secs(1))],
            0.0,
        );
        let dispatcher = RequestDispatcher::new(transport, registry, QuotaProtocol::default());
        RiotApi::new(dispatcher, format!("{}/{{platform}}", server.uri()))
    }

    #[test]
    fn test_url_template() {
        let dispatcher = RequestDispatcher::new(
            ReqwestTransport::new(&ApiConfig::default()).unwrap(),
            RateLimitRegistry::new(vec![], 0.05),
            QuotaProtocol::default(),
        );
        let api = RiotApi::new(dispatcher, "https://{platform}.api.riotgames.com/");
        assert_eq!(
            api.url("kr", "/lol/status"),
            "https://kr.api.riotgames.com/lol/status"
        );
    }

    // Test 1: League pages decode and learn the method scope
    #[tokio::test]
    async fn test_top_league() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/euw1/lol/league/v4/challengerleagues/by-queue/RANKED_SOLO_5x5"))
            .respond_with(quota_ok(
                r#"{"tier":"CHALLENGER","queue":"RANKED_SOLO_5x5","entries":[{"summonerId":"S1","leaguePoints":1000}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let api = api(&server);
        let page = api
            .top_league("euw1", "RANKED_SOLO_5x5", LeagueBracket::Challenger)
            .await
            .unwrap();

        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].summoner_id, "S1");
        assert!(api
            .dispatcher()
            .await
            .registry()
            .resolve(&ScopeKey::Method("league-v4.challenger".into()))
            .is_some());
    }

    // Test 2: Ranked entries are grouped by queue
    #[tokio::test]
    async fn test_ranked_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/euw1/lol/league/v4/entries/by-summoner/S1"))
            .respond_with(quota_ok(
                r#"[{"queueType":"RANKED_SOLO_5x5","tier":"GOLD","rank":"II","leaguePoints":50,"wins":10,"losses":8}]"#,
            ))
            .mount(&server)
            .await;

        let stats = api(&server).ranked_stats("euw1", "S1").await.unwrap();

        assert_eq!(stats["RANKED_SOLO_5x5"].tier, "GOLD");
        assert_eq!(stats["RANKED_SOLO_5x5"].league_points, 50);
    }

    // Test 3: Error statuses map onto sync errors
    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        for (id, status) in [("missing", 404), ("forbidden", 403), ("broken", 503)] {
            Mock::given(method("GET"))
                .and(path(format!("/euw1/lol/summoner/v4/summoners/{}", id)))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;
        }

        let api = api(&server);
        assert_eq!(api.summoner("euw1", "missing").await, Err(SyncError::NotFound));
        assert_eq!(
            api.summoner("euw1", "forbidden").await,
            Err(SyncError::Unauthorized)
        );
        assert_eq!(
            api.summoner("euw1", "broken").await,
            Err(SyncError::ServerError(503))
        );
    }

    // Test 4: Undecodable bodies are invalid data
    #[tokio::test]
    async fn test_invalid_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/euw1/lol/summoner/v4/summoners/S1"))
            .respond_with(quota_ok("not json"))
            .mount(&server)
            .await;

        let result = api(&server).summoner("euw1", "S1").await;
        assert!(matches!(result, Err(SyncError::InvalidData(_))));
    }
}
