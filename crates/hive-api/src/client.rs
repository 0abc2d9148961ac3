use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::cache::ResponseCache;
use crate::error::ApiError;
use crate::model::{GameStats, GameTypeRecord, PlayerId, PlayerInfo};
use crate::GameType;

pub const DEFAULT_BASE_URL: &str = "https://api.hivemc.com/v1";

const DEFAULT_USER_AGENT: &str = concat!("hive-updater/", env!("CARGO_PKG_VERSION"));

/// Install the process-wide rustls crypto provider once.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

#[derive(Debug, Clone)]
pub struct HiveClientConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    /// Request timeout. Zero disables the timeout.
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HiveClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// HTTP client for the statistics API.
///
/// Every request takes a `max_cache_age`; a response fetched more recently
/// than that is served from the in-process cache.
pub struct HiveClient {
    client: Client,
    base_url: String,
    cache: ResponseCache,
}

impl HiveClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_config(HiveClientConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
    }

    pub fn with_config(config: HiveClientConfig) -> Result<Self, ApiError> {
        install_rustls_provider();

        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;

        let mut builder = Client::builder().user_agent(config.user_agent);
        if config.request_timeout > Duration::ZERO {
            builder = builder.timeout(config.request_timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            cache: ResponseCache::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn player_url(&self, player: &PlayerId) -> String {
        format!("{}/player/{}", self.base_url, player)
    }

    pub fn game_url(&self, player: &PlayerId, game_type: GameType) -> String {
        format!("{}/player/{}/{}", self.base_url, player, game_type.id())
    }

    /// Fetch the general profile of a player.
    pub async fn player_info(
        &self,
        player: &PlayerId,
        max_cache_age: Duration,
    ) -> Result<PlayerInfo, ApiError> {
        let body = self.get_json(self.player_url(player), max_cache_age).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Fetch the statistics of a player in one game type.
    pub async fn game_info(
        &self,
        player: &PlayerId,
        game_type: GameType,
        max_cache_age: Duration,
    ) -> Result<GameTypeRecord, ApiError> {
        let body = self
            .get_json(self.game_url(player, game_type), max_cache_age)
            .await?;
        let stats: GameStats = serde_json::from_value(body)?;
        Ok(GameTypeRecord::new(game_type, stats))
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drop cached responses fetched at least `max_age` ago.
    pub fn evict_expired_responses(&self, max_age: Duration) -> usize {
        self.cache.evict_expired(max_age)
    }

    pub fn cached_responses(&self) -> usize {
        self.cache.len()
    }

    async fn get_json(&self, url: String, max_cache_age: Duration) -> Result<Value, ApiError> {
        if let Some(body) = self.cache.get_fresh(&url, max_cache_age) {
            trace!(url = %url, "serving cached response");
            return Ok(body);
        }

        debug!(url = %url, "requesting");
        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound { url });
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body: Value = response.json().await?;
        self.cache.insert(url, body.clone());
        Ok(body)
    }
}
