use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File};
use moka::future::Cache;
use sea_orm::Database;
use serde::Deserialize;
use tracing::{debug, info};

use crate::realtime::NotificationHub;
use crate::schemas::{AppState, CachedData};

/// Runtime settings. Layered as defaults, then an optional
/// `campus_market.{toml,yaml}`, then `CAMPUS_*` environment variables with
/// `__` between sections (e.g. `CAMPUS_JWT__SECRET`).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub jwt: JwtSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    pub secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_days: i64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: "dev-secret-change-me".into(),
            access_ttl_minutes: default_access_ttl(),
            refresh_ttl_days: default_refresh_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { max_capacity: default_cache_capacity(), ttl_seconds: default_cache_ttl() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { request_timeout_seconds: default_request_timeout() }
    }
}

fn default_access_ttl() -> i64 { 60 }
fn default_refresh_ttl() -> i64 { 7 }
fn default_cache_capacity() -> u64 { 1000 }
fn default_cache_ttl() -> u64 { 300 }
fn default_request_timeout() -> u64 { 30 }

impl Settings {
    pub fn load() -> Result<Self> {
        let defaults = Settings::default();
        let settings = Config::builder()
            .set_default("jwt.secret", defaults.jwt.secret)?
            .add_source(File::with_name("campus_market").required(false))
            .add_source(Environment::with_prefix("CAMPUS").separator("__"))
            .build()?
            .try_deserialize::<Settings>()?;
        debug!(
            access_ttl_minutes = settings.jwt.access_ttl_minutes,
            refresh_ttl_days = settings.jwt.refresh_ttl_days,
            cache_ttl_seconds = settings.cache.ttl_seconds,
            "settings loaded"
        );
        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_seconds)
    }
}

pub fn build_cache(settings: &Settings) -> Cache<String, CachedData> {
    Cache::builder()
        .max_capacity(settings.cache.max_capacity)
        .time_to_live(Duration::from_secs(settings.cache.ttl_seconds))
        .build()
}

/// Initialize application state with a specific database URL
pub async fn initialize_app_state_with_url(database_url: &str) -> Result<AppState> {
    dotenvy::dotenv().ok();
    let settings = Settings::load()?;

    info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    Ok(AppState {
        db,
        cache: build_cache(&settings),
        settings: Arc::new(settings),
        hub: Arc::new(NotificationHub::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_lifetimes() {
        let settings = Settings::default();
        assert_eq!(settings.jwt.access_ttl_minutes, 60);
        assert_eq!(settings.jwt.refresh_ttl_days, 7);
        assert_eq!(settings.cache.ttl_seconds, 300);
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_sections_fall_back_to_defaults() {
        let settings: Settings = Config::builder()
            .set_default("jwt.secret", "s3cret")
            .unwrap()
            .set_default("cache.ttl_seconds", 60)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.jwt.secret, "s3cret");
        assert_eq!(settings.jwt.access_ttl_minutes, 60);
        assert_eq!(settings.cache.ttl_seconds, 60);
        assert_eq!(settings.cache.max_capacity, 1000);
    }
}
