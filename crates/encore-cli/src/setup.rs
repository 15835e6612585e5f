//! Config loading and construction of the shared runtime pieces.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use encore_common::AppEvents;
use encore_config::schema::{RealtimeSection, SocketSection};
use encore_config::EncoreConfig;
use encore_sync::streaks::StreakSource;
use encore_sync::{
    FileStore, HttpRateSource, HttpStreakSource, KeyValueStore, MemorySource, MemoryStore,
    RateSource, RealtimeClient, RealtimeConfig, RealtimeSource, SocketSettings,
};
use tracing::{info, warn};

/// A config plus the reason it fell back to defaults, if it did.
pub struct LoadedConfig {
    pub config: EncoreConfig,
    pub warning: Option<String>,
}

/// Load from `path` or the platform default. Errors fall back to the
/// default config; the warning is kept so it can be logged once logging
/// is up.
pub fn load_config(path: Option<&Path>) -> LoadedConfig {
    let result = match path {
        Some(path) => encore_config::load_config_from(path),
        None => encore_config::load_config(),
    };
    match result {
        Ok(config) => LoadedConfig {
            config,
            warning: None,
        },
        Err(e) => LoadedConfig {
            config: EncoreConfig::default(),
            warning: Some(e.to_string()),
        },
    }
}

pub fn realtime_config(section: &RealtimeSection) -> RealtimeConfig {
    RealtimeConfig {
        database_url: section.database_url.clone(),
        auth_token: section.auth_token.clone(),
        connect_timeout_secs: u64::from(section.connect_timeout_secs),
        reconnect_delay_secs: u64::from(section.reconnect_delay_secs),
        max_reconnect_delay_secs: u64::from(section.max_reconnect_delay_secs),
    }
}

pub fn socket_settings(section: &SocketSection) -> SocketSettings {
    SocketSettings {
        base_url: section.base_url.clone(),
        endpoint: section.endpoint.clone(),
        inbound_queue: section.inbound_queue.clone(),
        send_destination: section.send_destination.clone(),
        connect_timeout: Duration::from_secs(u64::from(section.connect_timeout_secs)),
    }
}

/// Everything the watchers share.
pub struct Runtime {
    pub source: Arc<dyn RealtimeSource>,
    /// Set when running against the in-process database.
    pub memory: Option<MemorySource>,
    pub store: Arc<dyn KeyValueStore>,
    pub events: Arc<AppEvents>,
    pub streak_source: Option<Arc<dyn StreakSource>>,
    pub rate_source: Option<Arc<dyn RateSource>>,
    pub token: Option<String>,
}

impl Runtime {
    /// Demo mode, or a config without a database URL, uses an in-process
    /// database and an in-memory cache. Network clients are only built
    /// outside demo mode, and the HTTP streak source only with a token.
    pub fn build(
        config: &EncoreConfig,
        demo: bool,
        token: Option<String>,
    ) -> encore_common::Result<Self> {
        let events = Arc::new(AppEvents::default());

        if demo || config.realtime.database_url.is_empty() {
            if !demo {
                warn!("No realtime database_url configured, running in demo mode");
            }
            let memory = MemorySource::new();
            return Ok(Self {
                source: Arc::new(memory.clone()),
                memory: Some(memory),
                store: Arc::new(MemoryStore::new()),
                events,
                streak_source: None,
                rate_source: None,
                token: None,
            });
        }

        let client = RealtimeClient::new(realtime_config(&config.realtime))?;
        let streak_source = match &token {
            Some(token) => {
                let source = HttpStreakSource::new(
                    config.api.base_url.as_str(),
                    token.as_str(),
                    Duration::from_secs(u64::from(config.api.request_timeout_secs)),
                )?;
                Some(Arc::new(source) as Arc<dyn StreakSource>)
            }
            None => None,
        };

        let rate_source = if config.api.exchange_rate_url.is_empty() {
            None
        } else {
            let source = HttpRateSource::new(
                config.api.exchange_rate_url.as_str(),
                Duration::from_secs(u64::from(config.api.request_timeout_secs)),
            )?;
            Some(Arc::new(source) as Arc<dyn RateSource>)
        };

        Ok(Self {
            source: Arc::new(client),
            memory: None,
            store: open_store(config),
            events,
            streak_source,
            rate_source,
            token,
        })
    }
}

/// File-backed cache under the configured directory, or an in-memory one
/// when the directory is unusable.
fn open_store(config: &EncoreConfig) -> Arc<dyn KeyValueStore> {
    let opened = encore_config::cache_dir(config)
        .map_err(|e| e.to_string())
        .and_then(|dir| FileStore::open(dir).map_err(|e| e.to_string()));
    match opened {
        Ok(store) => {
            info!(dir = %store.dir().display(), "Using file cache");
            Arc::new(store)
        }
        Err(e) => {
            warn!(error = %e, "Cache directory unavailable, caching in memory");
            Arc::new(MemoryStore::new())
        }
    }
}
