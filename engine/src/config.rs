//! Engine and store configuration
//!
//! Configuration is loaded from environment variables. Unset or unparsable
//! values fall back to the defaults below.

use std::env;
use std::time::Duration;

use crate::gesture::{DeviceClass, GestureSettings};

/// Top-level configuration shared by the editor and the `overlay-store` binary
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Allowed CORS origins; empty means any
    pub cors_origins: Vec<String>,
    /// Base URL of the overlay store API, including the `/api` prefix
    pub api_base_url: String,
    /// Insert the sample overlays at startup
    pub seed_sample_data: bool,

    /// Request client policy
    pub request: RequestConfig,

    /// Persistence queue configuration
    pub persistence: PersistenceConfig,

    /// Device class selecting the size bounds
    pub device: DeviceClass,
}

/// Timeout, retry and caching policy of the request client
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub retries: u32,
    /// Base backoff delay, doubled per retry
    pub retry_delay: Duration,
    /// Lifetime of cached GET responses
    pub cache_ttl: Duration,
    /// Maximum number of cached responses
    pub cache_max_entries: u64,
}

/// Debounced persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Quiet period before a coalesced update is sent
    pub debounce: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            cors_origins: Vec::new(),
            api_base_url: "http://127.0.0.1:5000/api".to_string(),
            seed_sample_data: false,
            request: RequestConfig::default(),
            persistence: PersistenceConfig::default(),
            device: DeviceClass::default(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 3,
            retry_delay: Duration::from_millis(1000),
            cache_ttl: Duration::from_secs(30),
            cache_max_entries: 256,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        // Server config
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty() && *o != "*")
                .map(String::from)
                .collect();
        }
        if let Some(url) = lookup("OVERLAY_API_URL")
            && !url.is_empty()
        {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(val) = lookup("SEED_SAMPLE_DATA") {
            config.seed_sample_data = val.to_lowercase() == "true" || val == "1";
        }

        // Request config
        if let Some(val) = lookup("REQUEST_TIMEOUT_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.request.timeout = Duration::from_millis(ms);
        }
        if let Some(val) = lookup("REQUEST_RETRIES")
            && let Ok(n) = val.parse()
        {
            config.request.retries = n;
        }
        if let Some(val) = lookup("REQUEST_RETRY_DELAY_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.request.retry_delay = Duration::from_millis(ms);
        }
        if let Some(val) = lookup("RESPONSE_CACHE_TTL_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.request.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(val) = lookup("RESPONSE_CACHE_MAX_ENTRIES")
            && let Ok(n) = val.parse()
        {
            config.request.cache_max_entries = n;
        }

        // Persistence config
        if let Some(val) = lookup("PERSIST_DEBOUNCE_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.persistence.debounce = Duration::from_millis(ms);
        }

        // Device config
        if let Some(val) = lookup("DEVICE_CLASS")
            && let Some(device) = DeviceClass::parse(&val)
        {
            config.device = device;
        }

        config
    }

    /// Gesture timings and bounds for the configured device class
    pub fn gesture_settings(&self) -> GestureSettings {
        GestureSettings::for_device(self.device)
    }
}
