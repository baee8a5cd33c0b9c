//! Request-related types and error definitions

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::config::RequestConfig;

/// HTTP methods used against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a request for cancellation and caching: `(method, endpoint, body)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<String>,
}

impl RequestKey {
    pub fn new(method: Method, endpoint: impl Into<String>, body: Option<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body,
        }
    }

    /// Key of a body-less GET, the only kind of request that gets cached
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint, None)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.endpoint)
    }
}

/// Per-call execution policy
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// Limit for a single attempt
    pub timeout: Duration,
    /// Additional attempts after the first one
    pub retries: u32,
    /// Base backoff; attempt n waits `retry_delay * 2^(n-1)`
    pub retry_delay: Duration,
    /// Time-to-live for cached GET responses, `None` disables caching
    pub cache_ttl: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 3,
            retry_delay: Duration::from_millis(1000),
            cache_ttl: Some(Duration::from_secs(30)),
        }
    }
}

impl RequestOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32, retry_delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache_ttl = None;
        self
    }
}

impl From<&RequestConfig> for RequestOptions {
    fn from(config: &RequestConfig) -> Self {
        Self {
            timeout: config.timeout,
            retries: config.retries,
            retry_delay: config.retry_delay,
            cache_ttl: Some(config.cache_ttl),
        }
    }
}

/// Coarse classification of a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// No usable response: network failure, abort, timeout
    Transport,
    /// 5xx from the store
    Server,
    /// 4xx or a response the store itself flagged as unsuccessful
    Client,
}

/// Errors raised by the request client
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Request aborted")]
    Aborted,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Rejected by store: {0}")]
    Rejected(String),

    #[error("Invalid payload: {0}")]
    Decode(String),
}

impl RequestError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RequestError::Network(_) | RequestError::Timeout | RequestError::Aborted => {
                ErrorClass::Transport
            }
            RequestError::Http { status, .. } if *status >= 500 => ErrorClass::Server,
            RequestError::Http { .. } | RequestError::Rejected(_) | RequestError::Decode(_) => {
                ErrorClass::Client
            }
        }
    }

    /// Transport failures, 5xx and 408 are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            RequestError::Http { status: 408, .. } => true,
            _ => matches!(self.class(), ErrorClass::Transport | ErrorClass::Server),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
