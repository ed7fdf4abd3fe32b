//! Hub connection configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! The hub origin and path are fixed per deployment. In development the hub
//! runs as a separate backend process on `localhost:3209`; production must
//! point `HUBCHAT_BASE_URL` at the real hub origin.

use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3209";
pub const DEFAULT_HUB_PATH: &str = "/messenger/hub";
pub const DEFAULT_RECONNECT_DELAYS_MS: [u64; 4] = [0, 2_000, 10_000, 30_000];
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SERVER_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_KEEPALIVE_SECS: u64 = 15;

/// Error building a [`HubConfig`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid {var}: {reason}")]
    Parse { var: &'static str, reason: String },
    /// The base URL is not an `http://` or `https://` origin.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Transport kinds in negotiation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Persistent full-duplex socket.
    WebSockets,
    /// Server-push event stream with HTTP POST for outbound frames.
    ServerSentEvents,
}

impl TransportKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "websockets" | "ws" => Some(Self::WebSockets),
            "sse" | "serversentevents" => Some(Self::ServerSentEvents),
            _ => None,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebSockets => f.write_str("websockets"),
            Self::ServerSentEvents => f.write_str("sse"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Hub origin, without trailing slash.
    pub base_url: String,
    /// Path of the hub endpoint on the origin.
    pub hub_path: String,
    /// Transports to try, most preferred first.
    pub transports: Vec<TransportKind>,
    /// Delay before each automatic reconnect attempt. Length is the attempt count.
    pub reconnect_delays: Vec<Duration>,
    /// Hard limit on `connect`, independent of the transport's own handshake timeout.
    pub connect_timeout: Duration,
    /// Time allowed for one transport to open and complete the handshake.
    pub handshake_timeout: Duration,
    /// Silence from the hub longer than this marks the link as lost.
    pub server_timeout: Duration,
    /// Interval between keepalive pings.
    pub keepalive_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl HubConfig {
    /// Config for `base_url` with every other field at its default.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            hub_path: DEFAULT_HUB_PATH.to_owned(),
            transports: vec![TransportKind::WebSockets, TransportKind::ServerSentEvents],
            reconnect_delays: DEFAULT_RECONNECT_DELAYS_MS.iter().copied().map(Duration::from_millis).collect(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            server_timeout: Duration::from_secs(DEFAULT_SERVER_TIMEOUT_SECS),
            keepalive_interval: Duration::from_secs(DEFAULT_KEEPALIVE_SECS),
        }
    }

    /// Build typed hub config from environment variables.
    ///
    /// Optional:
    /// - `HUBCHAT_BASE_URL`: default `http://localhost:3209`
    /// - `HUBCHAT_HUB_PATH`: default `/messenger/hub`
    /// - `HUBCHAT_TRANSPORTS`: comma list of `websockets`, `sse`
    /// - `HUBCHAT_RECONNECT_DELAYS_MS`: comma list, default `0,2000,10000,30000`
    /// - `HUBCHAT_CONNECT_TIMEOUT_SECS`: default 30
    /// - `HUBCHAT_HANDSHAKE_TIMEOUT_SECS`: default 30
    /// - `HUBCHAT_SERVER_TIMEOUT_SECS`: default 30
    /// - `HUBCHAT_KEEPALIVE_SECS`: default 15
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("HUBCHAT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let mut config = Self::new(&base_url);

        if let Ok(path) = std::env::var("HUBCHAT_HUB_PATH") {
            config.hub_path = normalize_path(&path);
        }
        if let Ok(raw) = std::env::var("HUBCHAT_TRANSPORTS") {
            config.transports = parse_transports(&raw)?;
        }
        if let Ok(raw) = std::env::var("HUBCHAT_RECONNECT_DELAYS_MS") {
            config.reconnect_delays = parse_delays(&raw)?;
        }
        config.connect_timeout = env_secs("HUBCHAT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?;
        config.handshake_timeout = env_secs("HUBCHAT_HANDSHAKE_TIMEOUT_SECS", DEFAULT_HANDSHAKE_TIMEOUT_SECS)?;
        config.server_timeout = env_secs("HUBCHAT_SERVER_TIMEOUT_SECS", DEFAULT_SERVER_TIMEOUT_SECS)?;
        config.keepalive_interval = env_secs("HUBCHAT_KEEPALIVE_SECS", DEFAULT_KEEPALIVE_SECS)?;

        config.validate()?;
        Ok(config)
    }

    /// Check values the transport cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] for a non-HTTP origin and
    /// [`ConfigError::Parse`] for a zero keepalive interval or server timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ws_base()?;
        require_nonzero("HUBCHAT_KEEPALIVE_SECS", self.keepalive_interval)?;
        require_nonzero("HUBCHAT_SERVER_TIMEOUT_SECS", self.server_timeout)?;
        Ok(())
    }

    /// Full HTTP URL of the hub endpoint.
    #[must_use]
    pub fn hub_url(&self) -> String {
        format!("{}{}", self.base_url, normalize_path(&self.hub_path))
    }

    /// Hub endpoint with the scheme switched to `ws://` or `wss://`.
    pub fn ws_url(&self) -> Result<String, ConfigError> {
        Ok(format!("{}{}", self.ws_base()?, normalize_path(&self.hub_path)))
    }

    fn ws_base(&self) -> Result<String, ConfigError> {
        if let Some(rest) = self.base_url.strip_prefix("http://") {
            return Ok(format!("ws://{rest}"));
        }
        if let Some(rest) = self.base_url.strip_prefix("https://") {
            return Ok(format!("wss://{rest}"));
        }
        Err(ConfigError::InvalidBaseUrl(self.base_url.clone()))
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_transports(raw: &str) -> Result<Vec<TransportKind>, ConfigError> {
    let mut kinds = Vec::new();
    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let kind = TransportKind::parse(part).ok_or_else(|| ConfigError::Parse {
            var: "HUBCHAT_TRANSPORTS",
            reason: format!("unknown transport '{}'", part.trim()),
        })?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(ConfigError::Parse { var: "HUBCHAT_TRANSPORTS", reason: "no transports listed".into() });
    }
    Ok(kinds)
}

fn parse_delays(raw: &str) -> Result<Vec<Duration>, ConfigError> {
    raw.split(',')
        .filter(|p| !p.trim().is_empty())
        .map(|part| {
            part.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ConfigError::Parse { var: "HUBCHAT_RECONNECT_DELAYS_MS", reason: e.to_string() })
        })
        .collect()
}

fn require_nonzero(var: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::Parse { var, reason: "must be greater than zero".into() });
    }
    Ok(())
}

fn env_secs(var: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Parse { var, reason: e.to_string() }),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
