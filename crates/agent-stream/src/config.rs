use std::time::Duration;

use crate::errors::ClientError;
use crate::frame::DEFAULT_MAX_PARTIAL_BYTES;

const DEFAULT_BASE_URL: &str = "http://localhost:7777";

/// Connection settings for the HTTP event source.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the agent backend.
    pub base_url: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Deadline for a whole streamed run, body included.
    pub timeout: Duration,
    /// Deadline for establishing the connection.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Creates a config with defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Builds a config from the environment.
    ///
    /// - `AGENT_STREAM_BASE_URL` (default `http://localhost:7777`)
    /// - `AGENT_STREAM_API_KEY` (optional)
    /// - `AGENT_STREAM_TIMEOUT_SECS` (default 300)
    /// - `AGENT_STREAM_CONNECT_TIMEOUT_SECS` (default 10)
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ClientError> {
        let mut config = Self::default();
        if let Some(base_url) = lookup("AGENT_STREAM_BASE_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = base_url.trim().to_string();
        }
        config.api_key = lookup("AGENT_STREAM_API_KEY").filter(|v| !v.trim().is_empty());
        if let Some(secs) = parse_secs(&lookup, "AGENT_STREAM_TIMEOUT_SECS")? {
            config.timeout = secs;
        }
        if let Some(secs) = parse_secs(&lookup, "AGENT_STREAM_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout = secs;
        }
        Ok(config)
    }

    /// Overrides the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the bearer token.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Overrides the run timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>, ClientError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let secs: u64 = raw.trim().parse().map_err(|_| {
        ClientError::Config(format!(
            "{key} must be a whole number of seconds, got {raw:?}"
        ))
    })?;
    if secs == 0 {
        return Err(ClientError::Config(format!("{key} must be greater than 0")));
    }
    Ok(Some(Duration::from_secs(secs)))
}

/// Per-session runtime options.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RunOptions {
    /// Bounded event buffer size between the session task and the consumer.
    pub stream_buffer_capacity: usize,
    /// Largest unterminated event, in bytes, kept while waiting for its closing brace.
    pub max_partial_bytes: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            stream_buffer_capacity: 128,
            max_partial_bytes: DEFAULT_MAX_PARTIAL_BYTES,
        }
    }
}
