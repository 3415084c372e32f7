//! Client configuration.
//!
//! `ClientConfig` and its builder describe where the backend lives and how
//! the HTTP client talks to it. Defaults come from the environment so a
//! deployment can point the client elsewhere without code changes.

use crate::defaults;
use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL, without a trailing slash.
    pub base_url: String,
    /// Total request timeout. `None` lets streams run until cancelled.
    #[serde(with = "duration_option_serde")]
    pub timeout: Option<Duration>,
    /// Connection timeout
    #[serde(with = "duration_option_serde")]
    pub connect_timeout: Option<Duration>,
    /// Headers sent with every request
    pub headers: HashMap<String, String>,
    /// User agent
    pub user_agent: Option<String>,
    /// Send `Accept-Encoding: identity` on streaming requests so proxies do
    /// not buffer compressed event streams.
    pub stream_disable_compression: bool,
}

/// Builder for `ClientConfig`
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    headers: HashMap<String, String>,
    user_agent: Option<String>,
    stream_disable_compression: Option<bool>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
    pub fn connect_timeout(mut self, connect_timeout: Option<Duration>) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
    pub fn user_agent<S: Into<String>>(mut self, user_agent: Option<S>) -> Self {
        self.user_agent = user_agent.map(|s| s.into());
        self
    }
    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
    pub fn stream_disable_compression(mut self, val: bool) -> Self {
        self.stream_disable_compression = Some(val);
        self
    }

    /// Build the configuration, validating the base URL.
    pub fn build(self) -> Result<ClientConfig> {
        let defaults = ClientConfig::default();
        let base_url = normalize_base_url(&self.base_url.unwrap_or(defaults.base_url))?;
        Ok(ClientConfig {
            base_url,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout.or(defaults.connect_timeout),
            headers: self.headers,
            user_agent: self.user_agent.or(defaults.user_agent),
            stream_disable_compression: self
                .stream_disable_compression
                .unwrap_or(defaults.stream_disable_compression),
        })
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Join an absolute API path (`/api/...`) onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build the `reqwest::Client` described by this configuration.
    pub fn build_http_client(&self) -> Result<reqwest::Client> {
        let mut headers = reqwest::header::HeaderMap::new();
        for (k, v) in &self.headers {
            let name = reqwest::header::HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| ChatError::Config(format!("invalid header name '{k}': {e}")))?;
            let value = reqwest::header::HeaderValue::from_str(v)
                .map_err(|e| ChatError::Config(format!("invalid header value for '{k}': {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = self.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        if let Some(ua) = &self.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        builder
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {e}")))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        let base_url = defaults::http::BACKEND_URL_ENV
            .iter()
            .find_map(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| defaults::http::BACKEND_URL.to_string());
        let sdc = match std::env::var(defaults::http::STREAM_DISABLE_COMPRESSION_ENV) {
            Ok(val) => {
                let v = val.trim().to_lowercase();
                !(v == "false" || v == "0" || v == "off" || v == "no")
            }
            Err(_) => true,
        };
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            timeout: None,
            connect_timeout: Some(defaults::http::CONNECT_TIMEOUT),
            headers: HashMap::new(),
            user_agent: Some(defaults::http::USER_AGENT.to_string()),
            stream_disable_compression: sdc,
        }
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed)
        .map_err(|e| ChatError::Config(format!("invalid base URL '{raw}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ChatError::Config(format!(
            "unsupported base URL scheme '{}'",
            parsed.scheme()
        )));
    }
    Ok(trimmed.to_string())
}

// Duration (de)serialization as whole seconds
mod duration_option_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => d.as_secs().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
