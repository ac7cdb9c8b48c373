//! Relay configuration.

use std::fmt;
use std::time::Duration;

use chatrelay_core::frame::DEFAULT_MAX_LINE_LEN;
use chatrelay_core::guard::AllowList;
use tracing::error;

use crate::error::AppError;

/// Upstream streaming endpoint used when none is configured.
pub const DEFAULT_UPSTREAM_URL: &str = "https://api-enterprise.personal.ai/v1/message/stream";

/// Configuration for the relay, built once at startup and shared read-only.
#[derive(Clone)]
pub struct RelayConfig {
    /// Upstream API key, sent as `x-api-key`.
    pub api_key: Option<String>,
    /// Domain identifier injected into every upstream request.
    pub domain_name: Option<String>,
    /// Upstream streaming endpoint.
    pub upstream_url: String,
    /// Origin/referer access policy.
    pub allow_list: AllowList,
    /// Upstream connect timeout. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Upstream per-read timeout while streaming. `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
    /// Longest upstream line relayed, in bytes. Longer lines are dropped.
    pub max_line_len: usize,
}

/// Credentials required to call the upstream service.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamCredentials<'a> {
    pub api_key: &'a str,
    pub domain_name: &'a str,
}

impl RelayConfig {
    /// A configuration with no credentials, the default upstream URL and the
    /// given allow-list.
    pub fn new(allow_list: AllowList) -> Self {
        Self {
            api_key: None,
            domain_name: None,
            upstream_url: DEFAULT_UPSTREAM_URL.into(),
            allow_list,
            connect_timeout: None,
            read_timeout: None,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    /// Returns the upstream credentials, or a configuration error if either
    /// is missing or empty.
    pub fn credentials(&self) -> Result<UpstreamCredentials<'_>, AppError> {
        let Some(api_key) = self.api_key.as_deref().filter(|k| !k.is_empty()) else {
            error!("PERSONAL_AI_API_KEY not configured");
            return Err(AppError::Configuration("PERSONAL_AI_API_KEY"));
        };
        let Some(domain_name) = self.domain_name.as_deref().filter(|d| !d.is_empty()) else {
            error!("DOMAIN_NAME not configured");
            return Err(AppError::Configuration("DOMAIN_NAME"));
        };
        Ok(UpstreamCredentials {
            api_key,
            domain_name,
        })
    }

    /// Build the shared HTTP client for upstream calls.
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = self.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        builder.build()
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("domain_name", &self.domain_name)
            .field("upstream_url", &self.upstream_url)
            .field("allow_list", &self.allow_list)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("max_line_len", &self.max_line_len)
            .finish()
    }
}
