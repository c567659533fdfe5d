//! Client configuration

use crate::error::{MeshyError, Result};
use crate::transport::DEFAULT_REQUEST_TIMEOUT;
use std::env;
use std::time::Duration;

/// Default API host
pub const DEFAULT_DOMAIN: &str = "api.meshy.ai";

/// Default delay between two status polls
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(500);

/// Settings shared by every request a client makes
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host (optionally with scheme and port) of the API
    pub domain: String,
    /// Delay between polls of a pending or running task
    pub polling_interval: Duration,
    /// Delay after a 429; `None` means twice the polling interval
    pub rate_limit_backoff: Option<Duration>,
    /// Timeout applied to each HTTP request
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            polling_interval: DEFAULT_POLLING_INTERVAL,
            rate_limit_backoff: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: format!("meshy-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `MESHY_DOMAIN`, `MESHY_POLL_INTERVAL_MS` and
    /// `MESHY_REQUEST_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(domain) = env::var("MESHY_DOMAIN") {
            if !domain.trim().is_empty() {
                config.domain = domain;
            }
        }
        if let Some(ms) = parse_var::<u64>("MESHY_POLL_INTERVAL_MS")? {
            config.polling_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>("MESHY_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    pub fn with_rate_limit_backoff(mut self, backoff: Duration) -> Self {
        self.rate_limit_backoff = Some(backoff);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// A domain must look like a host name or carry a port
    pub fn validate(&self) -> Result<()> {
        let domain = self.domain.trim();
        if !domain.contains('.') && !domain.contains(':') {
            return Err(MeshyError::Config(format!(
                "Invalid domain '{}'",
                self.domain
            )));
        }
        Ok(())
    }

    /// `https://{domain}`, or the domain itself if it carries a scheme
    pub fn base_url(&self) -> String {
        let domain = self.domain.trim().trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        }
    }

    /// Delay before retrying after a 429; the server's `Retry-After`
    /// wins when it is longer
    pub fn rate_limit_delay(&self, retry_after: Option<Duration>) -> Duration {
        let backoff = self
            .rate_limit_backoff
            .unwrap_or(self.polling_interval * 2);
        retry_after.map_or(backoff, |server| server.max(backoff))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| MeshyError::Config(format!("{} must be a number, got '{}'", name, value))),
        Err(_) => Ok(None),
    }
}
