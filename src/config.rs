//! Client configuration.

use std::time::Duration;

use crate::error::{ApiError, ApiResult};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.monopiter.ru/api";

/// Retry schedule for background polling.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Delay before the first retry. Default: 1s
    pub base_delay: Duration,
    /// Upper bound for any single delay. Default: 30s
    pub max_delay: Duration,
    /// Retries after the initial attempt. Default: 3
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based): `min(base * 2^attempt, max)`.
    ///
    /// ```
    /// use std::time::Duration;
    /// use route_viewer::RetryConfig;
    ///
    /// let retry = RetryConfig::default();
    /// assert_eq!(retry.delay_for(0), Duration::from_secs(1));
    /// assert_eq!(retry.delay_for(2), Duration::from_secs(4));
    /// assert_eq!(retry.delay_for(10), Duration::from_secs(30));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Configuration for [`TrackerClient`](crate::http::TrackerClient) and the poller.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// API root, without trailing slash. Default: `https://api.monopiter.ru/api`
    pub base_url: String,
    /// Per-request timeout. Default: 30s
    pub request_timeout: Duration,
    /// Active users refresh interval. Default: 20s
    pub poll_interval: Duration,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(20),
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults pointed at another API root.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `ROUTE_VIEWER_BASE_URL` and `ROUTE_VIEWER_TIMEOUT_SECS`.
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ApiResult<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup("ROUTE_VIEWER_BASE_URL") {
            config.base_url = url;
        }
        if let Some(raw) = lookup("ROUTE_VIEWER_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ApiError::InvalidConfig(format!("ROUTE_VIEWER_TIMEOUT_SECS is not a number: {}", raw))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ApiResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ApiError::InvalidConfig("base URL is empty".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(ApiError::InvalidConfig("request timeout must be positive".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ApiError::InvalidConfig("poll interval must be positive".into()));
        }
        Ok(())
    }

    /// Absolute URL for an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
