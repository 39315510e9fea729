use std::env;
use std::time::Duration;

/// API client configuration.
///
/// Reads from the `PIT_API_URL` and `PIT_API_TIMEOUT_SECS` environment
/// variables, falling back to a local development server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// API root, without a trailing slash.
    pub api_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ApiConfig {
    /// The default API root used when no environment variable is set.
    pub const DEFAULT_URL: &str = "http://localhost:8000/api";

    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Build a config from the environment.
    pub fn from_env() -> Self {
        let api_url = env::var("PIT_API_URL").unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        let timeout = env::var("PIT_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Self::DEFAULT_TIMEOUT);
        Self::new(api_url).with_timeout(timeout)
    }

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_owned(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Absolute URL for an API-relative `path`.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.api_url, path)
        } else {
            format!("{}/{}", self.api_url, path)
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
