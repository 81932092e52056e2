use std::time::Duration;

/// Base URL override.
pub const BASE_URL_ENV: &str = "TRACKER_API_BASE_URL";
/// Request timeout override, in whole seconds.
pub const TIMEOUT_ENV: &str = "TRACKER_API_TIMEOUT_SECS";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the API lives and how long a request may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Applies to every request; expiry fails the request as a network error.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_env() -> Self {
        let base_url = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout = match std::env::var(TIMEOUT_ENV) {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %raw, "ignoring invalid {}", TIMEOUT_ENV);
                    DEFAULT_TIMEOUT
                }
            },
            Err(_) => DEFAULT_TIMEOUT,
        };

        Self { base_url, timeout }
    }

    /// Absolute URL of `path` below the base.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_with_exactly_one_slash() {
        let cfg = ClientConfig::new("http://host/api/");
        assert_eq!(cfg.endpoint("/auth/login"), "http://host/api/auth/login");
        assert_eq!(cfg.endpoint("init/status"), "http://host/api/init/status");
    }

    #[test]
    fn defaults_match_the_browser_client() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.with_timeout(Duration::from_secs(5)).timeout, Duration::from_secs(5));
    }
}
