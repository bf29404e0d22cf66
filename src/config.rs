use std::env;
use std::time::Duration;

use crate::retry::RetryPolicy;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_SITE_BASE_URL: &str = "http://localhost:5000";

/// Runtime settings, read once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_base_url: String,
    pub site_base_url: String,
    pub timeout: Duration,
    pub cache_ttl: Duration,
    pub retry: RetryPolicy,
    pub matches_poll: Duration,
    pub votes_poll: Duration,
    pub session_cookie: Option<String>,
    pub demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Reads `.env.local` then `.env` before consulting the process environment.
    pub fn load() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_env()
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let opt = |key: &str| {
            lookup(key).and_then(|val| {
                let val = val.trim().to_string();
                if val.is_empty() { None } else { Some(val) }
            })
        };
        let num = |key: &str, default: u64| {
            opt(key)
                .and_then(|val| val.parse::<u64>().ok())
                .unwrap_or(default)
        };

        let api_base_url = opt("API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let site_base_url = opt("SITE_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_SITE_BASE_URL.to_string());

        let initial_backoff = num("API_RETRY_BACKOFF_MS", 300);
        let max_backoff = num("API_RETRY_MAX_BACKOFF_MS", 2000).max(initial_backoff);
        let retry = RetryPolicy {
            max_attempts: num("API_RETRY_ATTEMPTS", 2).clamp(1, 5) as u32,
            initial_backoff: Duration::from_millis(initial_backoff),
            max_backoff: Duration::from_millis(max_backoff),
        };

        let demo = opt("FANVOTE_DEMO")
            .map(|val| matches!(val.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        Self {
            api_base_url,
            site_base_url,
            timeout: Duration::from_secs(num("API_TIMEOUT_SECS", 3).max(1)),
            cache_ttl: Duration::from_secs(num("API_CACHE_TTL_SECS", 5)),
            retry,
            matches_poll: Duration::from_secs(num("MATCHES_POLL_SECS", 30).max(10)),
            votes_poll: Duration::from_secs(num("VOTES_POLL_SECS", 15).max(5)),
            session_cookie: opt("SESSION_COOKIE"),
            demo,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::default();
        assert_eq!(cfg.api_base_url, "http://localhost:8080/api");
        assert_eq!(cfg.site_base_url, "http://localhost:5000");
        assert_eq!(cfg.timeout, Duration::from_secs(3));
        assert_eq!(cfg.cache_ttl, Duration::from_secs(5));
        assert_eq!(cfg.retry.max_attempts, 2);
        assert_eq!(cfg.matches_poll, Duration::from_secs(30));
        assert_eq!(cfg.votes_poll, Duration::from_secs(15));
        assert!(cfg.session_cookie.is_none());
        assert!(!cfg.demo);
    }

    #[test]
    fn clamps_and_ignores_garbage() {
        let cfg = config_from(&[
            ("API_BASE_URL", "http://votes.test/api/"),
            ("API_TIMEOUT_SECS", "0"),
            ("API_RETRY_ATTEMPTS", "42"),
            ("API_RETRY_BACKOFF_MS", "500"),
            ("API_RETRY_MAX_BACKOFF_MS", "100"),
            ("MATCHES_POLL_SECS", "1"),
            ("VOTES_POLL_SECS", "soon"),
            ("SESSION_COOKIE", "  "),
            ("FANVOTE_DEMO", "True"),
        ]);
        assert_eq!(cfg.api_base_url, "http://votes.test/api");
        assert_eq!(cfg.timeout, Duration::from_secs(1));
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.max_backoff, Duration::from_millis(500));
        assert_eq!(cfg.matches_poll, Duration::from_secs(10));
        assert_eq!(cfg.votes_poll, Duration::from_secs(15));
        assert!(cfg.session_cookie.is_none());
        assert!(cfg.demo);
    }
}
