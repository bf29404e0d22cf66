use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;

static CACHE: Mutex<Option<HashMap<String, CacheEntry>>> = Mutex::new(None);

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    fetched_at: Instant,
}

fn cache() -> MutexGuard<'static, Option<HashMap<String, CacheEntry>>> {
    CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// GETs `url`, serving a cached body younger than `ttl`. A zero `ttl` always fetches.
pub fn fetch_json_cached(
    client: &Client,
    url: &str,
    extra_headers: &[(&str, &str)],
    ttl: Duration,
) -> Result<String> {
    if let Some(body) = cached_body(url, ttl) {
        return Ok(body);
    }

    let mut req = client.get(url).header(ACCEPT, "application/json");
    for (name, value) in extra_headers {
        req = req.header(*name, *value);
    }
    let resp = req.send().with_context(|| format!("request failed: {url}"))?;
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("http {}: {}", status, body));
    }

    if !ttl.is_zero() {
        store(url, &body);
    }
    Ok(body)
}

pub fn cached_body(url: &str, ttl: Duration) -> Option<String> {
    if ttl.is_zero() {
        return None;
    }
    let guard = cache();
    let entry = guard.as_ref()?.get(url)?;
    if entry.fetched_at.elapsed() < ttl {
        Some(entry.body.clone())
    } else {
        None
    }
}

pub fn store(url: &str, body: &str) {
    let mut guard = cache();
    guard.get_or_insert_with(HashMap::new).insert(
        url.to_string(),
        CacheEntry {
            body: body.to_string(),
            fetched_at: Instant::now(),
        },
    );
}

/// Drops every entry whose URL starts with `prefix`.
pub fn invalidate(prefix: &str) {
    let mut guard = cache();
    if let Some(entries) = guard.as_mut() {
        entries.retain(|url, _| !url.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_body_served_until_invalidated() {
        let url = "http://cache.test/stored/votes/1";
        store(url, "{\"votes\":[]}");
        assert_eq!(
            cached_body(url, Duration::from_secs(60)).as_deref(),
            Some("{\"votes\":[]}")
        );
        assert!(cached_body(url, Duration::ZERO).is_none());

        invalidate("http://cache.test/stored/votes");
        assert!(cached_body(url, Duration::from_secs(60)).is_none());
    }

    #[test]
    fn invalidate_keeps_other_prefixes() {
        store("http://cache.test/keep/stats", "{}");
        store("http://cache.test/drop/stats", "{}");
        invalidate("http://cache.test/drop");
        assert!(cached_body("http://cache.test/keep/stats", Duration::from_secs(60)).is_some());
        assert!(cached_body("http://cache.test/drop/stats", Duration::from_secs(60)).is_none());
    }

    #[test]
    fn expired_entries_are_not_served() {
        let url = "http://cache.test/expired";
        store(url, "{}");
        std::thread::sleep(Duration::from_millis(20));
        assert!(cached_body(url, Duration::from_millis(5)).is_none());
    }
}
