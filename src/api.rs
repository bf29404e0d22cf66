use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::COOKIE;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::Config;
use crate::formation::DEFAULT_FORMATION;
use crate::http_cache::{self, fetch_json_cached};
use crate::http_client::http_client;
use crate::provider::DataSource;
use crate::retry::RetryPolicy;
use crate::state::{
    Comment, CommentId, GlobalStats, MatchId, MatchesPage, Player, PlayerId, UserInfo, VoteStatus,
};

/// Acknowledgement returned by write endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Talks to the voting backend (`api_base_url`) and the site API (`site_base_url`).
#[derive(Debug, Clone)]
pub struct ApiClient {
    api_base: String,
    site_base: String,
    timeout: Duration,
    cache_ttl: Duration,
    retry: RetryPolicy,
    session_cookie: Option<String>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            api_base: config.api_base_url.clone(),
            site_base: config.site_base_url.clone(),
            timeout: config.timeout,
            cache_ttl: config.cache_ttl,
            retry: config.retry,
            session_cookie: config.session_cookie.clone(),
        }
    }

    fn client(&self) -> Result<&'static Client> {
        http_client(self.timeout)
    }

    fn votes_url(&self, match_id: MatchId) -> String {
        format!("{}/votes/{match_id}", self.api_base)
    }

    fn comments_url(&self, match_id: MatchId) -> String {
        format!("{}/api/matches/{match_id}/comments", self.site_base)
    }

    fn get_api(&self, url: &str) -> Result<String> {
        let client = self.client()?;
        self.retry
            .run(|_| fetch_json_cached(client, url, &[], self.cache_ttl))
    }

    fn get_site(&self, url: &str) -> Result<String> {
        self.get_site_with(url, self.retry)
    }

    fn get_site_with(&self, url: &str, retry: RetryPolicy) -> Result<String> {
        let client = self.client()?;
        let cookie = self.session_cookie.as_deref();
        let headers: Vec<(&str, &str)> = cookie.map(|c| ("Cookie", c)).into_iter().collect();
        retry.run(|_| fetch_json_cached(client, url, &headers, self.cache_ttl))
    }

    fn with_cookie(&self, req: RequestBuilder) -> RequestBuilder {
        match self.session_cookie.as_deref() {
            Some(cookie) => req.header(COOKIE, cookie),
            None => req,
        }
    }

    fn send_write(&self, req: RequestBuilder) -> Result<ApiMessage> {
        let resp = req.send().context("request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            let reason = error_message(&body).unwrap_or(body);
            return Err(anyhow::anyhow!("http {}: {}", status, reason));
        }
        parse_api_message_json(&body)
    }

    pub fn matches_page(&self) -> Result<MatchesPage> {
        let body = self
            .get_api(&format!("{}/matches-page", self.api_base))
            .context("matches page")?;
        parse_matches_page_json(&body)
    }

    pub fn players(&self) -> Result<Vec<Player>> {
        let body = self
            .get_api(&format!("{}/players", self.api_base))
            .context("players")?;
        parse_players_json(&body)
    }

    pub fn votes(&self, match_id: MatchId) -> Result<HashMap<PlayerId, u32>> {
        let body = self
            .get_api(&self.votes_url(match_id))
            .with_context(|| format!("votes for match {match_id}"))?;
        parse_votes_json(&body)
    }

    /// The site's own counters first, the voting backend's when the site has none.
    pub fn stats(&self) -> Result<GlobalStats> {
        let site = self
            .get_site_with(&self.site_stats_url(), RetryPolicy::once())
            .and_then(|body| parse_stats_json(&body));
        if let Ok(stats) = site {
            return Ok(stats);
        }
        let body = self
            .get_api(&format!("{}/stats", self.api_base))
            .context("stats")?;
        parse_stats_json(&body)
    }

    fn site_stats_url(&self) -> String {
        format!("{}/api/flask-stats", self.site_base)
    }

    /// Sent once; a vote is not idempotent.
    pub fn submit_vote(&self, match_id: MatchId, player_id: PlayerId) -> Result<ApiMessage> {
        let client = self.client()?;
        let req = client
            .post(format!("{}/vote", self.api_base))
            .json(&json!({ "player_id": player_id, "match_id": match_id }));
        let result = self.send_write(req);
        http_cache::invalidate(&self.votes_url(match_id));
        http_cache::invalidate(&format!("{}/stats", self.api_base));
        http_cache::invalidate(&self.site_stats_url());
        http_cache::invalidate(&format!("{}/api/profile/votes", self.site_base));
        result
    }

    /// Blank formations fall back to the default template, as the backend does.
    pub fn create_match(
        &self,
        team1: &str,
        team2: &str,
        home_formation: &str,
        away_formation: &str,
    ) -> Result<ApiMessage> {
        let (team1, team2) = (team1.trim(), team2.trim());
        if team1.is_empty() || team2.is_empty() {
            return Err(anyhow::anyhow!("Both teams are required"));
        }
        let formation = |name: &str| match name.trim() {
            "" => DEFAULT_FORMATION.to_string(),
            name => name.to_string(),
        };
        let client = self.client()?;
        let req = client.post(format!("{}/matches/add", self.api_base)).json(&json!({
            "team1": team1,
            "team2": team2,
            "team1_formation": formation(home_formation),
            "team2_formation": formation(away_formation),
        }));
        let result = self.send_write(req);
        http_cache::invalidate(&format!("{}/matches-page", self.api_base));
        http_cache::invalidate(&format!("{}/stats", self.api_base));
        http_cache::invalidate(&self.site_stats_url());
        result
    }

    pub fn comments(&self, match_id: MatchId) -> Result<Vec<Comment>> {
        let body = self
            .get_site(&self.comments_url(match_id))
            .with_context(|| format!("comments for match {match_id}"))?;
        parse_comments_json(&body)
    }

    pub fn add_comment(&self, match_id: MatchId, text: &str) -> Result<ApiMessage> {
        let text = text.trim();
        if text.is_empty() {
            return Err(anyhow::anyhow!("Comment text is required"));
        }
        let client = self.client()?;
        let req = self.with_cookie(
            client
                .post(self.comments_url(match_id))
                .json(&json!({ "comment_text": text })),
        );
        let result = self.send_write(req);
        http_cache::invalidate(&self.comments_url(match_id));
        result
    }

    pub fn delete_comment(&self, comment_id: CommentId) -> Result<ApiMessage> {
        let client = self.client()?;
        let req = self.with_cookie(
            client.delete(format!("{}/api/comments/{comment_id}", self.site_base)),
        );
        let result = self.send_write(req);
        // The owning match is unknown here.
        http_cache::invalidate(&format!("{}/api/matches/", self.site_base));
        result
    }

    pub fn user_info(&self) -> Result<UserInfo> {
        let body = self
            .get_site(&format!("{}/api/user-info", self.site_base))
            .context("user info")?;
        parse_user_info_json(&body)
    }

    pub fn vote_status(&self, match_id: MatchId) -> Result<VoteStatus> {
        let body = self
            .get_site(&format!("{}/api/profile/votes", self.site_base))
            .context("vote history")?;
        parse_vote_history_json(&body, match_id)
    }
}

impl DataSource for ApiClient {
    fn matches_page(&self) -> Result<MatchesPage> {
        ApiClient::matches_page(self)
    }

    fn players(&self) -> Result<Vec<Player>> {
        ApiClient::players(self)
    }

    fn votes(&self, match_id: MatchId) -> Result<HashMap<PlayerId, u32>> {
        ApiClient::votes(self, match_id)
    }

    fn stats(&self) -> Result<GlobalStats> {
        ApiClient::stats(self)
    }

    fn submit_vote(&self, match_id: MatchId, player_id: PlayerId) -> Result<ApiMessage> {
        ApiClient::submit_vote(self, match_id, player_id)
    }

    fn create_match(
        &self,
        team1: &str,
        team2: &str,
        home_formation: &str,
        away_formation: &str,
    ) -> Result<ApiMessage> {
        ApiClient::create_match(self, team1, team2, home_formation, away_formation)
    }

    fn comments(&self, match_id: MatchId) -> Result<Vec<Comment>> {
        ApiClient::comments(self, match_id)
    }

    fn add_comment(&self, match_id: MatchId, text: &str) -> Result<ApiMessage> {
        ApiClient::add_comment(self, match_id, text)
    }

    fn delete_comment(&self, comment_id: CommentId) -> Result<ApiMessage> {
        ApiClient::delete_comment(self, comment_id)
    }

    fn user_info(&self) -> Result<UserInfo> {
        ApiClient::user_info(self)
    }

    fn vote_status(&self, match_id: MatchId) -> Result<VoteStatus> {
        ApiClient::vote_status(self, match_id)
    }
}

fn is_blank(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == "null"
}

/// Pulls the server's reason out of `{"status":"error","message":..}` or `{"error":..}`.
fn error_message(raw: &str) -> Option<String> {
    let root: Value = serde_json::from_str(raw.trim()).ok()?;
    if let Some(err) = root.get("error").and_then(Value::as_str) {
        return Some(err.to_string());
    }
    if root.get("status").and_then(Value::as_str) == Some("error") {
        return Some(
            root.get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        );
    }
    None
}

fn ensure_not_error(raw: &str) -> Result<()> {
    match error_message(raw) {
        Some(message) => Err(anyhow::anyhow!("server error: {message}")),
        None => Ok(()),
    }
}

pub fn parse_matches_page_json(raw: &str) -> Result<MatchesPage> {
    if is_blank(raw) {
        return Ok(MatchesPage::default());
    }
    ensure_not_error(raw)?;
    serde_json::from_str(raw.trim()).context("invalid matches-page json")
}

pub fn parse_players_json(raw: &str) -> Result<Vec<Player>> {
    #[derive(Deserialize)]
    struct Players {
        #[serde(default)]
        players: Option<Vec<Player>>,
    }

    if is_blank(raw) {
        return Ok(Vec::new());
    }
    ensure_not_error(raw)?;
    let parsed: Players = serde_json::from_str(raw.trim()).context("invalid players json")?;
    Ok(parsed.players.unwrap_or_default())
}

pub fn parse_votes_json(raw: &str) -> Result<HashMap<PlayerId, u32>> {
    #[derive(Deserialize)]
    struct VoteRow {
        player_id: PlayerId,
        #[serde(default)]
        votes: u32,
    }
    #[derive(Deserialize)]
    struct Votes {
        #[serde(default)]
        votes: Option<Vec<VoteRow>>,
    }

    if is_blank(raw) {
        return Ok(HashMap::new());
    }
    ensure_not_error(raw)?;
    let parsed: Votes = serde_json::from_str(raw.trim()).context("invalid votes json")?;
    let mut out = HashMap::new();
    for row in parsed.votes.unwrap_or_default() {
        *out.entry(row.player_id).or_insert(0) += row.votes;
    }
    Ok(out)
}

pub fn parse_stats_json(raw: &str) -> Result<GlobalStats> {
    if is_blank(raw) {
        return Ok(GlobalStats::default());
    }
    ensure_not_error(raw)?;
    serde_json::from_str(raw.trim()).context("invalid stats json")
}

pub fn parse_comments_json(raw: &str) -> Result<Vec<Comment>> {
    #[derive(Deserialize)]
    struct Comments {
        #[serde(default)]
        comments: Option<Vec<Comment>>,
    }

    if is_blank(raw) {
        return Ok(Vec::new());
    }
    ensure_not_error(raw)?;
    let parsed: Comments = serde_json::from_str(raw.trim()).context("invalid comments json")?;
    Ok(parsed.comments.unwrap_or_default())
}

pub fn parse_user_info_json(raw: &str) -> Result<UserInfo> {
    if is_blank(raw) {
        return Ok(UserInfo::default());
    }
    ensure_not_error(raw)?;
    serde_json::from_str(raw.trim()).context("invalid user-info json")
}

/// Finds the user's vote for `match_id` in their vote history.
pub fn parse_vote_history_json(raw: &str, match_id: MatchId) -> Result<VoteStatus> {
    #[derive(Deserialize)]
    struct HistoryRow {
        match_id: MatchId,
        #[serde(default)]
        player_id: Option<PlayerId>,
    }
    #[derive(Deserialize)]
    struct History {
        #[serde(default)]
        votes: Option<Vec<HistoryRow>>,
    }

    if is_blank(raw) {
        return Ok(VoteStatus::default());
    }
    ensure_not_error(raw)?;
    let parsed: History = serde_json::from_str(raw.trim()).context("invalid vote history json")?;
    let status = parsed
        .votes
        .unwrap_or_default()
        .into_iter()
        .find(|row| row.match_id == match_id)
        .map(|row| VoteStatus {
            has_voted: true,
            player_id: row.player_id,
        })
        .unwrap_or_default();
    Ok(status)
}

pub fn parse_api_message_json(raw: &str) -> Result<ApiMessage> {
    if is_blank(raw) {
        return Ok(ApiMessage::default());
    }
    ensure_not_error(raw)?;
    serde_json::from_str(raw.trim()).context("invalid response json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_bodies_carry_server_message() {
        let err = parse_api_message_json(r#"{"status":"error","message":"already voted"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("already voted"));

        let err = parse_comments_json(r#"{"error":"Not authenticated"}"#).unwrap_err();
        assert!(err.to_string().contains("Not authenticated"));
    }

    #[test]
    fn success_message_parses() {
        let msg = parse_api_message_json(r#"{"status":"success","message":"Vote counted"}"#)
            .unwrap();
        assert_eq!(msg.status, "success");
        assert_eq!(msg.message, "Vote counted");
    }

    #[test]
    fn client_urls_follow_config() {
        let cfg = Config::from_lookup(|key| match key {
            "API_BASE_URL" => Some("http://votes.test/api".to_string()),
            "SITE_BASE_URL" => Some("http://site.test".to_string()),
            _ => None,
        });
        let client = ApiClient::new(&cfg);
        assert_eq!(client.votes_url(7), "http://votes.test/api/votes/7");
        assert_eq!(
            client.comments_url(7),
            "http://site.test/api/matches/7/comments"
        );
    }

    fn offline_config(site: &str, api: &str) -> Config {
        let (site, api) = (site.to_string(), api.to_string());
        Config::from_lookup(move |key| match key {
            "API_BASE_URL" => Some(api.clone()),
            "SITE_BASE_URL" => Some(site.clone()),
            "API_RETRY_ATTEMPTS" => Some("1".to_string()),
            _ => None,
        })
    }

    #[test]
    fn stats_prefer_site_counters() {
        let client =
            ApiClient::new(&offline_config("http://site-first.test", "http://api-first.test"));
        http_cache::store(
            "http://site-first.test/api/flask-stats",
            r#"{"total_players":9,"total_matches":2,"total_votes":40}"#,
        );
        http_cache::store(
            "http://api-first.test/stats",
            r#"{"total_players":1,"total_matches":1,"total_votes":1}"#,
        );
        assert_eq!(client.stats().unwrap().total_votes, 40);
    }

    #[test]
    fn stats_fall_back_to_backend_when_site_fails() {
        // Nothing listens on port 1; the site request fails fast.
        let client =
            ApiClient::new(&offline_config("http://127.0.0.1:1", "http://api-fallback.test"));
        http_cache::store(
            "http://api-fallback.test/stats",
            r#"{"total_players":46,"total_matches":3,"total_votes":120}"#,
        );
        let stats = client.stats().unwrap();
        assert_eq!(stats.total_players, 46);
        assert_eq!(stats.total_votes, 120);
    }

    #[test]
    fn create_match_needs_both_teams() {
        let client = ApiClient::new(&Config::default());
        let err = client.create_match(" ", "Harbor City", "", "").unwrap_err();
        assert!(err.to_string().contains("Both teams are required"));
    }

    #[test]
    fn blank_comment_rejected_locally() {
        let client = ApiClient::new(&Config::default());
        let err = client.add_comment(1, "   ").unwrap_err();
        assert!(err.to_string().contains("Comment text is required"));
    }
}
