use chrono::{DateTime, NaiveDateTime};

use crate::roster::{RosterEntry, Side};
use crate::state::{Comment, DraftField, GlobalStats, MatchDraft, MatchSummary, Team, UserInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scoreboard {
    pub home_name: String,
    pub away_name: String,
    pub home_votes: u32,
    pub away_votes: u32,
    pub date: String,
    pub active: bool,
}

pub fn scoreboard(
    m: Option<&MatchSummary>,
    home: &[RosterEntry],
    away: &[RosterEntry],
) -> Scoreboard {
    let name = |raw: Option<&str>, fallback: &str| {
        raw.map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    Scoreboard {
        home_name: name(m.map(|m| m.team1.as_str()), "Home"),
        away_name: name(m.map(|m| m.team2.as_str()), "Away"),
        home_votes: home.iter().map(|e| e.votes).sum(),
        away_votes: away.iter().map(|e| e.votes).sum(),
        date: m.map(|m| format_timestamp(&m.date)).unwrap_or_default(),
        active: m.is_some_and(|m| m.is_active),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteRow {
    pub player_id: u32,
    pub short_name: String,
    pub tag: String,
    pub votes: u32,
    pub percent: f64,
}

/// Players ordered by votes, highest first; ties keep roster order.
pub fn vote_ranking(roster: &[RosterEntry], max_votes: u32) -> Vec<VoteRow> {
    let denom = max_votes.max(1) as f64;
    let mut rows: Vec<VoteRow> = roster
        .iter()
        .map(|e| VoteRow {
            player_id: e.player.id,
            short_name: e.short_name.clone(),
            tag: e.player.tag(),
            votes: e.votes,
            percent: (e.votes as f64 / denom * 100.0).min(100.0),
        })
        .collect();
    rows.sort_by(|a, b| b.votes.cmp(&a.votes));
    rows
}

pub fn max_votes_across(home: &[RosterEntry], away: &[RosterEntry]) -> u32 {
    home.iter().chain(away).map(|e| e.votes).max().unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PitchMarker {
    pub player_id: u32,
    pub label: String,
    pub short_name: String,
    pub side: Side,
    pub x: f64,
    pub y: f64,
    pub enabled: bool,
    pub overflow: bool,
}

pub fn pitch_markers(
    home: &[RosterEntry],
    away: &[RosterEntry],
    can_vote: bool,
) -> Vec<PitchMarker> {
    let tagged = home
        .iter()
        .map(|e| (Side::Home, e))
        .chain(away.iter().map(|e| (Side::Away, e)));
    tagged
        .map(|(side, e)| PitchMarker {
            player_id: e.player.id,
            label: marker_label(e),
            short_name: e.short_name.clone(),
            side,
            x: e.x,
            y: e.y,
            enabled: can_vote,
            overflow: e.overflow,
        })
        .collect()
}

fn marker_label(entry: &RosterEntry) -> String {
    if let Some(number) = entry.player.number {
        return number.to_string();
    }
    entry
        .player
        .name
        .trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// Maps pitch percentages onto a `width` x `height` cell grid.
pub fn project_to_grid(x: f64, y: f64, width: u16, height: u16) -> (u16, u16) {
    let axis = |pct: f64, cells: u16| -> u16 {
        if cells == 0 {
            return 0;
        }
        let max = f64::from(cells - 1);
        (pct.clamp(0.0, 100.0) / 100.0 * max).round() as u16
    };
    (axis(x, width), axis(y, height))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRow {
    pub header: String,
    pub text: String,
    pub can_delete: bool,
}

pub fn comment_rows(comments: &[Comment]) -> Vec<CommentRow> {
    comments
        .iter()
        .map(|c| {
            let author = c
                .username
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("anonymous");
            CommentRow {
                header: format!("{author} · {}", format_timestamp(&c.created_at)),
                text: c.comment_text.clone(),
                can_delete: c.is_own,
            }
        })
        .collect()
}

pub fn format_timestamp(raw: &str) -> String {
    let cleaned = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(cleaned) {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    const FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cleaned, fmt) {
            return dt.format("%Y-%m-%d %H:%M").to_string();
        }
    }
    cleaned.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRow {
    pub label: &'static str,
    pub value: String,
    pub focused: bool,
}

/// One row per field of the new-match form.
pub fn match_draft_rows(draft: &MatchDraft, teams: &[Team]) -> Vec<DraftRow> {
    let team = |idx: usize| {
        teams
            .get(idx)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| "-".to_string())
    };
    [
        (DraftField::HomeTeam, "Home team", team(draft.home_team)),
        (DraftField::AwayTeam, "Away team", team(draft.away_team)),
        (DraftField::HomeFormation, "Home formation", draft.home_formation.to_string()),
        (DraftField::AwayFormation, "Away formation", draft.away_formation.to_string()),
    ]
    .into_iter()
    .map(|(field, label, value)| DraftRow {
        label,
        value,
        focused: field == draft.field,
    })
    .collect()
}

pub fn auth_bar(user: &UserInfo) -> String {
    if !user.logged_in {
        return "Not signed in (set SESSION_COOKIE to vote and comment)".to_string();
    }
    let name = user.username.as_deref().unwrap_or("user");
    if user.is_admin() {
        format!("Signed in as {name} (admin)")
    } else {
        format!("Signed in as {name}")
    }
}

pub fn stats_bar(stats: &GlobalStats) -> String {
    format!(
        "Players {}  Matches {}  Votes {}",
        stats.total_players, stats.total_matches, stats.total_votes
    )
}
