use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::formation::{self, DEFAULT_FORMATION};
use crate::roster::{self, RosterEntry, Side};

pub type PlayerId = u32;
pub type MatchId = u32;
pub type CommentId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Matches,
    Pitch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub team_id: Option<u32>,
    /// Lifetime tally kept by the backend; per-match votes come from the votes endpoint.
    #[serde(default)]
    pub votes: u32,
}

impl Player {
    /// Upper-cased position tag, "CM" when missing.
    pub fn tag(&self) -> String {
        formation::normalize_tag(self.position.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub id: MatchId,
    #[serde(default)]
    pub team1: String,
    #[serde(default)]
    pub team2: String,
    #[serde(default)]
    pub date: String,
    #[serde(rename = "isActive", alias = "is_active", default = "default_true")]
    pub is_active: bool,
    #[serde(default, alias = "home_formation")]
    pub team1_formation: Option<String>,
    #[serde(default, alias = "away_formation")]
    pub team2_formation: Option<String>,
}

impl MatchSummary {
    pub fn formation(&self, side: Side) -> Option<&str> {
        let raw = match side {
            Side::Home => self.team1_formation.as_deref(),
            Side::Away => self.team2_formation.as_deref(),
        };
        raw.map(str::trim).filter(|name| !name.is_empty())
    }

    pub fn team_name(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.team1,
            Side::Away => &self.team2,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: u32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchesPage {
    #[serde(default)]
    pub matches: Vec<MatchSummary>,
    #[serde(default)]
    pub teams: Vec<Team>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    #[serde(default)]
    pub total_players: u32,
    #[serde(default)]
    pub total_matches: u32,
    #[serde(default)]
    pub total_votes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    #[serde(default)]
    pub user_id: Option<u32>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub comment_text: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub is_own: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub logged_in: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl UserInfo {
    pub fn is_admin(&self) -> bool {
        self.logged_in && self.role.as_deref() == Some("admin")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteStatus {
    pub has_voted: bool,
    pub player_id: Option<PlayerId>,
}

/// Field of the new-match form that the arrow keys change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    HomeTeam,
    AwayTeam,
    HomeFormation,
    AwayFormation,
}

impl DraftField {
    pub fn next(self) -> Self {
        match self {
            DraftField::HomeTeam => DraftField::AwayTeam,
            DraftField::AwayTeam => DraftField::HomeFormation,
            DraftField::HomeFormation => DraftField::AwayFormation,
            DraftField::AwayFormation => DraftField::HomeTeam,
        }
    }
}

/// New-match form. Team fields index into `AppState::teams`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDraft {
    pub home_team: usize,
    pub away_team: usize,
    pub home_formation: &'static str,
    pub away_formation: &'static str,
    pub field: DraftField,
}

#[derive(Debug, Clone)]
pub enum Delta {
    SetMatchesPage(MatchesPage),
    SetGlobalStats(GlobalStats),
    SetUserInfo(UserInfo),
    MatchLoaded {
        generation: u64,
        match_id: MatchId,
        players: Vec<Player>,
        votes: HashMap<PlayerId, u32>,
        vote_status: VoteStatus,
    },
    SetVotes {
        generation: u64,
        match_id: MatchId,
        votes: HashMap<PlayerId, u32>,
    },
    SetComments {
        generation: u64,
        match_id: MatchId,
        comments: Vec<Comment>,
    },
    VoteAccepted {
        match_id: MatchId,
        player_id: PlayerId,
        message: String,
    },
    VoteRejected {
        match_id: MatchId,
        message: String,
    },
    Log(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCommand {
    FetchMatchesPage,
    FetchGlobalStats,
    FetchUserInfo,
    LoadMatch {
        match_id: MatchId,
        generation: u64,
    },
    RefreshVotes {
        match_id: MatchId,
        generation: u64,
    },
    FetchComments {
        match_id: MatchId,
        generation: u64,
    },
    SubmitVote {
        match_id: MatchId,
        player_id: PlayerId,
        generation: u64,
    },
    PostComment {
        match_id: MatchId,
        text: String,
        generation: u64,
    },
    DeleteComment {
        match_id: MatchId,
        comment_id: CommentId,
        generation: u64,
    },
    CreateMatch {
        team1: String,
        team2: String,
        home_formation: String,
        away_formation: String,
    },
}

/// Everything the terminal shows. Owned by the UI thread and changed only through
/// `apply_delta` and the selection helpers below.
#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub matches: Vec<MatchSummary>,
    pub teams: Vec<Team>,
    pub selected: usize,
    /// Bumped every time a match view opens; responses for older views are dropped.
    pub view_generation: u64,
    pub current_match_id: Option<MatchId>,
    pub loading: bool,
    pub home_players: Vec<Player>,
    pub away_players: Vec<Player>,
    pub votes: HashMap<PlayerId, u32>,
    pub vote_status: VoteStatus,
    pub home_formation: Option<String>,
    pub away_formation: Option<String>,
    pub home_roster: Vec<RosterEntry>,
    pub away_roster: Vec<RosterEntry>,
    pub focus_side: Side,
    pub focus_index: usize,
    pub comments: Vec<Comment>,
    pub comment_selected: usize,
    pub comment_draft: String,
    pub composing: bool,
    pub global_stats: GlobalStats,
    pub user: UserInfo,
    pub match_draft: Option<MatchDraft>,
    /// Set by the first match list whose first match is open; the UI opens it once.
    pub auto_open: Option<MatchId>,
    matches_seen: bool,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Matches,
            matches: Vec::with_capacity(16),
            teams: Vec::with_capacity(16),
            selected: 0,
            view_generation: 0,
            current_match_id: None,
            loading: false,
            home_players: Vec::new(),
            away_players: Vec::new(),
            votes: HashMap::with_capacity(32),
            vote_status: VoteStatus::default(),
            home_formation: None,
            away_formation: None,
            home_roster: Vec::new(),
            away_roster: Vec::new(),
            focus_side: Side::Home,
            focus_index: 0,
            comments: Vec::new(),
            comment_selected: 0,
            comment_draft: String::new(),
            composing: false,
            global_stats: GlobalStats::default(),
            user: UserInfo::default(),
            match_draft: None,
            auto_open: None,
            matches_seen: false,
            logs: VecDeque::with_capacity(200),
            help_overlay: false,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn selected_match(&self) -> Option<&MatchSummary> {
        self.matches.get(self.selected)
    }

    pub fn current_match(&self) -> Option<&MatchSummary> {
        let id = self.current_match_id?;
        self.matches.iter().find(|m| m.id == id)
    }

    pub fn select_next(&mut self) {
        if self.matches.is_empty() {
            return;
        }
        self.selected = (self.selected + 1).min(self.matches.len() - 1);
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn clamp_selection(&mut self) {
        if self.matches.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.matches.len() {
            self.selected = self.matches.len() - 1;
        }
    }

    /// Opens a match view and returns the generation its requests must carry.
    pub fn begin_match_view(&mut self, match_id: MatchId) -> u64 {
        self.view_generation += 1;
        self.current_match_id = Some(match_id);
        self.screen = Screen::Pitch;
        self.loading = true;
        self.home_players.clear();
        self.away_players.clear();
        self.votes.clear();
        self.vote_status = VoteStatus::default();
        self.home_formation = None;
        self.away_formation = None;
        self.home_roster.clear();
        self.away_roster.clear();
        self.focus_side = Side::Home;
        self.focus_index = 0;
        self.comments.clear();
        self.comment_selected = 0;
        self.comment_draft.clear();
        self.composing = false;
        self.view_generation
    }

    pub fn close_match_view(&mut self) {
        // Invalidate anything still in flight for the closed view.
        self.view_generation += 1;
        self.current_match_id = None;
        self.screen = Screen::Matches;
        self.loading = false;
        self.composing = false;
    }

    pub fn is_current(&self, generation: u64, match_id: MatchId) -> bool {
        generation == self.view_generation && self.current_match_id == Some(match_id)
    }

    /// Formation in effect for `side`: the user's choice, else the match's own.
    pub fn formation_for(&self, side: Side) -> Option<String> {
        let chosen = match side {
            Side::Home => self.home_formation.as_deref(),
            Side::Away => self.away_formation.as_deref(),
        };
        chosen
            .or_else(|| self.current_match().and_then(|m| m.formation(side)))
            .map(str::to_string)
    }

    pub fn cycle_formation(&mut self, side: Side) {
        if self.current_match_id.is_none() {
            return;
        }
        let next = match self.formation_for(side) {
            Some(current) if formation::find_formation(&current).is_some() => {
                formation::next_formation_name(&current)
            }
            // An unknown name is already laid out as the default template.
            Some(_) => formation::next_formation_name(DEFAULT_FORMATION),
            // The static table was in use; start the cycle at the default template.
            None => DEFAULT_FORMATION,
        };
        match side {
            Side::Home => self.home_formation = Some(next.to_string()),
            Side::Away => self.away_formation = Some(next.to_string()),
        }
        self.push_log(format!("[INFO] {} formation: {next}", side_label(side)));
        self.relayout(true);
    }

    /// Recomputes both rosters from the stored players and votes.
    pub fn relayout(&mut self, announce: bool) {
        let home = roster::layout_for_formation(
            &self.home_players,
            &self.votes,
            Side::Home,
            self.formation_for(Side::Home).as_deref(),
        );
        let away = roster::layout_for_formation(
            &self.away_players,
            &self.votes,
            Side::Away,
            self.formation_for(Side::Away).as_deref(),
        );
        if announce {
            for warning in home.warnings.iter().chain(away.warnings.iter()) {
                self.push_log(format!("[WARN] {warning}"));
            }
        }
        self.home_roster = home.entries;
        self.away_roster = away.entries;
        self.clamp_focus();
    }

    pub fn roster(&self, side: Side) -> &[RosterEntry] {
        match side {
            Side::Home => &self.home_roster,
            Side::Away => &self.away_roster,
        }
    }

    pub fn selected_roster_entry(&self) -> Option<&RosterEntry> {
        self.roster(self.focus_side).get(self.focus_index)
    }

    pub fn toggle_focus_side(&mut self) {
        self.focus_side = self.focus_side.other();
        self.clamp_focus();
    }

    pub fn select_next_player(&mut self) {
        let len = self.roster(self.focus_side).len();
        if len > 0 {
            self.focus_index = (self.focus_index + 1) % len;
        }
    }

    pub fn select_prev_player(&mut self) {
        let len = self.roster(self.focus_side).len();
        if len > 0 {
            self.focus_index = (self.focus_index + len - 1) % len;
        }
    }

    fn clamp_focus(&mut self) {
        let len = self.roster(self.focus_side).len();
        if len == 0 {
            self.focus_index = 0;
        } else if self.focus_index >= len {
            self.focus_index = len - 1;
        }
    }

    pub fn can_vote(&self) -> bool {
        self.current_match().is_some_and(|m| m.is_active)
            && !self.loading
            && !self.vote_status.has_voted
    }

    /// Builds the vote request for the focused player, or logs why there is none.
    pub fn vote_command(&mut self) -> Option<ProviderCommand> {
        let match_id = self.current_match_id?;
        if self.current_match().is_some_and(|m| !m.is_active) {
            self.push_log("[INFO] Voting is closed for this match");
            return None;
        }
        if self.vote_status.has_voted {
            self.push_log("[INFO] You have already voted in this match");
            return None;
        }
        if self.loading {
            self.push_log("[INFO] Roster still loading");
            return None;
        }
        let Some(entry) = self.selected_roster_entry() else {
            self.push_log("[INFO] No player selected");
            return None;
        };
        Some(ProviderCommand::SubmitVote {
            match_id,
            player_id: entry.player.id,
            generation: self.view_generation,
        })
    }

    pub fn comment_command(&mut self) -> Option<ProviderCommand> {
        let match_id = self.current_match_id?;
        let text = self.comment_draft.trim().to_string();
        if text.is_empty() {
            self.push_log("[WARN] Comment text is required");
            return None;
        }
        self.comment_draft.clear();
        self.composing = false;
        Some(ProviderCommand::PostComment {
            match_id,
            text,
            generation: self.view_generation,
        })
    }

    pub fn delete_comment_command(&mut self) -> Option<ProviderCommand> {
        let match_id = self.current_match_id?;
        let Some((comment_id, is_own)) = self
            .comments
            .get(self.comment_selected)
            .map(|c| (c.id, c.is_own))
        else {
            self.push_log("[INFO] No comment selected");
            return None;
        };
        if !is_own {
            self.push_log("[WARN] You can only delete your own comments");
            return None;
        }
        Some(ProviderCommand::DeleteComment {
            match_id,
            comment_id,
            generation: self.view_generation,
        })
    }

    pub fn select_next_comment(&mut self) {
        if !self.comments.is_empty() {
            self.comment_selected = (self.comment_selected + 1).min(self.comments.len() - 1);
        }
    }

    pub fn select_prev_comment(&mut self) {
        self.comment_selected = self.comment_selected.saturating_sub(1);
    }

    /// Opens the new-match form. Admins only.
    pub fn begin_match_draft(&mut self) {
        if !self.user.is_admin() {
            self.push_log("[WARN] Only admins can create matches");
            return;
        }
        if self.teams.len() < 2 {
            self.push_log("[INFO] At least two teams are needed to create a match");
            return;
        }
        self.match_draft = Some(MatchDraft {
            home_team: 0,
            away_team: 1,
            home_formation: DEFAULT_FORMATION,
            away_formation: DEFAULT_FORMATION,
            field: DraftField::HomeTeam,
        });
    }

    pub fn cancel_match_draft(&mut self) {
        self.match_draft = None;
    }

    pub fn next_draft_field(&mut self) {
        if let Some(draft) = self.match_draft.as_mut() {
            draft.field = draft.field.next();
        }
    }

    /// Moves the focused form field to its next value.
    pub fn step_draft(&mut self) {
        let team_count = self.teams.len();
        let Some(draft) = self.match_draft.as_mut() else {
            return;
        };
        match draft.field {
            DraftField::HomeTeam if team_count > 0 => {
                draft.home_team = (draft.home_team + 1) % team_count;
            }
            DraftField::AwayTeam if team_count > 0 => {
                draft.away_team = (draft.away_team + 1) % team_count;
            }
            DraftField::HomeFormation => {
                draft.home_formation = formation::next_formation_name(draft.home_formation);
            }
            DraftField::AwayFormation => {
                draft.away_formation = formation::next_formation_name(draft.away_formation);
            }
            _ => {}
        }
    }

    /// Builds the create request from the form, or logs why there is none.
    /// The form stays open when it is rejected.
    pub fn create_match_command(&mut self) -> Option<ProviderCommand> {
        let draft = self.match_draft.as_ref()?;
        let home = self.teams.get(draft.home_team).map(|t| t.name.clone());
        let away = self.teams.get(draft.away_team).map(|t| t.name.clone());
        let (Some(team1), Some(team2)) = (home, away) else {
            self.push_log("[WARN] Both teams are required");
            return None;
        };
        if draft.home_team == draft.away_team {
            self.push_log("[WARN] Pick two different teams");
            return None;
        }
        let cmd = ProviderCommand::CreateMatch {
            team1,
            team2,
            home_formation: draft.home_formation.to_string(),
            away_formation: draft.away_formation.to_string(),
        };
        self.match_draft = None;
        Some(cmd)
    }

    fn split_players(&mut self, players: Vec<Player>) {
        let Some(m) = self.current_match().cloned() else {
            return;
        };
        let home_id = team_id_by_name(&self.teams, &m.team1);
        let away_id = team_id_by_name(&self.teams, &m.team2);
        self.home_players.clear();
        self.away_players.clear();
        for player in players {
            if player.team_id.is_some() && player.team_id == home_id {
                self.home_players.push(player);
            } else if player.team_id.is_some() && player.team_id == away_id {
                self.away_players.push(player);
            }
        }
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetMatchesPage(page) => {
            let selected_id = state.selected_match().map(|m| m.id);
            state.matches = page.matches;
            state.teams = page.teams;
            if let Some(id) = selected_id
                && let Some(idx) = state.matches.iter().position(|m| m.id == id)
            {
                state.selected = idx;
            }
            state.clamp_selection();
            if !state.matches_seen && !state.matches.is_empty() {
                state.matches_seen = true;
                if let Some(first) = state.matches.first().filter(|m| m.is_active)
                    && state.current_match_id.is_none()
                {
                    state.auto_open = Some(first.id);
                }
            }
            if let Some(draft) = state.match_draft.as_mut() {
                let last = state.teams.len().saturating_sub(1);
                draft.home_team = draft.home_team.min(last);
                draft.away_team = draft.away_team.min(last);
            }
        }
        Delta::SetGlobalStats(stats) => state.global_stats = stats,
        Delta::SetUserInfo(user) => state.user = user,
        Delta::MatchLoaded {
            generation,
            match_id,
            players,
            votes,
            vote_status,
        } => {
            if !state.is_current(generation, match_id) {
                state.push_log(format!("[INFO] Dropped stale roster for match {match_id}"));
                return;
            }
            state.split_players(players);
            state.votes = votes;
            state.vote_status = vote_status;
            state.loading = false;
            state.relayout(true);
            state.push_log(format!(
                "[INFO] Match {match_id}: {} home / {} away players",
                state.home_roster.len(),
                state.away_roster.len()
            ));
        }
        Delta::SetVotes {
            generation,
            match_id,
            votes,
        } => {
            if !state.is_current(generation, match_id) {
                return;
            }
            state.votes = votes;
            state.relayout(false);
        }
        Delta::SetComments {
            generation,
            match_id,
            comments,
        } => {
            if !state.is_current(generation, match_id) {
                return;
            }
            state.comments = comments;
            if state.comment_selected >= state.comments.len() {
                state.comment_selected = state.comments.len().saturating_sub(1);
            }
        }
        Delta::VoteAccepted {
            match_id,
            player_id,
            message,
        } => {
            state.push_log(format!("[INFO] {message}"));
            if state.current_match_id == Some(match_id) {
                state.vote_status = VoteStatus {
                    has_voted: true,
                    player_id: Some(player_id),
                };
            }
        }
        Delta::VoteRejected { match_id, message } => {
            state.push_log(format!("[WARN] Vote for match {match_id} rejected: {message}"));
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

pub fn side_label(side: Side) -> &'static str {
    match side {
        Side::Home => "Home",
        Side::Away => "Away",
    }
}

fn team_id_by_name(teams: &[Team], name: &str) -> Option<u32> {
    teams.iter().find(|t| t.name == name).map(|t| t.id)
}
