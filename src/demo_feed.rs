use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::api::ApiMessage;
use crate::formation::DEFAULT_FORMATION;
use crate::provider::DataSource;
use crate::state::{
    Comment, CommentId, GlobalStats, MatchId, MatchSummary, MatchesPage, Player, PlayerId, Team,
    UserInfo, VoteStatus,
};

const DEMO_USER_ID: u32 = 1;
const DEMO_USERNAME: &str = "demo_fan";

/// Offline data source used when no backend is reachable (`FANVOTE_DEMO=1`).
pub struct DemoFeed {
    data: Mutex<DemoData>,
}

struct DemoData {
    rng: StdRng,
    drift: bool,
    teams: Vec<Team>,
    matches: Vec<MatchSummary>,
    players: Vec<Player>,
    votes: HashMap<MatchId, HashMap<PlayerId, u32>>,
    history: HashMap<MatchId, PlayerId>,
    comments: Vec<(MatchId, Comment)>,
    next_comment_id: CommentId,
}

impl DemoFeed {
    /// Deterministic data set; vote counts only change through `submit_vote`.
    pub fn new(seed: u64) -> Self {
        Self::build(seed, false)
    }

    /// Like `new`, but other fans keep voting on active matches between polls.
    pub fn with_drift(seed: u64) -> Self {
        Self::build(seed, true)
    }

    fn build(seed: u64, drift: bool) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let teams = seed_teams();
        let matches = seed_matches();
        let players = seed_players();

        let mut votes = HashMap::new();
        for m in &matches {
            let ids = match_player_ids(&teams, &players, m);
            let tally = ids
                .into_iter()
                .map(|id| (id, rng.gen_range(0..25)))
                .collect::<HashMap<_, _>>();
            votes.insert(m.id, tally);
        }

        let comments = vec![
            (
                1,
                comment(
                    1,
                    Some(2),
                    "north_end",
                    "What a press in the first half!",
                    "2026-10-12 18:41:09",
                ),
            ),
            (
                1,
                comment(
                    2,
                    Some(DEMO_USER_ID),
                    DEMO_USERNAME,
                    "Berg is running the midfield.",
                    "2026-10-12 18:55:30",
                ),
            ),
            (
                2,
                comment(
                    3,
                    Some(3),
                    "harbor_lights",
                    "Back three looks shaky.",
                    "2026-10-13 20:02:11",
                ),
            ),
        ];

        Self {
            data: Mutex::new(DemoData {
                rng,
                drift,
                teams,
                matches,
                players,
                votes,
                history: HashMap::new(),
                comments,
                next_comment_id: 4,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DemoData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DemoData {
    fn find_match(&self, match_id: MatchId) -> Result<&MatchSummary> {
        self.matches
            .iter()
            .find(|m| m.id == match_id)
            .ok_or_else(|| anyhow::anyhow!("Match {match_id} not found"))
    }

    fn drift_votes(&mut self, match_id: MatchId) {
        let active = self
            .matches
            .iter()
            .any(|m| m.id == match_id && m.is_active);
        if !self.drift || !active {
            return;
        }
        let Some(tally) = self.votes.get_mut(&match_id) else {
            return;
        };
        let mut ids: Vec<PlayerId> = tally.keys().copied().collect();
        ids.sort_unstable();
        if ids.is_empty() || !self.rng.gen_bool(0.6) {
            return;
        }
        let id = ids[self.rng.gen_range(0..ids.len())];
        *tally.entry(id).or_insert(0) += self.rng.gen_range(1..=3);
    }
}

impl DataSource for DemoFeed {
    fn matches_page(&self) -> Result<MatchesPage> {
        let data = self.lock();
        Ok(MatchesPage {
            matches: data.matches.clone(),
            teams: data.teams.clone(),
        })
    }

    fn players(&self) -> Result<Vec<Player>> {
        let data = self.lock();
        let mut players = data.players.clone();
        for player in &mut players {
            player.votes = data
                .votes
                .values()
                .filter_map(|tally| tally.get(&player.id))
                .sum();
        }
        Ok(players)
    }

    fn votes(&self, match_id: MatchId) -> Result<HashMap<PlayerId, u32>> {
        let mut data = self.lock();
        data.drift_votes(match_id);
        Ok(data.votes.get(&match_id).cloned().unwrap_or_default())
    }

    fn stats(&self) -> Result<GlobalStats> {
        let data = self.lock();
        Ok(GlobalStats {
            total_players: data.players.len() as u32,
            total_matches: data.matches.len() as u32,
            total_votes: data.votes.values().flat_map(|tally| tally.values()).sum(),
        })
    }

    fn submit_vote(&self, match_id: MatchId, player_id: PlayerId) -> Result<ApiMessage> {
        let mut data = self.lock();
        let m = data.find_match(match_id)?;
        if !m.is_active {
            return Err(anyhow::anyhow!("Match not found or already finished"));
        }
        if !match_player_ids(&data.teams, &data.players, m).contains(&player_id) {
            return Err(anyhow::anyhow!("Player not found"));
        }
        if data.history.contains_key(&match_id) {
            return Err(anyhow::anyhow!("You have already voted in this match"));
        }
        data.history.insert(match_id, player_id);
        *data
            .votes
            .entry(match_id)
            .or_default()
            .entry(player_id)
            .or_insert(0) += 1;
        Ok(ApiMessage {
            status: "success".to_string(),
            message: "Vote counted".to_string(),
        })
    }

    fn create_match(
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
        if team1 == team2 {
            return Err(anyhow::anyhow!("A team cannot play itself"));
        }
        let mut data = self.lock();
        for name in [team1, team2] {
            if !data.teams.iter().any(|t| t.name == name) {
                return Err(anyhow::anyhow!("Team {name} not found"));
            }
        }

        let home = Some(home_formation.trim()).filter(|name| !name.is_empty());
        let away = Some(away_formation.trim()).filter(|name| !name.is_empty());
        let id = data.matches.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        let date = Utc::now().format("%Y-%m-%d %H:%M").to_string();
        let created = fixture(
            id,
            (team1, team2),
            &date,
            true,
            (
                home.or(Some(DEFAULT_FORMATION)),
                away.or(Some(DEFAULT_FORMATION)),
            ),
        );
        let tally = match_player_ids(&data.teams, &data.players, &created)
            .into_iter()
            .map(|player_id| (player_id, 0))
            .collect();
        data.votes.insert(id, tally);
        data.matches.push(created);
        // The backend answers with the new id only.
        Ok(ApiMessage {
            status: "success".to_string(),
            message: String::new(),
        })
    }

    fn comments(&self, match_id: MatchId) -> Result<Vec<Comment>> {
        let data = self.lock();
        let mut out: Vec<Comment> = data
            .comments
            .iter()
            .filter(|(id, _)| *id == match_id)
            .map(|(_, c)| Comment {
                is_own: c.user_id == Some(DEMO_USER_ID),
                ..c.clone()
            })
            .collect();
        // Newest first.
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    fn add_comment(&self, match_id: MatchId, text: &str) -> Result<ApiMessage> {
        let text = text.trim();
        if text.is_empty() {
            return Err(anyhow::anyhow!("Comment text is required"));
        }
        let mut data = self.lock();
        data.find_match(match_id)?;
        let id = data.next_comment_id;
        data.next_comment_id += 1;
        let created_at = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        data.comments.push((
            match_id,
            comment(id, Some(DEMO_USER_ID), DEMO_USERNAME, text, &created_at),
        ));
        Ok(ApiMessage {
            status: "success".to_string(),
            message: "Comment added".to_string(),
        })
    }

    fn delete_comment(&self, comment_id: CommentId) -> Result<ApiMessage> {
        let mut data = self.lock();
        let Some(idx) = data.comments.iter().position(|(_, c)| c.id == comment_id) else {
            return Err(anyhow::anyhow!("Comment not found"));
        };
        if data.comments[idx].1.user_id != Some(DEMO_USER_ID) {
            return Err(anyhow::anyhow!("You can only delete your own comments"));
        }
        data.comments.remove(idx);
        Ok(ApiMessage {
            status: "success".to_string(),
            message: "Comment deleted".to_string(),
        })
    }

    fn user_info(&self) -> Result<UserInfo> {
        Ok(UserInfo {
            logged_in: true,
            username: Some(DEMO_USERNAME.to_string()),
            role: Some("admin".to_string()),
        })
    }

    fn vote_status(&self, match_id: MatchId) -> Result<VoteStatus> {
        let data = self.lock();
        Ok(match data.history.get(&match_id) {
            Some(player_id) => VoteStatus {
                has_voted: true,
                player_id: Some(*player_id),
            },
            None => VoteStatus::default(),
        })
    }
}

fn match_player_ids(teams: &[Team], players: &[Player], m: &MatchSummary) -> Vec<PlayerId> {
    let team_ids: Vec<u32> = teams
        .iter()
        .filter(|t| t.name == m.team1 || t.name == m.team2)
        .map(|t| t.id)
        .collect();
    players
        .iter()
        .filter(|p| p.team_id.is_some_and(|id| team_ids.contains(&id)))
        .map(|p| p.id)
        .collect()
}

fn comment(id: CommentId, user_id: Option<u32>, username: &str, text: &str, at: &str) -> Comment {
    Comment {
        id,
        user_id,
        username: Some(username.to_string()),
        comment_text: text.to_string(),
        created_at: at.to_string(),
        is_own: false,
    }
}

fn seed_teams() -> Vec<Team> {
    ["Northbridge FC", "Harbor City", "Riverside United", "Ashford Athletic"]
        .iter()
        .enumerate()
        .map(|(idx, name)| Team {
            id: idx as u32 + 1,
            name: name.to_string(),
        })
        .collect()
}

fn fixture(
    id: MatchId,
    (team1, team2): (&str, &str),
    date: &str,
    is_active: bool,
    (home, away): (Option<&str>, Option<&str>),
) -> MatchSummary {
    MatchSummary {
        id,
        team1: team1.to_string(),
        team2: team2.to_string(),
        date: date.to_string(),
        is_active,
        team1_formation: home.map(str::to_string),
        team2_formation: away.map(str::to_string),
    }
}

fn seed_matches() -> Vec<MatchSummary> {
    vec![
        fixture(
            1,
            ("Northbridge FC", "Harbor City"),
            "2026-10-12 18:00",
            true,
            (Some("4-3-3"), Some("4-4-2")),
        ),
        fixture(
            2,
            ("Riverside United", "Ashford Athletic"),
            "2026-10-13 19:30",
            true,
            (Some("3-5-2"), Some("4-2-3-1")),
        ),
        fixture(
            3,
            ("Harbor City", "Riverside United"),
            "2026-10-05 16:00",
            false,
            (None, None),
        ),
    ]
}

fn seed_players() -> Vec<Player> {
    let squads: [(u32, &[(&str, u32, Option<&str>)]); 4] = [
        (
            1,
            &[
                ("Tomas Lind", 1, Some("GK")),
                ("Aaron Pike", 3, Some("LB")),
                ("Milo Okafor", 4, Some("CB")),
                ("Jonas Held", 5, Some("CB")),
                ("Rui Matos", 2, Some("RB")),
                ("Erik Berg", 8, Some("CM")),
                ("Sam Quigley", 6, Some("CDM")),
                ("Leo Varga", 10, Some("CAM")),
                ("Niko Salo", 11, Some("LW")),
                ("Dario Costa", 9, Some("ST")),
                ("Kwame Asante", 7, Some("RW")),
            ],
        ),
        (
            2,
            &[
                ("Paul Dunne", 1, Some("GK")),
                ("Ivo Maric", 3, Some("LB")),
                ("Ben Archer", 5, Some("CB")),
                ("Olu Bello", 6, Some("CB")),
                ("Finn Walsh", 2, Some("RB")),
                ("Joao Reis", 11, Some("LM")),
                ("Marek Novak", 8, Some("CM")),
                ("Theo Blanc", 4, Some("CM")),
                ("Cal Ruiz", 7, Some("RM")),
                ("Hugo Fenn", 9, Some("ST")),
                ("Ade Okoro", 10, Some("CF")),
                ("Lars Voss", 19, Some("ST")),
            ],
        ),
        (
            3,
            &[
                ("Mats Eide", 1, Some("GK")),
                ("Gio Rossi", 5, Some("CB")),
                ("Ken Adler", 4, Some("CB")),
                ("Yuri Petrov", 6, Some("CB")),
                ("Alex Moore", 3, Some("LWB")),
                ("Dan Keller", 8, Some("CM")),
                ("Ruben Sol", 14, Some("CDM")),
                ("Ilia Kova", 10, Some("CM")),
                ("Sean Boyle", 2, Some("RWB")),
                ("Max Ferro", 9, Some("ST")),
                ("Ty Nwosu", 11, Some("ST")),
            ],
        ),
        (
            4,
            &[
                ("Olaf Strand", 1, Some("GK")),
                ("Nate Fry", 3, Some("LB")),
                ("Emil Sand", 5, Some("CB")),
                ("Jay Cole", 4, Some("CB")),
                ("Pim de Wit", 2, Some("RB")),
                ("Omar Haddad", 6, Some("CDM")),
                ("Kai Lund", 8, Some("CDM")),
                ("Rafa Lopes", 11, Some("LW")),
                ("Zane Hart", 10, Some("CAM")),
                ("Luca Neri", 7, Some("RW")),
                ("Bo Tanaka", 9, Some("ST")),
                ("Vic Amos", 17, None),
            ],
        ),
    ];

    let mut players = Vec::new();
    for (team_id, squad) in squads {
        for (name, number, position) in squad {
            players.push(Player {
                id: players.len() as u32 + 1,
                name: name.to_string(),
                number: Some(*number),
                position: position.map(str::to_string),
                team_id: Some(team_id),
                votes: 0,
            });
        }
    }
    players
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_votes_are_deterministic() {
        let a = DemoFeed::new(7).votes(1).unwrap();
        let b = DemoFeed::new(7).votes(1).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 23);
    }

    #[test]
    fn second_vote_in_same_match_is_refused() {
        let feed = DemoFeed::new(1);
        let before = feed.votes(1).unwrap().get(&1).copied().unwrap_or(0);
        feed.submit_vote(1, 1).unwrap();
        assert_eq!(feed.votes(1).unwrap().get(&1).copied(), Some(before + 1));

        let err = feed.submit_vote(1, 2).unwrap_err();
        assert!(err.to_string().contains("already voted"));
        let status = feed.vote_status(1).unwrap();
        assert!(status.has_voted);
        assert_eq!(status.player_id, Some(1));
    }

    #[test]
    fn finished_match_and_foreign_player_are_refused() {
        let feed = DemoFeed::new(1);
        assert!(feed.submit_vote(3, 12).is_err());
        // Player 24 plays for Riverside, not in match 1.
        assert!(feed.submit_vote(1, 24).is_err());
        assert!(!feed.vote_status(1).unwrap().has_voted);
    }

    #[test]
    fn created_match_joins_the_list_open_with_default_formations() {
        let feed = DemoFeed::new(1);
        let ack = feed
            .create_match("Ashford Athletic", "Northbridge FC", "", "3-5-2")
            .unwrap();
        assert_eq!(ack.status, "success");

        let page = feed.matches_page().unwrap();
        assert_eq!(page.matches.len(), 4);
        let created = page.matches.last().unwrap();
        assert_eq!(created.id, 4);
        assert!(created.is_active);
        assert_eq!(created.team1_formation.as_deref(), Some("4-3-3"));
        assert_eq!(created.team2_formation.as_deref(), Some("3-5-2"));
        assert_eq!(feed.votes(4).unwrap().values().sum::<u32>(), 0);
        feed.submit_vote(4, 1).unwrap();

        assert!(feed.create_match("Harbor City", "Harbor City", "", "").is_err());
        assert!(feed.create_match("Harbor City", "Nowhere Rovers", "", "").is_err());
        assert!(feed.create_match("", "Harbor City", "", "").is_err());
        assert_eq!(feed.matches_page().unwrap().matches.len(), 4);
    }

    #[test]
    fn comments_add_and_delete_own_only() {
        let feed = DemoFeed::new(1);
        let before = feed.comments(1).unwrap();
        assert_eq!(before.len(), 2);
        assert!(before.iter().any(|c| c.is_own));

        feed.add_comment(1, "  Great save!  ").unwrap();
        let after = feed.comments(1).unwrap();
        assert_eq!(after.len(), 3);
        let mine = after
            .iter()
            .find(|c| c.comment_text == "Great save!")
            .unwrap();
        assert!(mine.is_own);

        assert!(feed.delete_comment(1).is_err());
        feed.delete_comment(mine.id).unwrap();
        assert_eq!(feed.comments(1).unwrap().len(), 2);
        assert!(feed.add_comment(1, "   ").is_err());
    }
}
