use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use anyhow::Result;

use crate::api::ApiMessage;
use crate::state::{
    Comment, CommentId, Delta, GlobalStats, MatchId, MatchesPage, Player, PlayerId,
    ProviderCommand, UserInfo, VoteStatus,
};

/// Where match, roster and comment data comes from.
pub trait DataSource: Send + Sync {
    fn matches_page(&self) -> Result<MatchesPage>;
    fn players(&self) -> Result<Vec<Player>>;
    fn votes(&self, match_id: MatchId) -> Result<HashMap<PlayerId, u32>>;
    fn stats(&self) -> Result<GlobalStats>;
    fn submit_vote(&self, match_id: MatchId, player_id: PlayerId) -> Result<ApiMessage>;
    fn create_match(
        &self,
        team1: &str,
        team2: &str,
        home_formation: &str,
        away_formation: &str,
    ) -> Result<ApiMessage>;
    fn comments(&self, match_id: MatchId) -> Result<Vec<Comment>>;
    fn add_comment(&self, match_id: MatchId, text: &str) -> Result<ApiMessage>;
    fn delete_comment(&self, comment_id: CommentId) -> Result<ApiMessage>;
    fn user_info(&self) -> Result<UserInfo>;
    fn vote_status(&self, match_id: MatchId) -> Result<VoteStatus>;
}

/// Runs `source` on a worker thread until the command channel closes.
pub fn spawn_provider(
    source: Arc<dyn DataSource>,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(cmd) = cmd_rx.recv() {
            handle_command(source.as_ref(), cmd, &tx);
        }
    })
}

pub fn handle_command(source: &dyn DataSource, cmd: ProviderCommand, tx: &Sender<Delta>) {
    match cmd {
        ProviderCommand::FetchMatchesPage => match source.matches_page() {
            Ok(page) => {
                let _ = tx.send(Delta::SetMatchesPage(page));
            }
            Err(err) => warn(tx, "Matches fetch error", &err),
        },
        ProviderCommand::FetchGlobalStats => match source.stats() {
            Ok(stats) => {
                let _ = tx.send(Delta::SetGlobalStats(stats));
            }
            Err(err) => warn(tx, "Stats fetch error", &err),
        },
        ProviderCommand::FetchUserInfo => match source.user_info() {
            Ok(user) => {
                let _ = tx.send(Delta::SetUserInfo(user));
            }
            Err(err) => warn(tx, "User info error", &err),
        },
        ProviderCommand::LoadMatch {
            match_id,
            generation,
        } => load_match(source, match_id, generation, tx),
        ProviderCommand::RefreshVotes {
            match_id,
            generation,
        } => send_votes(source, match_id, generation, tx),
        ProviderCommand::FetchComments {
            match_id,
            generation,
        } => send_comments(source, match_id, generation, tx),
        ProviderCommand::SubmitVote {
            match_id,
            player_id,
            generation,
        } => {
            match source.submit_vote(match_id, player_id) {
                Ok(ack) => {
                    let message = if ack.message.trim().is_empty() {
                        "Vote counted".to_string()
                    } else {
                        ack.message
                    };
                    let _ = tx.send(Delta::VoteAccepted {
                        match_id,
                        player_id,
                        message,
                    });
                }
                Err(err) => {
                    let _ = tx.send(Delta::VoteRejected {
                        match_id,
                        message: format!("{err:#}"),
                    });
                    return;
                }
            }
            send_votes(source, match_id, generation, tx);
            if let Ok(stats) = source.stats() {
                let _ = tx.send(Delta::SetGlobalStats(stats));
            }
        }
        ProviderCommand::PostComment {
            match_id,
            text,
            generation,
        } => {
            match source.add_comment(match_id, &text) {
                Ok(ack) => info(tx, &ack.message, "Comment added"),
                Err(err) => {
                    warn(tx, "Comment failed", &err);
                    return;
                }
            }
            send_comments(source, match_id, generation, tx);
        }
        ProviderCommand::DeleteComment {
            match_id,
            comment_id,
            generation,
        } => {
            match source.delete_comment(comment_id) {
                Ok(ack) => info(tx, &ack.message, "Comment deleted"),
                Err(err) => {
                    warn(tx, "Delete failed", &err);
                    return;
                }
            }
            send_comments(source, match_id, generation, tx);
        }
        ProviderCommand::CreateMatch {
            team1,
            team2,
            home_formation,
            away_formation,
        } => {
            match source.create_match(&team1, &team2, &home_formation, &away_formation) {
                Ok(ack) => info(tx, &ack.message, &format!("Match created: {team1} vs {team2}")),
                Err(err) => {
                    warn(tx, "Create match failed", &err);
                    return;
                }
            }
            match source.matches_page() {
                Ok(page) => {
                    let _ = tx.send(Delta::SetMatchesPage(page));
                }
                Err(err) => warn(tx, "Matches fetch error", &err),
            }
            if let Ok(stats) = source.stats() {
                let _ = tx.send(Delta::SetGlobalStats(stats));
            }
        }
    }
}

fn load_match(source: &dyn DataSource, match_id: MatchId, generation: u64, tx: &Sender<Delta>) {
    let (players, (votes, vote_status)) = rayon::join(
        || source.players(),
        || {
            rayon::join(
                || source.votes(match_id),
                || source.vote_status(match_id),
            )
        },
    );

    let players = players.unwrap_or_else(|err| {
        warn(tx, "Players fetch error", &err);
        Vec::new()
    });
    let votes = votes.unwrap_or_else(|err| {
        warn(tx, "Votes fetch error", &err);
        HashMap::new()
    });
    let vote_status = vote_status.unwrap_or_else(|err| {
        let _ = tx.send(Delta::Log(format!("[INFO] Vote history unavailable: {err:#}")));
        VoteStatus::default()
    });

    let _ = tx.send(Delta::MatchLoaded {
        generation,
        match_id,
        players,
        votes,
        vote_status,
    });
}

fn send_votes(source: &dyn DataSource, match_id: MatchId, generation: u64, tx: &Sender<Delta>) {
    match source.votes(match_id) {
        Ok(votes) => {
            let _ = tx.send(Delta::SetVotes {
                generation,
                match_id,
                votes,
            });
        }
        Err(err) => warn(tx, "Votes fetch error", &err),
    }
}

fn send_comments(source: &dyn DataSource, match_id: MatchId, generation: u64, tx: &Sender<Delta>) {
    match source.comments(match_id) {
        Ok(comments) => {
            let _ = tx.send(Delta::SetComments {
                generation,
                match_id,
                comments,
            });
        }
        Err(err) => warn(tx, "Comments fetch error", &err),
    }
}

fn info(tx: &Sender<Delta>, message: &str, fallback: &str) {
    let message = if message.trim().is_empty() {
        fallback
    } else {
        message
    };
    let _ = tx.send(Delta::Log(format!("[INFO] {message}")));
}

fn warn(tx: &Sender<Delta>, what: &str, err: &anyhow::Error) {
    let _ = tx.send(Delta::Log(format!("[WARN] {what}: {err:#}")));
}
