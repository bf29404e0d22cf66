use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use fanvote_terminal::demo_feed::DemoFeed;
use fanvote_terminal::provider::{DataSource, handle_command, spawn_provider};
use fanvote_terminal::roster::Side;
use fanvote_terminal::state::{AppState, Delta, ProviderCommand, apply_delta};

fn drain(rx: &mpsc::Receiver<Delta>) -> Vec<Delta> {
    rx.try_iter().collect()
}

fn run(source: &dyn DataSource, state: &mut AppState, cmd: ProviderCommand) -> Vec<Delta> {
    let (tx, rx) = mpsc::channel();
    handle_command(source, cmd, &tx);
    let deltas = drain(&rx);
    for delta in deltas.iter().cloned() {
        apply_delta(state, delta);
    }
    deltas
}

#[test]
fn load_match_sends_one_joined_delta() {
    let feed = DemoFeed::new(3);
    let mut state = AppState::new();
    run(&feed, &mut state, ProviderCommand::FetchMatchesPage);
    assert_eq!(state.matches.len(), 3);

    let generation = state.begin_match_view(1);
    let deltas = run(
        &feed,
        &mut state,
        ProviderCommand::LoadMatch {
            match_id: 1,
            generation,
        },
    );
    let loaded = deltas
        .iter()
        .filter(|d| matches!(d, Delta::MatchLoaded { .. }))
        .count();
    assert_eq!(loaded, 1);
    assert!(!state.loading);
    assert_eq!(state.home_roster.len(), 11);
    // Harbor City brings twelve players to a 4-4-2; one of them overflows.
    assert_eq!(state.away_roster.len(), 12);
    assert_eq!(state.away_roster.iter().filter(|e| e.overflow).count(), 1);
}

#[test]
fn vote_flow_marks_voted_and_refreshes_votes() {
    let feed = DemoFeed::new(3);
    let mut state = AppState::new();
    run(&feed, &mut state, ProviderCommand::FetchMatchesPage);
    let generation = state.begin_match_view(1);
    run(
        &feed,
        &mut state,
        ProviderCommand::LoadMatch {
            match_id: 1,
            generation,
        },
    );

    let target = state.home_roster[0].player.id;
    let before = state.home_roster[0].votes;
    let cmd = state.vote_command().expect("vote allowed");
    let deltas = run(&feed, &mut state, cmd);
    assert!(matches!(deltas[0], Delta::VoteAccepted { .. }));
    assert!(state.vote_status.has_voted);
    assert_eq!(state.vote_status.player_id, Some(target));
    assert_eq!(state.home_roster[0].votes, before + 1);

    let deltas = run(
        &feed,
        &mut state,
        ProviderCommand::SubmitVote {
            match_id: 1,
            player_id: target,
            generation,
        },
    );
    assert!(matches!(deltas[0], Delta::VoteRejected { .. }));
    assert_eq!(deltas.len(), 1);
}

#[test]
fn comment_post_and_delete_refresh_the_list() {
    let feed = DemoFeed::new(3);
    let mut state = AppState::new();
    run(&feed, &mut state, ProviderCommand::FetchMatchesPage);
    let generation = state.begin_match_view(1);
    run(
        &feed,
        &mut state,
        ProviderCommand::FetchComments {
            match_id: 1,
            generation,
        },
    );
    assert_eq!(state.comments.len(), 2);

    state.comment_draft = "Great save".to_string();
    let cmd = state.comment_command().unwrap();
    run(&feed, &mut state, cmd);
    assert_eq!(state.comments.len(), 3);
    assert!(state.logs.iter().any(|l| l == "[INFO] Comment added"));

    let own_idx = state
        .comments
        .iter()
        .position(|c| c.comment_text == "Great save")
        .unwrap();
    state.comment_selected = own_idx;
    let cmd = state.delete_comment_command().unwrap();
    run(&feed, &mut state, cmd);
    assert_eq!(state.comments.len(), 2);
}

#[test]
fn created_match_reloads_the_list() {
    let feed = DemoFeed::new(3);
    let mut state = AppState::new();
    run(&feed, &mut state, ProviderCommand::FetchMatchesPage);
    run(&feed, &mut state, ProviderCommand::FetchUserInfo);
    assert!(state.user.is_admin());

    state.begin_match_draft();
    let cmd = state.create_match_command().expect("draft should be valid");
    let deltas = run(&feed, &mut state, cmd);
    assert!(matches!(deltas[0], Delta::Log(ref line) if line.starts_with("[INFO] Match created")));
    assert!(deltas.iter().any(|d| matches!(d, Delta::SetMatchesPage(_))));

    assert_eq!(state.matches.len(), 4);
    let created = state.matches.last().unwrap();
    assert_eq!(created.team1, "Northbridge FC");
    assert_eq!(created.team2, "Harbor City");
    assert_eq!(created.formation(Side::Home), Some("4-3-3"));
    assert_eq!(state.global_stats.total_matches, 4);

    let deltas = run(
        &feed,
        &mut state,
        ProviderCommand::CreateMatch {
            team1: "Harbor City".to_string(),
            team2: "Harbor City".to_string(),
            home_formation: String::new(),
            away_formation: String::new(),
        },
    );
    assert_eq!(deltas.len(), 1);
    assert!(state.logs.back().unwrap().starts_with("[WARN] Create match failed"));
    assert_eq!(state.matches.len(), 4);
}

#[test]
fn failures_become_warn_logs() {
    let feed = DemoFeed::new(3);
    let mut state = AppState::new();
    let deltas = run(
        &feed,
        &mut state,
        ProviderCommand::PostComment {
            match_id: 99,
            text: "hello".to_string(),
            generation: 0,
        },
    );
    assert_eq!(deltas.len(), 1);
    assert!(state.logs.back().unwrap().starts_with("[WARN] Comment failed"));
}

#[test]
fn spawned_provider_answers_until_channel_closes() {
    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let handle = spawn_provider(Arc::new(DemoFeed::new(5)), tx, cmd_rx);

    cmd_tx.send(ProviderCommand::FetchGlobalStats).unwrap();
    let delta = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    match delta {
        Delta::SetGlobalStats(stats) => {
            assert_eq!(stats.total_matches, 3);
            assert_eq!(stats.total_players, 46);
        }
        other => panic!("unexpected delta: {other:?}"),
    }

    drop(cmd_tx);
    handle.join().unwrap();
}
