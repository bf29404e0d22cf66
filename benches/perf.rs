use std::collections::HashMap;

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use fanvote_terminal::api::{parse_matches_page_json, parse_players_json};
use fanvote_terminal::formation::FORMATIONS;
use fanvote_terminal::roster::{Side, assign_roster, assign_roster_by_static_table};
use fanvote_terminal::state::{
    AppState, Delta, MatchSummary, MatchesPage, Player, Team, VoteStatus, apply_delta,
};

const TAGS: [&str; 12] = [
    "GK", "LB", "CB", "CB", "RB", "CDM", "CM", "CAM", "LW", "ST", "RW", "CF",
];

fn squad(size: usize, team_id: u32) -> Vec<Player> {
    (0..size)
        .map(|i| Player {
            id: team_id * 100 + i as u32,
            name: format!("Player {i}"),
            number: Some(i as u32 + 1),
            position: Some(TAGS[i % TAGS.len()].to_string()),
            team_id: Some(team_id),
            votes: 0,
        })
        .collect()
}

fn bench_assign_roster(c: &mut Criterion) {
    let players = squad(16, 1);
    let votes: HashMap<u32, u32> = players.iter().map(|p| (p.id, p.id % 7)).collect();
    c.bench_function("assign_roster_all_formations", |b| {
        b.iter(|| {
            for formation in &FORMATIONS {
                let layout = assign_roster(
                    black_box(&players),
                    black_box(&votes),
                    Side::Away,
                    formation.name,
                );
                black_box(layout.entries.len());
            }
        })
    });
}

fn bench_static_table(c: &mut Criterion) {
    let players = squad(23, 1);
    c.bench_function("assign_roster_static_table", |b| {
        b.iter(|| {
            let entries =
                assign_roster_by_static_table(black_box(&players), &HashMap::new(), Side::Home);
            black_box(entries.len());
        })
    });
}

fn bench_match_loaded(c: &mut Criterion) {
    let page = MatchesPage {
        matches: vec![MatchSummary {
            id: 1,
            team1: "Home".to_string(),
            team2: "Away".to_string(),
            date: String::new(),
            is_active: true,
            team1_formation: Some("4-2-3-1".to_string()),
            team2_formation: None,
        }],
        teams: vec![
            Team {
                id: 1,
                name: "Home".to_string(),
            },
            Team {
                id: 2,
                name: "Away".to_string(),
            },
        ],
    };
    let mut players = squad(14, 1);
    players.extend(squad(14, 2));

    c.bench_function("apply_match_loaded", |b| {
        b.iter(|| {
            let mut state = AppState::new();
            apply_delta(&mut state, Delta::SetMatchesPage(page.clone()));
            let generation = state.begin_match_view(1);
            apply_delta(
                &mut state,
                Delta::MatchLoaded {
                    generation,
                    match_id: 1,
                    players: players.clone(),
                    votes: HashMap::new(),
                    vote_status: VoteStatus::default(),
                },
            );
            black_box(state.home_roster.len() + state.away_roster.len());
        })
    });
}

fn bench_parsers(c: &mut Criterion) {
    c.bench_function("matches_page_parse", |b| {
        b.iter(|| {
            let page = parse_matches_page_json(black_box(MATCHES_JSON)).unwrap();
            black_box(page.matches.len());
        })
    });
    c.bench_function("players_parse", |b| {
        b.iter(|| {
            let players = parse_players_json(black_box(PLAYERS_JSON)).unwrap();
            black_box(players.len());
        })
    });
}

criterion_group!(
    perf,
    bench_assign_roster,
    bench_static_table,
    bench_match_loaded,
    bench_parsers
);
criterion_main!(perf);

static MATCHES_JSON: &str = include_str!("../tests/fixtures/matches_page.json");
static PLAYERS_JSON: &str = include_str!("../tests/fixtures/players.json");
