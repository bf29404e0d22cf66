use std::collections::{HashMap, HashSet};

use fanvote_terminal::formation::{self, FORMATIONS};
use fanvote_terminal::roster::{
    X_MAX, X_MIN, Y_MAX, Y_MIN, Side, assign_roster, assign_roster_by_static_table,
};
use fanvote_terminal::state::Player;

const TAGS: [&str; 14] = [
    "GK", "CB", "LB", "RB", "CDM", "CM", "CAM", "LM", "RM", "LW", "RW", "ST", "CF", "LWB",
];

fn squad(size: usize, offset: usize) -> Vec<Player> {
    (0..size)
        .map(|i| Player {
            id: i as u32 + 1,
            name: format!("Player {}", i + 1),
            number: Some(i as u32 + 1),
            position: Some(TAGS[(i + offset) % TAGS.len()].to_string()),
            team_id: Some(1),
            votes: 0,
        })
        .collect()
}

#[test]
fn every_player_is_placed_exactly_once_within_bounds() {
    for formation in &FORMATIONS {
        for size in [0, 1, 7, 11, 14, 18] {
            for offset in 0..TAGS.len() {
                let players = squad(size, offset);
                for side in [Side::Home, Side::Away] {
                    let layout = assign_roster(&players, &HashMap::new(), side, formation.name);
                    assert_eq!(layout.entries.len(), size, "{} size {size}", formation.name);
                    assert!(layout.warnings.is_empty());

                    let ids: HashSet<u32> = layout.entries.iter().map(|e| e.player.id).collect();
                    assert_eq!(ids.len(), size);

                    for entry in &layout.entries {
                        assert!((X_MIN..=X_MAX).contains(&entry.x));
                        assert!((Y_MIN..=Y_MAX).contains(&entry.y));
                    }
                }
            }
        }
    }
}

#[test]
fn slots_are_unique_until_the_formation_is_full() {
    for formation in &FORMATIONS {
        for size in [5, 11, 15] {
            let players = squad(size, 3);
            let layout = assign_roster(&players, &HashMap::new(), Side::Home, formation.name);
            let regular: Vec<usize> = layout
                .entries
                .iter()
                .filter(|e| !e.overflow)
                .filter_map(|e| e.slot_index)
                .collect();
            let unique: HashSet<usize> = regular.iter().copied().collect();
            assert_eq!(unique.len(), regular.len(), "{}", formation.name);
            assert_eq!(regular.len(), size.min(11));

            let overflow = layout.entries.iter().filter(|e| e.overflow).count();
            assert_eq!(overflow, size.saturating_sub(11));
        }
    }
}

#[test]
fn keeper_always_takes_the_keeper_slot() {
    for formation in &FORMATIONS {
        let mut players = squad(11, 1);
        players[6].position = Some("GK".to_string());
        let layout = assign_roster(&players, &HashMap::new(), Side::Home, formation.name);
        let keeper = layout
            .entries
            .iter()
            .find(|e| e.player.id == players[6].id)
            .unwrap();
        assert_eq!(keeper.slot_index, Some(0));
        assert_eq!((keeper.x, keeper.y), (3.0, 50.0));
    }
}

#[test]
fn away_side_is_the_mirror_of_home() {
    let players = squad(11, 0);
    for formation in &FORMATIONS {
        let home = assign_roster(&players, &HashMap::new(), Side::Home, formation.name);
        let away = assign_roster(&players, &HashMap::new(), Side::Away, formation.name);
        for (h, a) in home.entries.iter().zip(&away.entries) {
            assert_eq!(h.player.id, a.player.id);
            assert_eq!(h.slot_index, a.slot_index);
            assert!((a.x - (100.0 - h.x)).abs() < 1e-9);
            assert!((a.y - (100.0 - h.y)).abs() < 1e-9);
        }
    }
}

#[test]
fn layout_is_deterministic_and_ignores_votes() {
    let players = squad(13, 4);
    let votes: HashMap<u32, u32> = players.iter().map(|p| (p.id, p.id * 3)).collect();
    let first = assign_roster(&players, &HashMap::new(), Side::Home, "3-5-2");
    let second = assign_roster(&players, &votes, Side::Home, "3-5-2");
    let coords = |entries: &[fanvote_terminal::roster::RosterEntry]| -> Vec<(u32, f64, f64)> {
        entries.iter().map(|e| (e.player.id, e.x, e.y)).collect()
    };
    assert_eq!(coords(&first.entries), coords(&second.entries));
    assert!(second.entries.iter().all(|e| e.votes == e.player.id * 3));
}

#[test]
fn duplicate_ids_are_both_kept() {
    let mut players = squad(3, 0);
    players[1].id = players[0].id;
    let layout = assign_roster(&players, &HashMap::new(), Side::Home, "4-3-3");
    assert_eq!(layout.entries.len(), 3);
}

#[test]
fn unknown_formation_matches_default_layout() {
    let players = squad(11, 2);
    let unknown = assign_roster(&players, &HashMap::new(), Side::Home, "2-2-2-2-2");
    let default = assign_roster(
        &players,
        &HashMap::new(),
        Side::Home,
        formation::DEFAULT_FORMATION,
    );
    assert_eq!(unknown.entries, default.entries);
    assert_eq!(unknown.formation, Some(formation::DEFAULT_FORMATION));
    assert_eq!(unknown.warnings.len(), 1);
}

#[test]
fn static_table_places_everyone_in_bounds() {
    for size in [1, 11, 20] {
        let players = squad(size, 5);
        for side in [Side::Home, Side::Away] {
            let entries = assign_roster_by_static_table(&players, &HashMap::new(), side);
            assert_eq!(entries.len(), size);
            assert!(entries.iter().all(|e| e.slot_index.is_none() && !e.overflow));
            assert!(
                entries
                    .iter()
                    .all(|e| (X_MIN..=X_MAX).contains(&e.x) && (Y_MIN..=Y_MAX).contains(&e.y))
            );
        }
    }
}
