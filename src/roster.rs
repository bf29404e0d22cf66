use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::formation::{self, Slot};
use crate::state::{Player, PlayerId};

pub const X_MIN: f64 = 1.0;
pub const X_MAX: f64 = 99.0;
pub const Y_MIN: f64 = 2.0;
pub const Y_MAX: f64 = 98.0;

/// Vertical distance between players stacked on the same slot.
pub const OVERFLOW_STEP: f64 = 4.0;

const SCORE_EXACT: u8 = 0;
const SCORE_CONTAINS: u8 = 10;
const SCORE_COMPATIBLE: u8 = 20;
const SCORE_OTHER: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    /// Home plays left to right; away coordinates are mirrored through the centre spot.
    pub fn mirror(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Side::Home => (x, y),
            Side::Away => (100.0 - x, 100.0 - y),
        }
    }

    pub fn other(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub player: Player,
    pub x: f64,
    pub y: f64,
    pub slot_index: Option<usize>,
    pub votes: u32,
    pub short_name: String,
    /// Placed on top of an already filled slot because the formation ran out of slots.
    pub overflow: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterLayout {
    /// Template actually used; `None` for the static-table layout.
    pub formation: Option<&'static str>,
    pub entries: Vec<RosterEntry>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    player: usize,
    slot: Option<usize>,
    x: f64,
    y: f64,
    overflow: bool,
}

/// Maps `players` onto the slots of `formation_name`.
///
/// Slots whose tag matches a player's tag are filled first, in template order. The
/// remaining players then take the best scoring open slot. When every slot is taken,
/// extra players are stacked next to their best slot instead of being dropped.
pub fn assign_roster(
    players: &[Player],
    vote_counts: &HashMap<PlayerId, u32>,
    side: Side,
    formation_name: &str,
) -> RosterLayout {
    let (formation, found) = formation::formation_or_default(formation_name);
    let mut warnings = Vec::new();
    if !found {
        warnings.push(format!(
            "formation {} not found, using {}",
            formation_name.trim(),
            formation.name
        ));
    }
    if players.is_empty() {
        return RosterLayout {
            formation: Some(formation.name),
            entries: Vec::new(),
            warnings,
        };
    }

    let slots = formation.slots;
    let tags: Vec<String> = players.iter().map(Player::tag).collect();

    let mut buckets: HashMap<&str, VecDeque<usize>> = HashMap::new();
    for (idx, tag) in tags.iter().enumerate() {
        buckets.entry(tag.as_str()).or_default().push_back(idx);
    }

    let mut bound = vec![false; players.len()];
    let mut filled = vec![false; slots.len()];
    let mut placements = Vec::with_capacity(players.len());

    for (slot_idx, slot) in slots.iter().enumerate() {
        let Some(bucket) = buckets.get_mut(slot.tag) else {
            continue;
        };
        if let Some(player_idx) = bucket.pop_front() {
            bound[player_idx] = true;
            filled[slot_idx] = true;
            placements.push(Placement {
                player: player_idx,
                slot: Some(slot_idx),
                x: slot.x,
                y: slot.y,
                overflow: false,
            });
        }
    }

    let mut open: Vec<usize> = (0..slots.len()).filter(|idx| !filled[*idx]).collect();
    for player_idx in (0..players.len()).filter(|idx| !bound[*idx]) {
        let tag = tags[player_idx].as_str();

        if let Some(pos) = best_slot(tag, open.iter().map(|idx| &slots[*idx])) {
            let slot_idx = open.remove(pos);
            let slot = &slots[slot_idx];
            placements.push(Placement {
                player: player_idx,
                slot: Some(slot_idx),
                x: slot.x,
                y: slot.y,
                overflow: false,
            });
            continue;
        }

        match best_slot(tag, slots.iter()) {
            Some(slot_idx) => {
                let (x, y) = overflow_point(&slots[slot_idx], &placements);
                placements.push(Placement {
                    player: player_idx,
                    slot: Some(slot_idx),
                    x,
                    y,
                    overflow: true,
                });
            }
            None => {
                let (x, y) = formation::static_coordinate(tag);
                placements.push(Placement {
                    player: player_idx,
                    slot: None,
                    x,
                    y,
                    overflow: true,
                });
            }
        }
    }

    let entries = placements
        .into_iter()
        .map(|p| build_entry(&players[p.player], vote_counts, side, p))
        .collect();

    RosterLayout {
        formation: Some(formation.name),
        entries,
        warnings,
    }
}

/// Template-free layout: every player goes to the base coordinate of its tag, with
/// players sharing a tag spread apart so their markers do not overlap.
pub fn assign_roster_by_static_table(
    players: &[Player],
    vote_counts: &HashMap<PlayerId, u32>,
    side: Side,
) -> Vec<RosterEntry> {
    if players.is_empty() {
        return Vec::new();
    }

    let tags: Vec<String> = players.iter().map(Player::tag).collect();
    let mut order: Vec<usize> = (0..players.len()).collect();
    order.sort_by(|&a, &b| {
        formation::position_order(&tags[a])
            .cmp(&formation::position_order(&tags[b]))
            .then_with(|| players[a].name.cmp(&players[b].name))
    });

    let mut group_sizes: HashMap<&str, usize> = HashMap::new();
    for tag in &tags {
        *group_sizes.entry(tag.as_str()).or_insert(0) += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut entries = Vec::with_capacity(players.len());
    for idx in order {
        let tag = tags[idx].as_str();
        let count = group_sizes.get(tag).copied().unwrap_or(1);
        let rank = seen.entry(tag).or_insert(0);
        let (x, y) = spread(tag, *rank, count);
        *rank += 1;

        entries.push(build_entry(
            &players[idx],
            vote_counts,
            side,
            Placement {
                player: idx,
                slot: None,
                x,
                y,
                overflow: false,
            },
        ));
    }
    entries
}

/// Uses the formation engine when a formation is named, the static table otherwise.
pub fn layout_for_formation(
    players: &[Player],
    vote_counts: &HashMap<PlayerId, u32>,
    side: Side,
    formation_name: Option<&str>,
) -> RosterLayout {
    match formation_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => assign_roster(players, vote_counts, side, name),
        None => RosterLayout {
            formation: None,
            entries: assign_roster_by_static_table(players, vote_counts, side),
            warnings: Vec::new(),
        },
    }
}

/// Lower is better.
pub fn slot_score(player_tag: &str, slot_tag: &str) -> u8 {
    if player_tag == slot_tag {
        SCORE_EXACT
    } else if player_tag.contains(slot_tag) || slot_tag.contains(player_tag) {
        SCORE_CONTAINS
    } else if formation::is_compatible(player_tag, slot_tag) {
        SCORE_COMPATIBLE
    } else {
        SCORE_OTHER
    }
}

pub fn short_name(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .last()
        .unwrap_or(full_name)
        .to_string()
}

pub fn clamp_to_pitch(x: f64, y: f64) -> (f64, f64) {
    (x.clamp(X_MIN, X_MAX), y.clamp(Y_MIN, Y_MAX))
}

// Position of the lowest score in `candidates`; the first one wins ties.
fn best_slot<'a>(tag: &str, candidates: impl Iterator<Item = &'a Slot>) -> Option<usize> {
    let mut best: Option<(usize, u8)> = None;
    for (pos, slot) in candidates.enumerate() {
        let score = slot_score(tag, slot.tag);
        if best.is_none_or(|(_, best_score)| score < best_score) {
            best = Some((pos, score));
        }
    }
    best.map(|(pos, _)| pos)
}

// 0 -> 0, 1 -> +step, 2 -> -step, 3 -> +2 steps, ...
fn overflow_offset(stack_depth: usize) -> f64 {
    let magnitude = stack_depth.div_ceil(2) as f64 * OVERFLOW_STEP;
    if stack_depth % 2 == 1 {
        magnitude
    } else {
        -magnitude
    }
}

/// First free point next to `slot` for a surplus player. Rows go below and above the
/// slot by `overflow_offset`; once they leave the pitch a new column opens to either
/// side of it. Points already used by `placements` are skipped.
fn overflow_point(slot: &Slot, placements: &[Placement]) -> (f64, f64) {
    let max_depth = (2.0 * (Y_MAX - Y_MIN) / OVERFLOW_STEP) as usize + 2;
    let max_column = (2.0 * (X_MAX - X_MIN) / OVERFLOW_STEP) as usize + 2;
    let taken = |x: f64, y: f64| {
        placements
            .iter()
            .any(|p| (p.x - x).abs() < f64::EPSILON && (p.y - y).abs() < f64::EPSILON)
    };

    for column in 0..=max_column {
        let x = slot.x + overflow_offset(column);
        if !(X_MIN..=X_MAX).contains(&x) {
            continue;
        }
        let first_row = if column == 0 { 1 } else { 0 };
        for depth in first_row..=max_depth {
            let y = slot.y + overflow_offset(depth);
            if (Y_MIN..=Y_MAX).contains(&y) && !taken(x, y) {
                return (x, y);
            }
        }
    }
    (slot.x, slot.y + OVERFLOW_STEP)
}

fn spread(tag: &str, rank: usize, count: usize) -> (f64, f64) {
    let (mut x, mut y) = formation::static_coordinate(tag);
    if count > 1 {
        let centre = (count - 1) as f64 / 2.0;
        let n = count as f64;
        if formation::is_central(tag) {
            let spacing = (30.0 / n).min(6.0);
            x += (rank as f64 - centre) * spacing;
        } else {
            let spacing = (40.0 / n).min(8.0);
            y += (rank as f64 - centre) * spacing;
        }
    }
    (x, y)
}

fn build_entry(
    player: &Player,
    vote_counts: &HashMap<PlayerId, u32>,
    side: Side,
    placement: Placement,
) -> RosterEntry {
    let (x, y) = side.mirror(placement.x, placement.y);
    let (x, y) = clamp_to_pitch(x, y);
    RosterEntry {
        player: player.clone(),
        x,
        y,
        slot_index: placement.slot,
        votes: vote_counts.get(&player.id).copied().unwrap_or(0),
        short_name: short_name(&player.name),
        overflow: placement.overflow,
    }
}
