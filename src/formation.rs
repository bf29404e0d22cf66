/// Template used when a match carries no usable formation name.
pub const DEFAULT_FORMATION: &str = "4-3-3";

/// Tag assumed for players without a position.
pub const DEFAULT_TAG: &str = "CM";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub x: f64,
    pub y: f64,
    pub tag: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct FormationTemplate {
    pub name: &'static str,
    pub slots: &'static [Slot],
}

const fn slot(x: f64, y: f64, tag: &'static str) -> Slot {
    Slot { x, y, tag }
}

// X runs from the own goal line (0) to the opponent's (100); Y from top touchline to bottom.
pub static FORMATIONS: [FormationTemplate; 7] = [
    FormationTemplate {
        name: "4-3-3",
        slots: &[
            slot(3.0, 50.0, "GK"),
            slot(10.0, 25.0, "LB"),
            slot(10.0, 45.0, "CB"),
            slot(10.0, 55.0, "CB"),
            slot(10.0, 75.0, "RB"),
            slot(20.0, 40.0, "CM"),
            slot(20.0, 50.0, "CM"),
            slot(20.0, 60.0, "CM"),
            slot(40.0, 20.0, "LW"),
            slot(40.0, 50.0, "ST"),
            slot(40.0, 80.0, "RW"),
        ],
    },
    FormationTemplate {
        name: "4-4-2",
        slots: &[
            slot(3.0, 50.0, "GK"),
            slot(10.0, 25.0, "LB"),
            slot(10.0, 45.0, "CB"),
            slot(10.0, 55.0, "CB"),
            slot(10.0, 75.0, "RB"),
            slot(20.0, 28.0, "LM"),
            slot(20.0, 45.0, "CM"),
            slot(20.0, 55.0, "CM"),
            slot(20.0, 72.0, "RM"),
            slot(40.0, 42.0, "ST"),
            slot(40.0, 58.0, "ST"),
        ],
    },
    FormationTemplate {
        name: "4-2-3-1",
        slots: &[
            slot(3.0, 50.0, "GK"),
            slot(10.0, 25.0, "LB"),
            slot(10.0, 45.0, "CB"),
            slot(10.0, 55.0, "CB"),
            slot(10.0, 75.0, "RB"),
            slot(15.0, 45.0, "CDM"),
            slot(15.0, 55.0, "CDM"),
            slot(35.0, 28.0, "LW"),
            slot(35.0, 50.0, "CAM"),
            slot(35.0, 72.0, "RW"),
            slot(45.0, 50.0, "ST"),
        ],
    },
    FormationTemplate {
        name: "3-5-2",
        slots: &[
            slot(3.0, 50.0, "GK"),
            slot(10.0, 40.0, "CB"),
            slot(10.0, 50.0, "CB"),
            slot(10.0, 60.0, "CB"),
            slot(20.0, 20.0, "LWB"),
            slot(20.0, 40.0, "CM"),
            slot(20.0, 50.0, "CM"),
            slot(20.0, 60.0, "CM"),
            slot(20.0, 80.0, "RWB"),
            slot(40.0, 42.0, "ST"),
            slot(40.0, 58.0, "ST"),
        ],
    },
    FormationTemplate {
        name: "4-5-1",
        slots: &[
            slot(3.0, 50.0, "GK"),
            slot(10.0, 25.0, "LB"),
            slot(10.0, 45.0, "CB"),
            slot(10.0, 55.0, "CB"),
            slot(10.0, 75.0, "RB"),
            slot(20.0, 20.0, "LM"),
            slot(20.0, 40.0, "CM"),
            slot(20.0, 50.0, "CM"),
            slot(20.0, 60.0, "CM"),
            slot(20.0, 80.0, "RM"),
            slot(40.0, 50.0, "ST"),
        ],
    },
    FormationTemplate {
        name: "3-4-3",
        slots: &[
            slot(3.0, 50.0, "GK"),
            slot(10.0, 40.0, "CB"),
            slot(10.0, 50.0, "CB"),
            slot(10.0, 60.0, "CB"),
            slot(20.0, 28.0, "LM"),
            slot(20.0, 45.0, "CM"),
            slot(20.0, 55.0, "CM"),
            slot(20.0, 72.0, "RM"),
            slot(40.0, 20.0, "LW"),
            slot(40.0, 50.0, "ST"),
            slot(40.0, 80.0, "RW"),
        ],
    },
    FormationTemplate {
        name: "5-3-2",
        slots: &[
            slot(3.0, 50.0, "GK"),
            slot(10.0, 20.0, "LWB"),
            slot(10.0, 40.0, "CB"),
            slot(10.0, 50.0, "CB"),
            slot(10.0, 60.0, "CB"),
            slot(10.0, 80.0, "RWB"),
            slot(20.0, 40.0, "CM"),
            slot(20.0, 50.0, "CM"),
            slot(20.0, 60.0, "CM"),
            slot(40.0, 42.0, "ST"),
            slot(40.0, 58.0, "ST"),
        ],
    },
];

const COMPATIBILITY: [(&str, &[&str]); 13] = [
    ("GK", &["GK"]),
    ("CB", &["CB", "LCB", "RCB"]),
    ("LB", &["LB", "LWB"]),
    ("RB", &["RB", "RWB"]),
    ("CDM", &["CDM", "CM"]),
    ("CM", &["CM", "CDM", "CAM", "LCM", "RCM"]),
    ("CAM", &["CAM", "CM", "LW", "RW"]),
    ("LM", &["LM", "LW", "CM"]),
    ("RM", &["RM", "RW", "CM"]),
    ("LW", &["LW", "LM", "LF", "CAM"]),
    ("RW", &["RW", "RM", "RF", "CAM"]),
    ("ST", &["ST", "CF", "LS", "RS"]),
    ("CF", &["CF", "ST", "CAM"]),
];

// Base coordinates for the template-free layout. The index doubles as the sort order.
const STATIC_POSITIONS: [(&str, f64, f64); 27] = [
    ("GK", 3.0, 50.0),
    ("CB", 20.0, 50.0),
    ("LCB", 20.0, 45.0),
    ("RCB", 20.0, 55.0),
    ("LB", 20.0, 25.0),
    ("RB", 20.0, 75.0),
    ("LWB", 22.0, 22.0),
    ("RWB", 22.0, 78.0),
    ("CDM", 30.0, 50.0),
    ("LDM", 30.0, 42.0),
    ("RDM", 30.0, 58.0),
    ("CM", 35.0, 50.0),
    ("LCM", 35.0, 45.0),
    ("RCM", 35.0, 55.0),
    ("LM", 35.0, 28.0),
    ("RM", 35.0, 72.0),
    ("CAM", 35.0, 65.0),
    ("LAM", 35.0, 42.0),
    ("RAM", 35.0, 58.0),
    ("LW", 30.0, 20.0),
    ("RW", 30.0, 80.0),
    ("LF", 35.0, 28.0),
    ("RF", 35.0, 72.0),
    ("ST", 40.0, 50.0),
    ("CF", 52.0, 50.0),
    ("LS", 45.0, 45.0),
    ("RS", 45.0, 55.0),
];

const STATIC_FALLBACK: (f64, f64) = (50.0, 50.0);

/// Tags spread along the x axis when several players share them.
pub const CENTRAL_TAGS: [&str; 9] = ["GK", "CB", "LCB", "RCB", "CDM", "CM", "CAM", "ST", "CF"];

/// Resolves a formation by name. Accepts the compact form ("433") as well.
pub fn find_formation(name: &str) -> Option<&'static FormationTemplate> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    FORMATIONS
        .iter()
        .find(|f| f.name == name || compact_name(f.name) == name)
}

/// Returns the named template, or the default one and `false` when the name is unknown.
pub fn formation_or_default(name: &str) -> (&'static FormationTemplate, bool) {
    match find_formation(name) {
        Some(formation) => (formation, true),
        None => (default_formation(), false),
    }
}

pub fn default_formation() -> &'static FormationTemplate {
    &FORMATIONS[0]
}

pub fn formation_names() -> impl Iterator<Item = &'static str> {
    FORMATIONS.iter().map(|f| f.name)
}

/// The formation following `current` in catalog order, wrapping around.
pub fn next_formation_name(current: &str) -> &'static str {
    let Some(current) = find_formation(current) else {
        return DEFAULT_FORMATION;
    };
    let idx = FORMATIONS
        .iter()
        .position(|f| f.name == current.name)
        .unwrap_or(0);
    FORMATIONS[(idx + 1) % FORMATIONS.len()].name
}

fn compact_name(name: &str) -> String {
    name.chars().filter(|c| *c != '-').collect()
}

pub fn normalize_tag(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(tag) if !tag.is_empty() => tag.to_ascii_uppercase(),
        _ => DEFAULT_TAG.to_string(),
    }
}

pub fn compatible_tags(tag: &str) -> &'static [&'static str] {
    COMPATIBILITY
        .iter()
        .find(|(key, _)| *key == tag)
        .map(|(_, tags)| *tags)
        .unwrap_or(&[])
}

pub fn is_compatible(player_tag: &str, slot_tag: &str) -> bool {
    player_tag == slot_tag || compatible_tags(player_tag).contains(&slot_tag)
}

pub fn static_coordinate(tag: &str) -> (f64, f64) {
    STATIC_POSITIONS
        .iter()
        .find(|(key, _, _)| *key == tag)
        .map(|(_, x, y)| (*x, *y))
        .unwrap_or(STATIC_FALLBACK)
}

/// Sort key for the template-free layout; unknown tags sort last.
pub fn position_order(tag: &str) -> u8 {
    STATIC_POSITIONS
        .iter()
        .position(|(key, _, _)| *key == tag)
        .map(|idx| idx as u8)
        .unwrap_or(99)
}

pub fn is_central(tag: &str) -> bool {
    CENTRAL_TAGS.contains(&tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_formation_has_eleven_slots_and_one_keeper() {
        for formation in &FORMATIONS {
            assert_eq!(formation.slots.len(), 11, "{}", formation.name);
            let keepers = formation.slots.iter().filter(|s| s.tag == "GK").count();
            assert_eq!(keepers, 1, "{}", formation.name);
            assert!(
                formation
                    .slots
                    .iter()
                    .all(|s| (0.0..=100.0).contains(&s.x) && (0.0..=100.0).contains(&s.y))
            );
        }
    }

    #[test]
    fn lookup_accepts_compact_and_padded_names() {
        assert_eq!(find_formation("4-2-3-1").map(|f| f.name), Some("4-2-3-1"));
        assert_eq!(find_formation(" 352 ").map(|f| f.name), Some("3-5-2"));
        assert!(find_formation("7-7-7").is_none());
        assert!(find_formation("").is_none());

        let (formation, found) = formation_or_default("7-7-7");
        assert!(!found);
        assert_eq!(formation.name, DEFAULT_FORMATION);
    }

    #[test]
    fn next_formation_wraps() {
        assert_eq!(next_formation_name("4-3-3"), "4-4-2");
        assert_eq!(next_formation_name("5-3-2"), "4-3-3");
        assert_eq!(next_formation_name("bogus"), DEFAULT_FORMATION);
        assert_eq!(formation_names().count(), FORMATIONS.len());
    }

    #[test]
    fn normalize_tag_defaults_to_cm() {
        assert_eq!(normalize_tag(None), "CM");
        assert_eq!(normalize_tag(Some("  ")), "CM");
        assert_eq!(normalize_tag(Some(" cdm")), "CDM");
    }

    #[test]
    fn compatibility_and_static_tables() {
        assert!(is_compatible("CAM", "CM"));
        assert!(!is_compatible("CM", "GK"));
        assert!(is_compatible("XYZ", "XYZ"));
        assert!(compatible_tags("XYZ").is_empty());

        assert_eq!(static_coordinate("GK"), (3.0, 50.0));
        assert_eq!(static_coordinate("??"), (50.0, 50.0));
        assert_eq!(position_order("GK"), 0);
        assert_eq!(position_order("RS"), 26);
        assert_eq!(position_order("??"), 99);
    }
}
