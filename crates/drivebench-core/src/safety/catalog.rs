//! Static catalog of US traffic-law constraints keyed by scene concept.
//!
//! [`active_rules`] scans ground-truth scene text for catalog concepts and
//! for a synonym table that folds loose vocabulary onto canonical concepts.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

/// One catalog entry: a scene concept and the legal constraint it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyRule {
    pub concept: &'static str,
    pub constraint: &'static str,
}

const fn rule(concept: &'static str, constraint: &'static str) -> SafetyRule {
    SafetyRule {
        concept,
        constraint,
    }
}

/// Every rule in the catalog.
pub const RULES: &[SafetyRule] = &[
    // Signals and signs
    rule(
        "red light",
        "LAW: Steady Red Light.\nRULE: Vehicle MUST STOP behind the limit line/crosswalk. \
         EXCEPTION: Right turn on red is permitted AFTER a complete stop, unless signed otherwise. \
         ACTION: Stop. Do not proceed straight.",
    ),
    rule(
        "green light",
        "LAW: Steady Green Light.\nRULE: Vehicle may proceed, but MUST YIELD to vehicles/pedestrians \
         already in the intersection. ACTION: Proceed if clear.",
    ),
    rule(
        "yellow light",
        "LAW: Steady Yellow Light.\nRULE: The signal is about to turn red. \
         ACTION: Stop if it can be done safely; otherwise proceed with caution. \
         Do not accelerate to beat the light.",
    ),
    rule(
        "flashing red",
        "LAW: Flashing Red Signal.\nRULE: Treat exactly as a STOP SIGN. \
         ACTION: Complete stop, yield to ROW, then proceed.",
    ),
    rule(
        "stop sign",
        "LAW: Stop Sign (R1-1).\nRULE: Vehicle MUST make a COMPLETE STOP at the limit line. \
         Rolling stops are illegal. ACTION: Stop fully. Yield to cross traffic/pedestrians.",
    ),
    rule(
        "yield",
        "LAW: Yield Sign (R1-2).\nRULE: Vehicle must slow down and be prepared to stop. \
         MUST YIELD right-of-way to traffic/pedestrians. ACTION: Slow/Stop as needed.",
    ),
    rule(
        "speed limit",
        "LAW: Regulatory Speed Limit.\nRULE: Do not exceed the posted speed. \
         ACTION: Maintain speed at or below limit.",
    ),
    // Lane discipline and markings
    rule(
        "double yellow",
        "LAW: Double Solid Yellow Lines.\nRULE: NO PASSING. Crossing is prohibited except to turn \
         left into a driveway/alley. ACTION: Stay in lane.",
    ),
    rule(
        "solid white",
        "LAW: Solid White Line.\nRULE: Lane changing is discouraged/prohibited (depending on state). \
         Marks road edge. ACTION: Maintain lane.",
    ),
    rule(
        "bike lane",
        "LAW: Dedicated Bicycle Lane.\nRULE: Motor vehicles may NOT drive in the bike lane, except to \
         park (where permitted) or turn right (within last 200ft). \
         ACTION: Do not obstruct cyclist path.",
    ),
    rule(
        "one way",
        "LAW: One Way Street.\nRULE: Traffic flows in only one direction. \
         ACTION: Do not turn against the flow.",
    ),
    rule(
        "no u-turn",
        "LAW: No U-Turn Sign.\nRULE: U-turns are explicitly prohibited. \
         ACTION: Continue straight or turn left/right.",
    ),
    rule(
        "turn only",
        "LAW: Turn Only Lane (Markings/Signs).\nRULE: Vehicle MUST turn in the direction indicated. \
         Proceeding straight is illegal. ACTION: Execute turn.",
    ),
    // Vulnerable road users
    rule(
        "pedestrian",
        "LAW: Pedestrian Right of Way.\nRULE: Vehicle MUST YIELD to pedestrians in ANY crosswalk \
         (marked or unmarked). ACTION: Stop. Do not pressure pedestrian.",
    ),
    rule(
        "crosswalk",
        "LAW: Crosswalk.\nRULE: Reduce speed and scan for pedestrians. Do not block the crosswalk \
         while stopped. ACTION: Yield if occupied.",
    ),
    rule(
        "school bus",
        "LAW: School Bus with Red Lights/Stop Arm.\nRULE: Traffic in BOTH directions MUST STOP \
         (unless separated by median). ACTION: STOP immediately. Remain stopped until lights off.",
    ),
    rule(
        "cyclist",
        "LAW: Sharing Road with Bicycles.\nRULE: Pass with at least 3 FEET of clearance. \
         ACTION: Slow down, move over. Do not squeeze.",
    ),
    // Emergency and special zones
    rule(
        "emergency vehicle",
        "LAW: Approaching Emergency Vehicle (Siren/Lights).\nRULE: Yield the Right of Way. \
         Pull over to the right edge and STOP. ACTION: Pull over and stop.",
    ),
    rule(
        "construction",
        "LAW: Work Zone.\nRULE: Fines are doubled. Expect altered lanes and workers. \
         ACTION: Reduce speed below limit. Watch for flaggers.",
    ),
    rule(
        "school zone",
        "LAW: School Zone.\nRULE: Speed limit is 25 MPH when children are present. \
         ACTION: Slow to 25 MPH or less.",
    ),
    rule(
        "railroad",
        "LAW: Railroad Crossing.\nRULE: Do not stop ON the tracks. Stop min 15ft away if lights flash. \
         ACTION: Ensure exit is clear before entering.",
    ),
    // Basic speed law
    rule(
        "wet road",
        "LAW: Basic Speed Law (Wet).\nRULE: Posted speed applies to ideal conditions. Reduce speed \
         for wet pavement to prevent hydroplaning. ACTION: Reduce speed.",
    ),
    rule(
        "snow",
        "LAW: Basic Speed Law (Snow/Ice).\nRULE: Reduce speed significantly (often by 50%). \
         Increase following distance. ACTION: Slow down, gentle inputs.",
    ),
    rule(
        "fog",
        "LAW: Basic Speed Law (Fog).\nRULE: Reduce speed. Use Low Beams (High beams reflect back). \
         ACTION: Slow down. Low beams on.",
    ),
];

/// Loose vocabulary folded onto canonical concepts.
///
/// An unqualified traffic light maps to `red light` so the judge errs on the
/// side of caution when the color is unknown.
pub const SYNONYMS: &[(&str, &str)] = &[
    ("traffic light", "red light"),
    ("stoplight", "red light"),
    ("bicyclist", "cyclist"),
    ("bicycle", "cyclist"),
    ("bike", "cyclist"),
    ("police", "emergency vehicle"),
    ("ambulance", "emergency vehicle"),
    ("firetruck", "emergency vehicle"),
    ("fire truck", "emergency vehicle"),
    ("children", "school zone"),
    ("students", "school zone"),
    ("train", "railroad"),
    ("tracks", "railroad"),
    ("rain", "wet road"),
    ("raining", "wet road"),
    ("ice", "snow"),
    ("icy", "snow"),
];

/// A keyword matched case-insensitively on word boundaries.
///
/// Every word takes simple inflections (`s`, `es`, `ed`, `d`, `ing`), and a
/// final `e` may drop before `ing`, so `change lane` finds "changing lanes"
/// but `rain` never matches "train".
#[derive(Debug, Clone)]
pub(crate) struct Term {
    pub keyword: &'static str,
    pattern: Option<Regex>,
}

impl Term {
    pub fn new(keyword: &'static str) -> Self {
        let words = keyword
            .split_whitespace()
            .map(inflected)
            .collect::<Vec<_>>()
            .join(r"\s+");
        let pattern = Regex::new(&format!(r"(?i)\b{}\b", words)).ok();
        Self { keyword, pattern }
    }

    pub fn found_in(&self, text: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.is_match(text),
            None => text.to_lowercase().contains(self.keyword),
        }
    }
}

fn inflected(word: &str) -> String {
    match word.strip_suffix('e') {
        Some(stem) if stem.len() > 1 => {
            format!("{}(?:e|es|ed|ing)", regex::escape(stem))
        }
        _ => format!("{}(?:s|es|ed|d|ing)?", regex::escape(word)),
    }
}

fn rule_terms() -> &'static [(Term, &'static SafetyRule)] {
    static TERMS: OnceLock<Vec<(Term, &'static SafetyRule)>> = OnceLock::new();
    TERMS.get_or_init(|| RULES.iter().map(|r| (Term::new(r.concept), r)).collect())
}

fn synonym_terms() -> &'static [(Term, &'static str)] {
    static TERMS: OnceLock<Vec<(Term, &'static str)>> = OnceLock::new();
    TERMS.get_or_init(|| {
        SYNONYMS
            .iter()
            .map(|(word, concept)| (Term::new(word), *concept))
            .collect()
    })
}

/// Constraint text for a canonical concept.
pub fn lookup(concept: &str) -> Option<&'static str> {
    RULES
        .iter()
        .find(|r| r.concept == concept)
        .map(|r| r.constraint)
}

/// Rules implied by `scene_text`, keyed by canonical concept.
///
/// Direct concept hits come first; a synonym only adds its canonical concept
/// when that concept is not already present.
pub fn active_rules(scene_text: &str) -> BTreeMap<&'static str, &'static str> {
    let mut active = BTreeMap::new();
    if scene_text.trim().is_empty() {
        return active;
    }

    for (term, rule) in rule_terms() {
        if term.found_in(scene_text) {
            active.insert(rule.concept, rule.constraint);
        }
    }

    for (term, concept) in synonym_terms() {
        if active.contains_key(concept) || !term.found_in(scene_text) {
            continue;
        }
        if let Some(constraint) = lookup(concept) {
            active.insert(*concept, constraint);
        }
    }

    active
}
