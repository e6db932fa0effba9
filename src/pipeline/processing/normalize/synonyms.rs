//! Static canonicalization tables.
//!
//! Keys are lowercase aliases, values are the canonical tokens. The maps are
//! built once on first use and never mutated, so they are shared read-only
//! across batch workers.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::card::{CardType, Domain};

pub type SynonymTable = HashMap<&'static str, &'static str>;

pub static KEYWORD_SYNONYMS: Lazy<SynonymTable> = Lazy::new(|| {
    HashMap::from([
        ("gear", "GEAR"),
        ("legend", "LEGEND"),
        ("unit", "UNIT"),
        ("rune", "RUNE"),
        ("spell", "SPELL"),
    ])
});

pub static TAG_SYNONYMS: Lazy<SynonymTable> = Lazy::new(|| {
    HashMap::from([
        ("equipment", "EQUIPMENT"),
        ("legend", "LEGEND"),
        ("unit", "UNIT"),
    ])
});

pub static SUPERTYPE_SYNONYMS: Lazy<SynonymTable> = Lazy::new(|| {
    HashMap::from([
        ("champion", "CHAMPION"),
        ("signature", "SIGNATURE"),
        ("token", "TOKEN"),
    ])
});

pub static DOMAIN_SYNONYMS: Lazy<SynonymTable> = Lazy::new(|| {
    HashMap::from([
        ("fury", "FURY"),
        ("calm", "CALM"),
        ("mind", "MIND"),
        ("body", "BODY"),
        ("chaos", "CHAOS"),
        ("order", "ORDER"),
    ])
});

/// Effect identifiers map to snake_case machine tokens, not display labels.
pub static EFFECT_SYNONYMS: Lazy<SynonymTable> = Lazy::new(|| {
    HashMap::from([
        ("score_point", "score_vp"),
        ("gain_point", "score_vp"),
        ("gain_vp", "score_vp"),
        ("deal dmg", "deal_damage"),
        ("deal_dmg", "deal_damage"),
        ("draw_card", "draw_cards"),
    ])
});

pub static TYPE_SYNONYMS: Lazy<HashMap<&'static str, CardType>> = Lazy::new(|| {
    HashMap::from([
        ("unit", CardType::Unit),
        ("champion unit", CardType::Unit),
        ("spell", CardType::Spell),
        ("signature spell", CardType::Spell),
        ("gear", CardType::Gear),
        ("equipment", CardType::Gear),
        ("rune", CardType::Rune),
        ("legend", CardType::Legend),
        ("battlefield", CardType::Battlefield),
    ])
});

/// Champion identity → fixed domain pair. Order matters: the first match
/// wins when several champions could apply.
pub const CHAMPION_DOMAINS: &[(&str, [Domain; 2])] = &[
    ("Teemo", [Domain::Mind, Domain::Chaos]),
    ("Garen", [Domain::Order, Domain::Body]),
    ("Darius", [Domain::Fury, Domain::Order]),
    ("Ahri", [Domain::Mind, Domain::Calm]),
    ("Kai'Sa", [Domain::Fury, Domain::Mind]),
    ("Volibear", [Domain::Fury, Domain::Body]),
    ("Jinx", [Domain::Fury, Domain::Chaos]),
    ("Lee Sin", [Domain::Fury, Domain::Calm]),
    ("Yasuo", [Domain::Calm, Domain::Chaos]),
    ("Irelia", [Domain::Calm, Domain::Chaos]),
    ("Leona", [Domain::Order, Domain::Calm]),
    ("Viktor", [Domain::Mind, Domain::Order]),
    ("Miss Fortune", [Domain::Fury, Domain::Chaos]),
    ("Sett", [Domain::Order, Domain::Body]),
    ("Annie", [Domain::Fury, Domain::Chaos]),
    ("Master Yi", [Domain::Body, Domain::Calm]),
    ("Lux", [Domain::Mind, Domain::Order]),
    ("Draven", [Domain::Fury, Domain::Chaos]),
    ("Azir", [Domain::Order, Domain::Calm]),
    ("Renata Glasc", [Domain::Mind, Domain::Order]),
    ("Sivir", [Domain::Order, Domain::Chaos]),
];

pub fn champion_domains(champion: &str) -> Option<[Domain; 2]> {
    CHAMPION_DOMAINS
        .iter()
        .find(|(name, _)| *name == champion)
        .map(|(_, domains)| *domains)
}
