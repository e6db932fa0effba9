use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::synonyms::EFFECT_SYNONYMS;
use crate::card::CardEffect;

/// Map raw effect objects onto the canonical effect vocabulary.
///
/// Non-objects are dropped. Identifiers are trimmed and lowercased, then
/// mapped through the effect synonym table; unknown identifiers stay
/// lowercase. `params` is passed through untouched, defaulting to `{}`.
/// Repeated effects are kept.
pub fn normalize_effects(effects: &[Value]) -> Vec<CardEffect> {
    effects
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            let name = match obj.get("effect") {
                Some(Value::String(s)) => s.trim().to_lowercase(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            // card.v1.json requires `effect` to have minLength 1
            if name.is_empty() {
                return None;
            }
            let effect = EFFECT_SYNONYMS
                .get(name.as_str())
                .map(|mapped| mapped.to_string())
                .unwrap_or(name);
            let params = match obj.get("params") {
                Some(Value::Object(params)) => params.clone(),
                _ => Map::new(),
            };
            Some(CardEffect { effect, params })
        })
        .collect()
}

static DAMAGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)deal (\d+) damage").expect("valid damage pattern"));
static HEAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)heal (\d+)").expect("valid heal pattern"));
static DRAW_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)draw (\d+)").expect("valid draw pattern"));

/// Effects implied by a keyword on its own
fn keyword_effects(keyword: &str) -> Vec<CardEffect> {
    let (name, params) = match keyword {
        "DEFLECT" => ("deflect", json!({"amount": 1})),
        "CHARGE" => ("charge", json!({"amount": 1})),
        "LEECH" => ("leech", json!({"amount": 1})),
        "BARRAGE" => ("barrage", json!({"amount": 1})),
        "HASTE" => ("haste", json!({})),
        "SLOW" => ("slow", json!({})),
        _ => return Vec::new(),
    };
    vec![effect(name, params)]
}

fn effect(name: &str, params: Value) -> CardEffect {
    CardEffect {
        effect: name.to_string(),
        params: match params {
            Value::Object(map) => map,
            _ => Map::new(),
        },
    }
}

/// Describe effects from keywords and rules text.
///
/// Each rules line yields at most one effect, checked in the order damage,
/// heal, draw. Results are deduplicated on `(effect, params)`.
pub fn derive_effects(keywords: &[String], rules_text: &str) -> Vec<CardEffect> {
    let mut derived: Vec<CardEffect> = Vec::new();

    for keyword in keywords {
        let mapped = keyword_effects(keyword);
        if mapped.is_empty() {
            debug!("No effect mapping for keyword {}", keyword);
        }
        derived.extend(mapped);
    }

    for line in rules_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(amount) = capture_amount(&DAMAGE_PATTERN, line) {
            derived.push(effect("deal_damage", json!({"amount": amount, "target": "opponent"})));
        } else if let Some(amount) = capture_amount(&HEAL_PATTERN, line) {
            derived.push(effect("heal", json!({"amount": amount})));
        } else if let Some(amount) = capture_amount(&DRAW_PATTERN, line) {
            derived.push(effect("draw_cards", json!({"amount": amount})));
        }
    }

    let mut deduped: Vec<CardEffect> = Vec::with_capacity(derived.len());
    for candidate in derived {
        if !deduped.contains(&candidate) {
            deduped.push(candidate);
        }
    }
    deduped
}

fn capture_amount(pattern: &Regex, line: &str) -> Option<u64> {
    pattern
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
