use serde_json::{json, Map, Value};

use super::cost::CostDraft;
use super::synonyms::TYPE_SYNONYMS;
use crate::card::{CardEffect, CardType};
use crate::constants::CURRENT_SCHEMA_VERSION;
use crate::types::{coerce_int, scalar_text, truthy_text, OneOrMany, RawRecord};

/// Category aliases checked, in order, against a free-form type line
const TYPE_LINE_ALIASES: [(&str, CardType); 6] = [
    ("unit", CardType::Unit),
    ("spell", CardType::Spell),
    ("gear", CardType::Gear),
    ("rune", CardType::Rune),
    ("legend", CardType::Legend),
    ("battlefield", CardType::Battlefield),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsDraft {
    pub might: Option<i64>,
    pub damage: Option<i64>,
    pub armor: Option<i64>,
}

/// Typed working copy of a card while it moves through the pipeline.
///
/// Fields start out holding the collapsed raw values and are rewritten in
/// place by each stage. Numbers stay signed so that bad extractions survive
/// until validation can report them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardDraft {
    pub schema_version: i64,
    pub name: String,
    pub supertypes: Vec<String>,
    /// Canonical type token, or the uppercased raw text when unresolvable
    pub card_type: String,
    pub domain: Option<String>,
    pub domains: Vec<String>,
    pub cost: CostDraft,
    pub stats: StatsDraft,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub rules_text: String,
    pub effects: Vec<CardEffect>,
    pub flavor: Option<String>,
    pub artist: Option<String>,
    pub card_id: Option<String>,

    /// Cost as extracted, consumed by the cost stage
    pub raw_cost: Option<Value>,
    /// Effect entries as extracted, consumed by the effects stage
    pub raw_effects: Vec<Value>,
}

impl CardDraft {
    /// Collapse a raw record into a draft, filling defaults for every
    /// optional collection and accepting the legacy flat keys.
    pub fn ingest(raw: &RawRecord) -> Self {
        let type_text = raw.text("type").or_else(|| raw.text("type_line"));

        let domain = raw
            .get("domain")
            .and_then(truthy_text)
            .or_else(|| raw.get("domain_icon").and_then(truthy_text));

        Self {
            schema_version: raw
                .get("schema_version")
                .and_then(coerce_int)
                .unwrap_or(CURRENT_SCHEMA_VERSION as i64),
            name: raw.name().unwrap_or_default(),
            supertypes: raw.terms("supertypes"),
            card_type: type_text.as_deref().map(resolve_card_type).unwrap_or_default(),
            domain,
            domains: raw.terms("domains"),
            cost: CostDraft::default(),
            stats: ingest_stats(raw),
            keywords: raw.terms("keywords"),
            tags: raw.terms("tags"),
            rules_text: raw.get("rules_text").and_then(scalar_text).unwrap_or_default(),
            effects: Vec::new(),
            flavor: raw.get("flavor").and_then(scalar_text),
            artist: raw.get("artist").and_then(scalar_text),
            card_id: raw.get("card_id").and_then(scalar_text),
            raw_cost: ingest_cost(raw),
            raw_effects: raw
                .get("effects")
                .and_then(OneOrMany::from_value)
                .map(OneOrMany::into_vec)
                .unwrap_or_default(),
        }
    }

    pub fn is_spell(&self) -> bool {
        self.card_type == CardType::Spell.as_str()
    }

    /// Render the draft as the JSON payload handed to validation.
    pub fn to_payload(&self) -> Value {
        let power: Vec<Value> = self
            .cost
            .power
            .iter()
            .map(|p| json!({"domain": p.domain, "amount": p.amount}))
            .collect();
        let effects: Vec<Value> = self
            .effects
            .iter()
            .map(|e| json!({"effect": e.effect, "params": Value::Object(e.params.clone())}))
            .collect();

        json!({
            "schema_version": self.schema_version,
            "name": self.name,
            "supertypes": self.supertypes,
            "type": self.card_type,
            "domain": self.domain,
            "domains": self.domains,
            "cost": {
                "energy": self.cost.energy,
                "power": power,
            },
            "stats": {
                "might": self.stats.might,
                "damage": self.stats.damage,
                "armor": self.stats.armor,
            },
            "keywords": self.keywords,
            "tags": self.tags,
            "rules_text": self.rules_text,
            "effects": effects,
            "flavor": self.flavor,
            "artist": self.artist,
            "card_id": self.card_id,
        })
    }
}

/// Resolve a type line to a canonical type token.
///
/// Exact aliases win; otherwise the first category word contained in the
/// line is used. Unresolvable text is returned uppercased.
pub fn resolve_card_type(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    if let Some(card_type) = TYPE_SYNONYMS.get(lowered.as_str()) {
        return card_type.as_str().to_string();
    }
    TYPE_LINE_ALIASES
        .iter()
        .find(|(alias, _)| lowered.contains(alias))
        .map(|(_, card_type)| card_type.as_str().to_string())
        .unwrap_or_else(|| text.trim().to_uppercase())
}

fn ingest_stats(raw: &RawRecord) -> StatsDraft {
    let nested = raw.get("stats").and_then(Value::as_object);
    let stat = |key: &str| {
        nested
            .and_then(|stats| stats.get(key))
            .filter(|v| !v.is_null())
            .or_else(|| raw.get(key))
            .and_then(coerce_int)
    };

    StatsDraft {
        might: stat("might"),
        damage: stat("damage"),
        armor: stat("armor"),
    }
}

/// Nested `cost` object, completed from `cost_energy` / `cost_power` when
/// the nested keys are missing.
fn ingest_cost(raw: &RawRecord) -> Option<Value> {
    let mut cost: Map<String, Value> = match raw.get("cost") {
        Some(Value::Object(map)) => map.clone(),
        Some(_) => Map::new(),
        None if raw.get("cost_energy").is_none() && raw.get("cost_power").is_none() => {
            return None;
        }
        None => Map::new(),
    };

    for (nested, legacy) in [("energy", "cost_energy"), ("power", "cost_power")] {
        let missing = cost.get(nested).map(Value::is_null).unwrap_or(true);
        if missing {
            if let Some(value) = raw.get(legacy) {
                cost.insert(nested.to_string(), value.clone());
            }
        }
    }

    Some(Value::Object(cost))
}
