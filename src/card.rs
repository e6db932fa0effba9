use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::constants::CURRENT_SCHEMA_VERSION;

/// Card type printed on the type line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardType {
    Unit,
    Spell,
    Gear,
    Rune,
    Legend,
    Battlefield,
}

impl CardType {
    pub const ALL: [CardType; 6] = [
        CardType::Unit,
        CardType::Spell,
        CardType::Gear,
        CardType::Rune,
        CardType::Legend,
        CardType::Battlefield,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Unit => "UNIT",
            CardType::Spell => "SPELL",
            CardType::Gear => "GEAR",
            CardType::Rune => "RUNE",
            CardType::Legend => "LEGEND",
            CardType::Battlefield => "BATTLEFIELD",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        CardType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| format!("unknown card type '{}'", s))
    }
}

/// The six color affinities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Domain {
    Fury,
    Calm,
    Mind,
    Body,
    Chaos,
    Order,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::Fury,
        Domain::Calm,
        Domain::Mind,
        Domain::Body,
        Domain::Chaos,
        Domain::Order,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Fury => "FURY",
            Domain::Calm => "CALM",
            Domain::Mind => "MIND",
            Domain::Body => "BODY",
            Domain::Chaos => "CHAOS",
            Domain::Order => "ORDER",
        }
    }

    /// Hue center (degrees) of the domain's icon color
    pub fn hue(&self) -> f64 {
        match self {
            Domain::Fury => 0.0,
            Domain::Calm => 125.0,
            Domain::Mind => 210.0,
            Domain::Body => 30.0,
            Domain::Chaos => 285.0,
            Domain::Order => 55.0,
        }
    }

    pub fn is_canonical(token: &str) -> bool {
        Domain::ALL.iter().any(|d| d.as_str() == token)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerCost {
    pub domain: String,
    pub amount: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardCost {
    pub energy: Option<u32>,
    #[serde(default)]
    pub power: Vec<PowerCost>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStats {
    pub might: Option<u32>,
    pub damage: Option<u32>,
    pub armor: Option<u32>,
}

/// Effect description; `params` is carried opaquely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardEffect {
    pub effect: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Canonical representation of a single card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalCard {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Name including any champion subtitle
    pub name: String,

    #[serde(default)]
    pub supertypes: Vec<String>,
    #[serde(rename = "type")]
    pub card_type: CardType,

    pub domain: Option<String>,
    #[serde(default)]
    pub domains: Vec<String>,

    pub cost: CardCost,
    #[serde(default)]
    pub stats: CardStats,

    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub rules_text: String,
    #[serde(default)]
    pub effects: Vec<CardEffect>,

    pub flavor: Option<String>,
    pub artist: Option<String>,
    pub card_id: Option<String>,
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

impl CanonicalCard {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_card_type_parses_case_insensitively() {
        assert_eq!("legend".parse::<CardType>().unwrap(), CardType::Legend);
        assert_eq!(" Unit ".parse::<CardType>().unwrap(), CardType::Unit);
        assert!("CHAMPION UNIT".parse::<CardType>().is_err());
    }

    #[test]
    fn test_card_serializes_with_wire_field_names() {
        let card = CanonicalCard {
            schema_version: 1,
            name: "Jinx, Loose Cannon".to_string(),
            supertypes: vec!["CHAMPION".to_string()],
            card_type: CardType::Unit,
            domain: None,
            domains: vec!["FURY".to_string(), "CHAOS".to_string()],
            cost: CardCost {
                energy: Some(4),
                power: vec![PowerCost { domain: "FURY".to_string(), amount: 1 }],
            },
            stats: CardStats { might: Some(4), damage: None, armor: None },
            keywords: vec![],
            tags: vec!["JINX".to_string()],
            rules_text: String::new(),
            effects: vec![],
            flavor: None,
            artist: None,
            card_id: Some("OGN-001".to_string()),
        };

        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["type"], json!("UNIT"));
        assert_eq!(value["cost"]["power"][0]["amount"], json!(1));
        assert_eq!(value["stats"]["damage"], json!(null));
        assert_eq!(value["card_id"], json!("OGN-001"));
        assert!(value.get("card_type").is_none());
    }
}
