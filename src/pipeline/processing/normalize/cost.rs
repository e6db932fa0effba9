use serde_json::Value;

use super::synonyms::DOMAIN_SYNONYMS;
use super::terms::canonicalize_term;
use crate::card::PowerCost;
use crate::types::{coerce_int, truthy_text, OneOrMany};

/// Cost after coercion. `energy` stays signed so a negative extraction
/// reaches validation instead of silently wrapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostDraft {
    pub energy: Option<i64>,
    pub power: Vec<PowerCost>,
}

impl CostDraft {
    pub fn has_power(&self) -> bool {
        !self.power.is_empty()
    }
}

/// Coerce a heterogeneous cost value into `{energy, power}`.
///
/// Never fails: a non-object cost is treated as empty, an unparseable energy
/// becomes `None`, and malformed power entries are dropped.
pub fn normalize_cost(cost: Option<&Value>) -> CostDraft {
    let cost = match cost {
        Some(Value::Object(map)) => map,
        _ => return CostDraft::default(),
    };

    let energy = cost.get("energy").and_then(coerce_int);

    let power = cost
        .get("power")
        .and_then(OneOrMany::from_value)
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .iter()
        .filter_map(normalize_power_entry)
        .collect();

    CostDraft { energy, power }
}

/// One power icon entry: either `{domain, amount}` or a domain-like scalar.
pub fn normalize_power_entry(entry: &Value) -> Option<PowerCost> {
    let (domain_raw, amount) = match entry {
        Value::Object(map) => {
            let domain_raw = map.get("domain").and_then(truthy_text)?;
            let amount = map.get("amount").and_then(coerce_int).unwrap_or(1);
            (domain_raw, amount)
        }
        other => split_legacy_power(&truthy_text(other)?),
    };

    let domain = canonicalize_term(&domain_raw, &DOMAIN_SYNONYMS)?;
    if amount < 1 {
        return None;
    }
    let amount = u32::try_from(amount).ok()?;

    Some(PowerCost { domain, amount })
}

/// `"Fury 2"` → (`"Fury"`, 2); anything else is a bare domain with amount 1.
fn split_legacy_power(text: &str) -> (String, i64) {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if let [domain, count] = parts.as_slice() {
        if count.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(amount) = count.parse::<i64>() {
                return (domain.to_string(), amount);
            }
        }
    }
    (text.to_string(), 1)
}
