use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::card::{CanonicalCard, Domain};
use crate::error::{PorterError, Result};

/// Structural contract for canonical cards, bundled at build time
pub const CARD_SCHEMA_SOURCE: &str = include_str!("../../../../schemas/card.v1.json");

static CARD_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(CARD_SCHEMA_SOURCE).unwrap_or(Value::Null)
});

/// Quality gate decision for a normalized card
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ValidationDecision {
    /// Card meets the contract and is written
    Accept,
    /// Card meets the contract but something looks off
    AcceptWithWarnings,
    /// Card violates the contract and is skipped
    Reject,
}

/// One broken rule. `field` is a dotted path such as `cost.energy`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationReport {
    pub decision: ValidationDecision,
    pub violations: Vec<Violation>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_rejected(&self) -> bool {
        self.decision == ValidationDecision::Reject
    }

    fn from_findings(violations: Vec<Violation>, warnings: Vec<String>) -> Self {
        let decision = if !violations.is_empty() {
            ValidationDecision::Reject
        } else if !warnings.is_empty() {
            ValidationDecision::AcceptWithWarnings
        } else {
            ValidationDecision::Accept
        };
        Self {
            decision,
            violations,
            warnings,
        }
    }
}

/// Validates normalized payloads against the card schema and a handful of
/// non-fatal consistency checks.
pub struct CardValidator {
    schema: JSONSchema,
    max_domains: usize,
}

impl std::fmt::Debug for CardValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardValidator")
            .field("max_domains", &self.max_domains)
            .finish_non_exhaustive()
    }
}

impl CardValidator {
    pub fn new(max_domains: usize) -> Result<Self> {
        if CARD_SCHEMA.is_null() {
            return Err(PorterError::Schema(
                "bundled card schema is not valid JSON".to_string(),
            ));
        }
        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&CARD_SCHEMA)
            .map_err(|e| PorterError::Schema(format!("failed to compile card schema: {}", e)))?;

        Ok(Self {
            schema,
            max_domains,
        })
    }

    /// Collect every violated rule and every warning for `payload`.
    pub fn validate(&self, payload: &Value) -> ValidationReport {
        let mut violations = Vec::new();

        if let Err(errors) = self.schema.validate(payload) {
            for error in errors {
                let violation = Violation {
                    field: violation_field(&error.instance_path.to_string(), &error.kind),
                    message: error.to_string(),
                };
                if !violations.contains(&violation) {
                    violations.push(violation);
                }
            }
        }

        // the schema is the contract, but the typed model must also accept it
        if violations.is_empty() {
            if let Err(e) = serde_json::from_value::<CanonicalCard>(payload.clone()) {
                violations.push(Violation {
                    field: "$".to_string(),
                    message: e.to_string(),
                });
            }
        }

        let warnings = self.domain_warnings(payload);
        debug!(
            "Validation finished with {} violations and {} warnings",
            violations.len(),
            warnings.len()
        );
        ValidationReport::from_findings(violations, warnings)
    }

    /// Validate and, when accepted, produce the typed card.
    pub fn accept(
        &self,
        payload: &Value,
    ) -> std::result::Result<(CanonicalCard, ValidationReport), ValidationReport> {
        let report = self.validate(payload);
        if report.is_rejected() {
            return Err(report);
        }
        match serde_json::from_value::<CanonicalCard>(payload.clone()) {
            Ok(card) => Ok((card, report)),
            Err(e) => Err(ValidationReport::from_findings(
                vec![Violation {
                    field: "$".to_string(),
                    message: e.to_string(),
                }],
                report.warnings,
            )),
        }
    }

    fn domain_warnings(&self, payload: &Value) -> Vec<String> {
        let mut warnings = Vec::new();
        let domains: Vec<&str> = payload
            .get("domains")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let domain = payload.get("domain").and_then(Value::as_str);

        if domains.len() > self.max_domains {
            warnings.push(format!(
                "card has {} domains, expected at most {}",
                domains.len(),
                self.max_domains
            ));
        }

        for token in domains.iter().chain(domain.iter()) {
            if !Domain::is_canonical(token) {
                warnings.push(format!("unknown domain token '{}'", token));
            }
        }

        match (domain, domains.as_slice()) {
            (Some(primary), [only]) if primary == *only => {}
            (None, [_]) => warnings.push("single domain but 'domain' is null".to_string()),
            (Some(primary), _) if !domains.contains(&primary) => {
                warnings.push(format!("'domain' {} is not listed in 'domains'", primary))
            }
            (Some(_), _) => warnings.push(format!(
                "'domain' is set but {} domains apply",
                domains.len()
            )),
            (None, _) => {}
        }

        warnings
    }
}

/// `/cost/energy` → `cost.energy`; required-property errors name the
/// missing property.
fn violation_field(instance_path: &str, kind: &ValidationErrorKind) -> String {
    let mut parts: Vec<String> = instance_path
        .split('/')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if let ValidationErrorKind::Required { property } = kind {
        match property {
            Value::String(name) => parts.push(name.clone()),
            other => parts.push(other.to_string()),
        }
    }
    if parts.is_empty() {
        "$".to_string()
    } else {
        parts.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> CardValidator {
        CardValidator::new(2).unwrap()
    }

    fn valid_unit() -> Value {
        json!({
            "schema_version": 1,
            "name": "Sett, The Boss",
            "supertypes": ["CHAMPION"],
            "type": "UNIT",
            "domain": null,
            "domains": ["ORDER", "BODY"],
            "cost": {"energy": 5, "power": [{"domain": "BODY", "amount": 1}]},
            "stats": {"might": 5, "damage": null, "armor": null},
            "keywords": [],
            "tags": ["SETT"],
            "rules_text": "",
            "effects": [],
            "flavor": null,
            "artist": null,
            "card_id": null
        })
    }

    #[test]
    fn test_valid_card_is_accepted() {
        let report = validator().validate(&valid_unit());
        assert_eq!(report.decision, ValidationDecision::Accept);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn test_legend_without_energy_is_accepted() {
        let payload = json!({
            "schema_version": 1,
            "name": "Jinx, Loose Cannon",
            "type": "LEGEND",
            "cost": {"power": []}
        });
        let (card, report) = validator().accept(&payload).unwrap();

        assert_eq!(report.decision, ValidationDecision::Accept);
        assert_eq!(card.cost.energy, None);
    }

    #[test]
    fn test_unit_needs_energy() {
        let mut payload = valid_unit();
        payload["cost"]["energy"] = Value::Null;
        let report = validator().validate(&payload);

        assert!(report.is_rejected());
        assert!(report.violations.iter().any(|v| v.field == "cost.energy"));
    }

    #[test]
    fn test_all_violations_are_reported() {
        let mut payload = valid_unit();
        payload["name"] = json!("");
        payload["type"] = json!("CREATURE");
        payload["stats"]["might"] = json!(-2);
        payload["cost"]["power"] = json!([{"domain": "FURY", "amount": 0}]);
        let report = validator().validate(&payload);

        let fields: Vec<&str> = report.violations.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"type"));
        assert!(fields.contains(&"stats.might"));
        assert!(fields.contains(&"cost.power.0.amount"));
    }

    #[test]
    fn test_missing_name_names_the_field() {
        let mut payload = valid_unit();
        payload.as_object_mut().unwrap().remove("name");
        let report = validator().validate(&payload);

        assert_eq!(report.violations[0].field, "name");
    }

    #[test]
    fn test_three_domains_is_only_a_warning() {
        let mut payload = valid_unit();
        payload["domains"] = json!(["ORDER", "BODY", "FURY"]);
        let report = validator().validate(&payload);

        assert_eq!(report.decision, ValidationDecision::AcceptWithWarnings);
        assert!(report.warnings[0].contains("3 domains"));
    }

    #[test]
    fn test_unknown_domain_and_drift_warnings() {
        let mut payload = valid_unit();
        payload["domains"] = json!(["SHADOW"]);
        payload["domain"] = Value::Null;
        let report = validator().validate(&payload);

        assert_eq!(report.decision, ValidationDecision::AcceptWithWarnings);
        assert!(report.warnings.iter().any(|w| w.contains("SHADOW")));
        assert!(report.warnings.iter().any(|w| w.contains("single domain")));
    }

    #[test]
    fn test_field_paths() {
        let kind = ValidationErrorKind::Required {
            property: json!("energy"),
        };
        assert_eq!(violation_field("/cost", &kind), "cost.energy");
        assert_eq!(violation_field("", &ValidationErrorKind::FalseSchema), "$");
    }
}
