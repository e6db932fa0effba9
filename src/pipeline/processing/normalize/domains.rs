//! Domain resolution.
//!
//! Domain signals are redundant and often contradict each other: explicit
//! fields, power icons, champion identity, signature-spell markers and a
//! sampled image color. Each stage below may rewrite `domain`/`domains` on a
//! [`CardDraft`]; [`harmonize`] always runs last and establishes the final
//! invariant (`domain` is set iff exactly one domain applies).

use serde::Serialize;
use tracing::debug;

use super::draft::CardDraft;
use super::synonyms::{champion_domains, CHAMPION_DOMAINS, DOMAIN_SYNONYMS};
use super::terms::{canonicalize_term, canonicalize_terms};
use crate::card::{Domain, PowerCost};
use crate::color::DomainColorSample;
use crate::config::ReconcileConfig;

const SIGNATURE_MARKER: &str = "SIGNATURE SPELL";
const SIGNATURE_TAG: &str = "SIGNATURE";

/// Which stage last decided the domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainSource {
    ColorHint,
    SignatureSpell,
    Champion,
    SpellPower,
    Harmonized,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainStep {
    pub source: DomainSource,
    pub domains: Vec<String>,
    /// Champion name or confidence that triggered the stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Audit trail of the stages that fired for one card
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DomainResolution {
    pub steps: Vec<DomainStep>,
}

impl DomainResolution {
    fn record(&mut self, source: DomainSource, domains: &[String], detail: Option<String>) {
        debug!("Domain stage {:?} set {:?} ({:?})", source, domains, detail);
        self.steps.push(DomainStep {
            source,
            domains: domains.to_vec(),
            detail,
        });
    }

    pub fn fired(&self, source: DomainSource) -> bool {
        self.steps.iter().any(|s| s.source == source)
    }
}

/// Apply a sampled color hint when the extractor gave no domain signal at
/// all. Returns whether the hint was used.
pub fn apply_color_hint(
    draft: &mut CardDraft,
    hint: Option<&DomainColorSample>,
    config: &ReconcileConfig,
    trace: &mut DomainResolution,
) -> bool {
    let hint = match hint {
        Some(h) if h.confidence >= config.color_hint_min_confidence && !h.is_empty() => h,
        _ => return false,
    };

    let has_domain = draft.domain.as_deref().map(|d| !d.trim().is_empty()).unwrap_or(false);
    if draft.cost.has_power() || !draft.domains.is_empty() || has_domain {
        // structured data wins; the hint is advisory only
        return false;
    }

    let inferred = canonicalize_terms(&hint.domains, &DOMAIN_SYNONYMS);
    if inferred.is_empty() {
        return false;
    }

    let replacement: Vec<PowerCost> = match inferred.as_slice() {
        [single] => vec![PowerCost {
            domain: single.clone(),
            amount: matching_power_total(&draft.cost.power, single).max(1),
        }],
        many => many
            .iter()
            .map(|domain| PowerCost {
                domain: domain.clone(),
                amount: 1,
            })
            .collect(),
    };

    let existing: Vec<&str> = draft.cost.power.iter().map(|p| p.domain.as_str()).collect();
    let mismatch = existing
        .iter()
        .any(|d| !inferred.iter().take(existing.len()).any(|i| i.as_str() == *d));
    if mismatch || existing.is_empty() || hint.confidence >= config.color_hint_cost_confidence {
        draft.cost.power = replacement;
    }

    draft.domain = single_domain(&inferred);
    draft.domains = inferred;
    trace.record(
        DomainSource::ColorHint,
        &draft.domains,
        Some(format!("confidence {:.2}", hint.confidence)),
    );
    true
}

fn matching_power_total(power: &[PowerCost], domain: &str) -> u32 {
    power
        .iter()
        .filter(|p| p.domain == domain)
        .map(|p| p.amount)
        .fold(0u32, u32::saturating_add)
}

/// Champion named by a signature-spell marker, if any.
///
/// Either the rules text carries "SIGNATURE SPELL" followed somewhere by a
/// champion name, or the tags contain both `SIGNATURE` and a champion.
pub fn detect_signature_spell(draft: &CardDraft) -> Option<&'static str> {
    let text = draft.rules_text.to_uppercase();
    if let Some(pos) = text.find(SIGNATURE_MARKER) {
        let tail = &text[pos + SIGNATURE_MARKER.len()..];
        let champion = CHAMPION_DOMAINS
            .iter()
            .map(|(name, _)| *name)
            .find(|name| tail.contains(&name.to_uppercase()));
        if champion.is_some() {
            return champion;
        }
    }

    let tags: Vec<String> = draft.tags.iter().map(|t| t.to_uppercase()).collect();
    if tags.iter().any(|t| t == SIGNATURE_TAG) {
        return CHAMPION_DOMAINS
            .iter()
            .find(|(name, _)| tags.contains(&name.to_uppercase()))
            .map(|(name, _)| *name);
    }

    None
}

pub fn override_signature_spell(draft: &mut CardDraft, trace: &mut DomainResolution) -> bool {
    let Some(champion) = detect_signature_spell(draft) else {
        return false;
    };
    let Some(pair) = champion_domains(champion) else {
        return false;
    };
    force_pair(draft, &pair);
    trace.record(DomainSource::SignatureSpell, &draft.domains, Some(champion.to_string()));
    true
}

/// First champion (in table order) named in the card name or equal to a tag
pub fn detect_champion(draft: &CardDraft) -> Option<&'static str> {
    let name = draft.name.to_uppercase();
    let tags: Vec<String> = draft.tags.iter().map(|t| t.to_uppercase()).collect();

    CHAMPION_DOMAINS
        .iter()
        .map(|(champion, _)| *champion)
        .find(|champion| {
            let upper = champion.to_uppercase();
            tags.contains(&upper) || name.contains(&upper)
        })
}

pub fn override_champion(draft: &mut CardDraft, trace: &mut DomainResolution) -> bool {
    let Some(champion) = detect_champion(draft) else {
        return false;
    };
    let Some(pair) = champion_domains(champion) else {
        return false;
    };
    force_pair(draft, &pair);
    trace.record(DomainSource::Champion, &draft.domains, Some(champion.to_string()));
    true
}

fn force_pair(draft: &mut CardDraft, pair: &[Domain; 2]) {
    draft.domains = pair.iter().map(|d| d.as_str().to_string()).collect();
    draft.domain = draft.domains.first().cloned();
}

/// Spells take their domains from power-icon order, ignoring any earlier
/// domain fields. No icons, no change.
pub fn apply_spell_power(draft: &mut CardDraft, trace: &mut DomainResolution) -> bool {
    if !draft.is_spell() {
        return false;
    }
    let from_power =
        canonicalize_terms(draft.cost.power.iter().map(|p| p.domain.as_str()), &DOMAIN_SYNONYMS);
    if from_power.is_empty() {
        return false;
    }

    draft.domain = single_domain(&from_power);
    draft.domains = from_power;
    trace.record(DomainSource::SpellPower, &draft.domains, None);
    true
}

/// Canonicalize `domains` and `domain`, fold `domain` into the list, then
/// keep `domain` only when exactly one domain remains.
pub fn harmonize(draft: &mut CardDraft, trace: &mut DomainResolution) {
    let mut domains = canonicalize_terms(&draft.domains, &DOMAIN_SYNONYMS);
    if let Some(primary) = draft
        .domain
        .as_deref()
        .and_then(|d| canonicalize_term(d, &DOMAIN_SYNONYMS))
    {
        if !domains.contains(&primary) {
            domains.push(primary);
        }
    }

    draft.domain = single_domain(&domains);
    draft.domains = domains;
    trace.record(DomainSource::Harmonized, &draft.domains, None);
}

fn single_domain(domains: &[String]) -> Option<String> {
    match domains {
        [only] => Some(only.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::normalize::cost::normalize_cost;
    use crate::types::RawRecord;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn draft(value: serde_json::Value) -> CardDraft {
        let mut draft = CardDraft::ingest(&RawRecord::from_value(value).unwrap());
        draft.cost = normalize_cost(draft.raw_cost.as_ref());
        draft
    }

    fn hint(domains: &[&str], confidence: f64) -> DomainColorSample {
        DomainColorSample {
            domains: domains.iter().map(|d| d.to_string()).collect(),
            confidence,
            weights: BTreeMap::new(),
        }
    }

    #[test]
    fn test_conflicting_domain_and_domains_merge() {
        let mut d = draft(json!({"name": "Mixed", "domain": "Fury", "domains": ["Body"]}));
        harmonize(&mut d, &mut DomainResolution::default());

        assert_eq!(d.domain, None);
        assert_eq!(d.domains, vec!["BODY", "FURY"]);
    }

    #[test]
    fn test_single_domain_sets_primary() {
        let mut d = draft(json!({"name": "Solo", "domains": "calm"}));
        harmonize(&mut d, &mut DomainResolution::default());

        assert_eq!(d.domain.as_deref(), Some("CALM"));
        assert_eq!(d.domains, vec!["CALM"]);
    }

    #[test]
    fn test_empty_domains_clear_primary() {
        let mut d = draft(json!({"name": "None", "domain": ""}));
        harmonize(&mut d, &mut DomainResolution::default());

        assert_eq!(d.domain, None);
        assert!(d.domains.is_empty());
    }

    #[test]
    fn test_signature_spell_from_rules_text_and_tag() {
        let mut d = draft(json!({
            "name": "Super Mega Death Rocket!",
            "type": "SPELL",
            "rules_text": "Signature Spell · JINX\nDeal 5 damage.",
            "tags": ["Signature"],
            "domains": ["Mind"]
        }));
        let mut trace = DomainResolution::default();

        assert_eq!(detect_signature_spell(&d), Some("Jinx"));
        assert!(override_signature_spell(&mut d, &mut trace));
        harmonize(&mut d, &mut trace);

        assert_eq!(d.domains, vec!["FURY", "CHAOS"]);
        assert_eq!(d.domain, None);
        assert!(trace.fired(DomainSource::SignatureSpell));
    }

    #[test]
    fn test_signature_tag_needs_champion_tag() {
        let d = draft(json!({"name": "Mystery", "tags": ["SIGNATURE"]}));
        assert_eq!(detect_signature_spell(&d), None);

        let d = draft(json!({"name": "Mystery", "tags": ["SIGNATURE", "Teemo"]}));
        assert_eq!(detect_signature_spell(&d), Some("Teemo"));
    }

    #[test]
    fn test_marker_only_scans_text_after_it() {
        let d = draft(json!({"name": "X", "rules_text": "Teemo laughs. Signature Spell"}));
        assert_eq!(detect_signature_spell(&d), None);
    }

    #[test]
    fn test_champion_in_name_uses_table_order() {
        let mut d = draft(json!({"name": "Garen, Might of Demacia", "domains": ["Fury"]}));
        assert!(override_champion(&mut d, &mut DomainResolution::default()));
        assert_eq!(d.domains, vec!["ORDER", "BODY"]);

        // Ahri precedes Lux in the table
        let d = draft(json!({"name": "Lux and Ahri"}));
        assert_eq!(detect_champion(&d), Some("Ahri"));
    }

    #[test]
    fn test_champion_tag_must_match_exactly() {
        let d = draft(json!({"name": "Poro", "tags": ["Jinxed"]}));
        assert_eq!(detect_champion(&d), None);

        let d = draft(json!({"name": "Poro", "tags": ["jinx"]}));
        assert_eq!(detect_champion(&d), Some("Jinx"));
    }

    #[test]
    fn test_spell_power_order_wins() {
        let mut d = draft(json!({
            "name": "Two Tone",
            "type": "spell",
            "domains": ["Calm"],
            "cost": {"energy": 2, "power": [{"domain": "mind"}, {"domain": "order"}]}
        }));
        assert!(apply_spell_power(&mut d, &mut DomainResolution::default()));
        assert_eq!(d.domains, vec!["MIND", "ORDER"]);
        assert_eq!(d.domain, None);
    }

    #[test]
    fn test_spell_power_ignores_units_and_iconless_spells() {
        let mut unit = draft(json!({"name": "U", "type": "unit", "cost": {"power": "fury"}}));
        assert!(!apply_spell_power(&mut unit, &mut DomainResolution::default()));

        let mut spell = draft(json!({"name": "S", "type": "spell", "domains": ["Calm"]}));
        assert!(!apply_spell_power(&mut spell, &mut DomainResolution::default()));
        assert_eq!(spell.domains, vec!["Calm"]);
    }

    #[test]
    fn test_color_hint_fills_missing_domains_and_cost() {
        let config = ReconcileConfig::default();
        let mut d = draft(json!({"name": "Blank", "type": "unit", "cost": {"energy": 3}}));
        let mut trace = DomainResolution::default();

        assert!(apply_color_hint(&mut d, Some(&hint(&["fury"], 0.7)), &config, &mut trace));
        assert_eq!(d.domains, vec!["FURY"]);
        assert_eq!(d.domain.as_deref(), Some("FURY"));
        assert_eq!(d.cost.power, vec![PowerCost { domain: "FURY".into(), amount: 1 }]);
        assert!(trace.fired(DomainSource::ColorHint));
    }

    #[test]
    fn test_color_hint_two_domains_one_icon_each() {
        let config = ReconcileConfig::default();
        let mut d = draft(json!({"name": "Blank"}));
        apply_color_hint(
            &mut d,
            Some(&hint(&["MIND", "CALM"], 0.9)),
            &config,
            &mut DomainResolution::default(),
        );

        assert_eq!(d.domains, vec!["MIND", "CALM"]);
        assert_eq!(d.domain, None);
        assert_eq!(d.cost.power.len(), 2);
        assert!(d.cost.power.iter().all(|p| p.amount == 1));
    }

    #[test]
    fn test_color_hint_is_advisory_when_structure_exists() {
        let config = ReconcileConfig::default();
        let strong = hint(&["BODY"], 0.95);

        let mut trace = DomainResolution::default();

        let mut with_power = draft(json!({"name": "P", "cost": {"power": ["chaos"]}}));
        assert!(!apply_color_hint(&mut with_power, Some(&strong), &config, &mut trace));
        assert_eq!(with_power.cost.power[0].domain, "CHAOS");

        let mut with_domain = draft(json!({"name": "D", "domain": "chaos"}));
        assert!(!apply_color_hint(&mut with_domain, Some(&strong), &config, &mut trace));
        assert_eq!(with_domain.domain.as_deref(), Some("chaos"));
        assert!(trace.steps.is_empty());
    }

    #[test]
    fn test_color_hint_below_threshold_is_ignored() {
        let mut config = ReconcileConfig::default();
        let faint = hint(&["FURY"], 0.5);
        let mut trace = DomainResolution::default();
        let mut d = draft(json!({"name": "Faint"}));

        assert!(!apply_color_hint(&mut d, Some(&faint), &config, &mut trace));
        assert!(d.domains.is_empty());

        config.color_hint_min_confidence = 0.4;
        assert!(apply_color_hint(&mut d, Some(&faint), &config, &mut trace));
    }
}
