use riftbound_porter::card::CardType;
use riftbound_porter::config::ReconcileConfig;
use riftbound_porter::pipeline::processing::normalize::synonyms::{
    EFFECT_SYNONYMS, KEYWORD_SYNONYMS,
};
use riftbound_porter::pipeline::processing::normalize::{canonicalize_values, normalize_cost, normalize_effects};
use riftbound_porter::pipeline::storage::clean_filename;
use riftbound_porter::pipeline::Reconciler;
use riftbound_porter::types::RawRecord;
use serde_json::{json, Value};

fn reconciler() -> Reconciler {
    Reconciler::new(ReconcileConfig::default()).expect("bundled schema compiles")
}

fn raw(value: Value) -> RawRecord {
    RawRecord::from_value(value).unwrap()
}

/// A spread of messy extractor outputs that should all be accepted
fn messy_records() -> Vec<Value> {
    vec![
        json!({"name": "Volibear, Relentless Storm", "type": "Legend", "tags": "Volibear",
               "domains": ["red"], "rules_text": "When I attack,\r\n\r\n   deal 2 damage."}),
        json!({"name": "Charging Yeti", "type_line": "Unit — Yeti", "cost_energy": "4",
               "cost_power": "Body 2", "might": "5", "keywords": "Tank"}),
        json!({"name": "Mystic Shot", "type": "SPELL", "domain": "mind",
               "cost": {"energy": 2, "power": [{"domain": "Mind"}, {"domain": "order", "amount": 1}]},
               "effects": [{"effect": " Deal DMG ", "params": {"amount": 2}}, {"effect": ""}]}),
        json!({"name": "Long Sword", "type": "equipment", "cost": {"energy": 1, "power": []},
               "keywords": ["Equip", "equip", 0, null], "tags": ["", "Weapon"]}),
        json!({"name": "Sett, The Boss", "type": "Champion Unit", "supertypes": "champion",
               "cost": {"energy": 5, "power": "order"}, "stats": {"might": 6, "armor": "x"}}),
    ]
}

#[test]
fn second_pass_is_byte_identical() {
    let reconciler = reconciler();
    for record in messy_records() {
        let first = reconciler.reconcile(&raw(record), None).unwrap().card;
        let first_json = first.to_json_pretty().unwrap();

        let reparsed = raw(serde_json::from_str(&first_json).unwrap());
        let second = reconciler.reconcile(&reparsed, None).unwrap().card;
        assert_eq!(first_json, second.to_json_pretty().unwrap());
    }
}

#[test]
fn domain_is_set_exactly_when_one_domain_applies() {
    let reconciler = reconciler();
    for record in messy_records() {
        let card = reconciler.reconcile(&raw(record), None).unwrap().card;
        assert_eq!(card.domain.is_some(), card.domains.len() == 1, "{}", card.name);
        if let Some(domain) = &card.domain {
            assert!(card.domains.contains(domain));
        }
    }
}

#[test]
fn non_legends_always_carry_energy() {
    let reconciler = reconciler();
    for record in messy_records() {
        let card = reconciler.reconcile(&raw(record), None).unwrap().card;
        if card.card_type != CardType::Legend {
            assert!(card.cost.energy.is_some(), "{}", card.name);
        }
    }
}

#[test]
fn legacy_flat_keys_are_accepted() {
    let card = reconciler()
        .reconcile(&raw(messy_records().remove(1)), None)
        .unwrap()
        .card;
    assert_eq!(card.card_type, CardType::Unit);
    assert_eq!(card.cost.energy, Some(4));
    assert_eq!(card.cost.power[0].domain, "BODY");
    assert_eq!(card.cost.power[0].amount, 2);
    assert_eq!(card.stats.might, Some(5));
    assert_eq!(card.keywords, vec!["TANK"]);
}

#[test]
fn keyword_canonicalization_example() {
    let values = [json!("gear"), json!("Legend"), json!("legend")];
    assert_eq!(canonicalize_values(&values, &KEYWORD_SYNONYMS), vec!["GEAR", "LEGEND"]);
}

#[test]
fn cost_normalization_example() {
    let cost = normalize_cost(Some(&json!({"energy": "3", "power": [{"domain": "body", "amount": 2}]})));
    assert_eq!(cost.energy, Some(3));
    assert_eq!(cost.power.len(), 1);
    assert_eq!(cost.power[0].domain, "BODY");
    assert_eq!(cost.power[0].amount, 2);
}

#[test]
fn conflicting_domain_fields_example() {
    let card = reconciler()
        .reconcile(
            &raw(json!({"name": "Scrapper", "type": "unit", "domain": "Fury", "domains": ["Body"],
                        "cost": {"energy": 2}})),
            None,
        )
        .unwrap()
        .card;
    assert_eq!(card.domain, None);
    let mut domains = card.domains.clone();
    domains.sort();
    assert_eq!(domains, vec!["BODY", "FURY"]);
}

#[test]
fn signature_spell_example() {
    let card = reconciler()
        .reconcile(
            &raw(json!({"name": "Fishbones Barrage", "type": "spell", "cost": {"energy": 3},
                        "rules_text": "Signature Spell · JINX", "tags": ["Signature"]})),
            None,
        )
        .unwrap()
        .card;
    assert_eq!(card.domains, vec!["FURY", "CHAOS"]);
}

#[test]
fn legend_without_energy_example() {
    let card = reconciler()
        .reconcile(&raw(json!({"name": "Ahri, Nine-Tailed Fox", "type": "LEGEND"})), None)
        .unwrap()
        .card;
    assert_eq!(card.cost.energy, None);
    assert_eq!(card.domains, vec!["MIND", "CALM"]);
}

#[test]
fn filename_example() {
    assert_eq!(clean_filename("Jinx!  Wild   Ride?"), "Jinx_Wild_Ride");
    assert_eq!(clean_filename("?!"), "card");
}

#[test]
fn effect_synonym_examples() {
    let effects = normalize_effects(&[json!({"effect": "score_point"}), json!({"effect": "draw_card"})]);
    assert_eq!(effects[0].effect, "score_vp");
    assert_eq!(effects[1].effect, "draw_cards");
    assert_eq!(EFFECT_SYNONYMS.get("score_point"), Some(&"score_vp"));
}
