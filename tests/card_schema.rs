use riftbound_porter::card::CanonicalCard;
use riftbound_porter::pipeline::processing::quality_gate::{
    CardValidator, ValidationDecision, CARD_SCHEMA_SOURCE,
};
use serde_json::{json, Value};

fn validator() -> CardValidator {
    CardValidator::new(2).unwrap()
}

fn unit() -> Value {
    json!({
        "schema_version": 1,
        "name": "Recruit",
        "supertypes": [],
        "type": "UNIT",
        "domain": "ORDER",
        "domains": ["ORDER"],
        "cost": {"energy": 2, "power": [{"domain": "ORDER", "amount": 1}]},
        "stats": {"might": 2, "damage": null, "armor": null},
        "keywords": [],
        "tags": [],
        "rules_text": "",
        "effects": [],
        "flavor": null,
        "artist": null,
        "card_id": null
    })
}

#[test]
fn schema_document_is_draft7_json() {
    let schema: Value = serde_json::from_str(CARD_SCHEMA_SOURCE).unwrap();
    assert_eq!(schema["$schema"], "http://json-schema.org/draft-07/schema#");
    let types = schema["properties"]["type"]["enum"].as_array().unwrap();
    assert_eq!(types.len(), 6);
}

#[test]
fn canonical_card_round_trips_through_validation() {
    let (card, report) = validator().accept(&unit()).unwrap();
    assert_eq!(report.decision, ValidationDecision::Accept);

    let reserialized: Value = serde_json::to_value(&card).unwrap();
    assert_eq!(reserialized, unit());
    let _: CanonicalCard = serde_json::from_value(reserialized).unwrap();
}

#[test]
fn negative_numbers_are_rejected() {
    let mut card = unit();
    card["cost"]["energy"] = json!(-1);
    card["stats"]["might"] = json!(-3);
    card["cost"]["power"][0]["amount"] = json!(0);

    let report = validator().validate(&card);
    assert!(report.is_rejected());
    let fields: Vec<&str> = report.violations.iter().map(|v| v.field.as_str()).collect();
    assert!(fields.contains(&"cost.energy"));
    assert!(fields.contains(&"stats.might"));
    assert!(fields.contains(&"cost.power.0.amount"));
}

#[test]
fn unknown_fields_are_rejected() {
    let mut card = unit();
    card["rarity"] = json!("epic");
    assert!(validator().validate(&card).is_rejected());
}

#[test]
fn legend_energy_is_optional() {
    let mut card = unit();
    card["type"] = json!("LEGEND");
    card["cost"] = json!({"energy": null, "power": []});
    assert!(!validator().validate(&card).is_rejected());
}
