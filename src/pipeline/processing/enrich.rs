use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PorterError, Result};
use crate::types::{is_empty_value, scalar_text, RawRecord};

/// Top-level fields that may be filled from the library, paired with the
/// legacy key that also counts as "present" on the extracted record.
const GAP_FIELDS: [(&str, Option<&str>); 11] = [
    ("type", Some("type_line")),
    ("supertypes", None),
    ("domain", Some("domain_icon")),
    ("domains", None),
    ("keywords", None),
    ("tags", None),
    ("rules_text", None),
    ("effects", None),
    ("flavor", None),
    ("artist", None),
    ("card_id", None),
];

const COST_FIELDS: [(&str, &str); 2] = [("energy", "cost_energy"), ("power", "cost_power")];
const STAT_FIELDS: [&str; 3] = ["might", "damage", "armor"];

static JSON_CANDIDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*?\}").expect("valid candidate pattern"));

/// Name-keyed source of supplementary card data
pub trait ReferenceLibrary: Send + Sync {
    /// Record stored under exactly `name`
    fn get(&self, name: &str) -> Option<&Map<String, Value>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exact name first, then the title-cased name.
    fn lookup(&self, name: &str) -> Option<&Map<String, Value>> {
        self.get(name).or_else(|| self.get(&title_case(name)))
    }
}

/// Card library loaded from an HTML export or a JSON file
#[derive(Debug, Clone, Default)]
pub struct CardLibrary {
    records: HashMap<String, Map<String, Value>>,
}

impl ReferenceLibrary for CardLibrary {
    fn get(&self, name: &str) -> Option<&Map<String, Value>> {
        self.records.get(name)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

impl CardLibrary {
    /// Load `path`; `.json` files are read as JSON, anything else as HTML.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PorterError::Config(format!(
                "reference library '{}' does not exist",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let library = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_html(&content)
        };
        info!(
            "Loaded {} cards from reference library {}",
            library.len(),
            path.display()
        );
        Ok(library)
    }

    /// A JSON document: either `{name: record}` or `[{name, ...}]`.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        let mut library = Self::default();
        library.absorb_value(value);
        Ok(library)
    }

    /// Pull card data out of an HTML export.
    ///
    /// Recognized carriers are JSON inside `<script type="application/json">`
    /// or `<pre id="card-data">`, `data-card-json` attributes, and
    /// `<tr data-card-name=...>` rows whose `data-card-*` attributes form
    /// the record. Later blocks win over earlier ones.
    pub fn from_html(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut blocks: Vec<String> = Vec::new();

        // selectors are static strings; a parse failure yields no matches
        if let Ok(selector) = Selector::parse("[data-card-json]") {
            for element in document.select(&selector) {
                if let Some(json) = element.value().attr("data-card-json") {
                    blocks.push(json.to_string());
                }
            }
        }

        if let Ok(selector) = Selector::parse(
            r#"script[type="application/json"], script#card-data, pre[type="application/json"], pre#card-data"#,
        ) {
            for element in document.select(&selector) {
                blocks.push(element.text().collect::<String>());
            }
        }

        let mut library = Self::default();
        for block in &blocks {
            library.absorb_blob(block);
        }

        if let Ok(selector) = Selector::parse("tr[data-card-name]") {
            for row in document.select(&selector) {
                let mut record = Map::new();
                for (attr, value) in row.value().attrs() {
                    if let Some(key) = attr.strip_prefix("data-card-") {
                        if key != "json" {
                            record.insert(key.replace('-', "_"), Value::String(value.to_string()));
                        }
                    }
                }
                if let Some(name) = row.value().attr("data-card-name") {
                    library.insert(name, record);
                }
            }
        }

        library
    }

    pub fn insert(&mut self, name: &str, record: Map<String, Value>) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.records.insert(name.to_string(), record);
    }

    fn absorb_blob(&mut self, blob: &str) {
        let candidates: Vec<&str> = if blob.trim_start().starts_with('{') {
            vec![blob]
        } else {
            let found: Vec<&str> = JSON_CANDIDATE.find_iter(blob).map(|m| m.as_str()).collect();
            if found.is_empty() {
                vec![blob]
            } else {
                found
            }
        };

        for candidate in candidates {
            match serde_json::from_str::<Value>(candidate) {
                Ok(value) => self.absorb_value(value),
                Err(e) => debug!("Skipping unparseable library block: {}", e),
            }
        }
    }

    fn absorb_value(&mut self, value: Value) {
        match value {
            Value::Object(map) => {
                if map.values().all(Value::is_object) {
                    for (name, record) in map {
                        if let Value::Object(record) = record {
                            self.insert(&name, record);
                        }
                    }
                } else if let Some(name) = map.get("name").and_then(scalar_text) {
                    self.insert(&name, map);
                } else {
                    for (name, record) in map {
                        if let Value::Object(record) = record {
                            self.insert(&name, record);
                        }
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(record) = item {
                        if let Some(name) = record.get("name").and_then(scalar_text) {
                            self.insert(&name, record);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Capitalize the first letter of every alphabetic run, lowercase the rest
/// (`"kai'sa, daughter"` → `"Kai'Sa, Daughter"`).
pub fn title_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut previous_alpha = false;
    for c in name.chars() {
        if c.is_alphabetic() {
            if previous_alpha {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            previous_alpha = true;
        } else {
            result.push(c);
            previous_alpha = false;
        }
    }
    result
}

/// What a library lookup contributed to one record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichmentOutcome {
    /// Library key that matched, if any
    pub matched: Option<String>,
    /// Dotted paths of the fields that were filled
    pub filled: Vec<String>,
}

/// Look the record up by name and fill its gaps from the library entry.
pub fn enrich_from_library(raw: &mut RawRecord, library: &dyn ReferenceLibrary) -> EnrichmentOutcome {
    let Some(name) = raw.name() else {
        return EnrichmentOutcome::default();
    };
    let Some(reference) = library.lookup(&name) else {
        debug!("No reference entry for {}", name);
        return EnrichmentOutcome::default();
    };

    let matched = if library.get(&name).is_some() {
        name.clone()
    } else {
        title_case(&name)
    };
    let filled = fill_gaps(raw, reference);
    if !filled.is_empty() {
        debug!("Filled {:?} for {} from reference library", filled, name);
    }
    EnrichmentOutcome {
        matched: Some(matched),
        filled,
    }
}

/// Copy reference values into fields the record leaves empty. Present
/// fields are never overwritten; `cost` and `stats` are filled per
/// sub-field.
pub fn fill_gaps(raw: &mut RawRecord, reference: &Map<String, Value>) -> Vec<String> {
    let reference = canonical_reference(reference);
    let mut filled = Vec::new();

    for (field, legacy) in GAP_FIELDS {
        let present = !raw.is_gap(field) || legacy.map(|l| !raw.is_gap(l)).unwrap_or(false);
        if present {
            continue;
        }
        if let Some(value) = reference.get(field).filter(|v| !is_empty_value(v)) {
            raw.insert(field, value.clone());
            filled.push(field.to_string());
        }
    }

    if let Some(Value::Object(ref_cost)) = reference.get("cost") {
        let mut cost = nested_object(raw, "cost");
        let mut changed = false;
        for (sub, legacy) in COST_FIELDS {
            let present = cost.get(sub).map(|v| !is_empty_value(v)).unwrap_or(false)
                || !raw.is_gap(legacy);
            if present {
                continue;
            }
            if let Some(value) = ref_cost.get(sub).filter(|v| !is_empty_value(v)) {
                cost.insert(sub.to_string(), value.clone());
                filled.push(format!("cost.{}", sub));
                changed = true;
            }
        }
        if changed {
            raw.insert("cost", Value::Object(cost));
        }
    }

    if let Some(Value::Object(ref_stats)) = reference.get("stats") {
        let mut stats = nested_object(raw, "stats");
        let mut changed = false;
        for sub in STAT_FIELDS {
            let present =
                stats.get(sub).map(|v| !v.is_null()).unwrap_or(false) || !raw.is_gap(sub);
            if present {
                continue;
            }
            if let Some(value) = ref_stats.get(sub).filter(|v| !v.is_null()) {
                stats.insert(sub.to_string(), value.clone());
                filled.push(format!("stats.{}", sub));
                changed = true;
            }
        }
        if changed {
            raw.insert("stats", Value::Object(stats));
        }
    }

    filled
}

fn nested_object(raw: &RawRecord, key: &str) -> Map<String, Value> {
    match raw.get(key) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

/// Fold legacy library keys (`type_line`, `cost_energy`, `might`, ...) into
/// the nested canonical shape.
fn canonical_reference(reference: &Map<String, Value>) -> Map<String, Value> {
    let mut canonical = reference.clone();

    if is_missing(&canonical, "type") {
        if let Some(type_line) = reference.get("type_line") {
            canonical.insert("type".to_string(), type_line.clone());
        }
    }

    let mut cost = match reference.get("cost") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    for (sub, legacy) in COST_FIELDS {
        if is_missing(&cost, sub) {
            if let Some(value) = reference.get(legacy) {
                cost.insert(sub.to_string(), value.clone());
            }
        }
    }
    if !cost.is_empty() {
        canonical.insert("cost".to_string(), Value::Object(cost));
    }

    let mut stats = match reference.get("stats") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    for sub in STAT_FIELDS {
        if is_missing(&stats, sub) {
            if let Some(value) = reference.get(sub) {
                stats.insert(sub.to_string(), value.clone());
            }
        }
    }
    if !stats.is_empty() {
        canonical.insert("stats".to_string(), Value::Object(stats));
    }

    canonical
}

fn is_missing(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).map(is_empty_value).unwrap_or(true)
}
