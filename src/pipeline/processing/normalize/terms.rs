use serde_json::Value;
use std::collections::HashSet;

use super::synonyms::SynonymTable;
use crate::types::truthy_text;

/// Canonicalize raw terms against a synonym table.
///
/// Falsy and blank values are skipped. A lowercase hit in `synonyms` is used
/// verbatim, anything else is uppercased. Duplicates are dropped by exact
/// canonical token, keeping first-seen order.
pub fn canonicalize_terms<I, S>(values: I, synonyms: &SynonymTable) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for raw in values {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        let canonical = match synonyms.get(trimmed.to_lowercase().as_str()) {
            Some(mapped) => (*mapped).to_string(),
            None => trimmed.to_uppercase(),
        };
        if seen.insert(canonical.clone()) {
            result.push(canonical);
        }
    }

    result
}

/// Same as [`canonicalize_terms`] for untyped JSON values; non-strings are
/// stringified first and falsy values are skipped.
pub fn canonicalize_values<'a, I>(values: I, synonyms: &SynonymTable) -> Vec<String>
where
    I: IntoIterator<Item = &'a Value>,
{
    canonicalize_terms(values.into_iter().filter_map(truthy_text), synonyms)
}

/// Canonicalize a single term; `None` when nothing survives.
pub fn canonicalize_term(value: &str, synonyms: &SynonymTable) -> Option<String> {
    canonicalize_terms([value], synonyms).into_iter().next()
}
