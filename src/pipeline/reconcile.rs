//! Reconciliation: one raw record in, one validated canonical card out.
//!
//! Stages run in a fixed order and each one is a no-op when its trigger is
//! absent, so feeding a canonical card back through yields the same card.

use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::card::CanonicalCard;
use crate::color::{ColorSampler, DomainColorSample};
use crate::config::ReconcileConfig;
use crate::error::Result;
use crate::pipeline::ingestion::Overrides;
use crate::pipeline::processing::enrich::{enrich_from_library, EnrichmentOutcome, ReferenceLibrary};
use crate::pipeline::processing::normalize::domains::{
    apply_color_hint, apply_spell_power, harmonize, override_champion, override_signature_spell,
};
use crate::pipeline::processing::normalize::synonyms::{
    KEYWORD_SYNONYMS, SUPERTYPE_SYNONYMS, TAG_SYNONYMS,
};
use crate::pipeline::processing::normalize::{
    canonicalize_terms, derive_effects, normalize_cost, normalize_effects, normalize_rules_text,
    CardDraft, DomainResolution,
};
use crate::pipeline::processing::quality_gate::{CardValidator, ValidationReport, Violation};
use crate::types::RawRecord;

/// A draft that has been through every normalization stage
#[derive(Debug, Clone)]
pub struct NormalizedCard {
    pub draft: CardDraft,
    pub domains: DomainResolution,
    pub color_hint: Option<DomainColorSample>,
}

impl NormalizedCard {
    pub fn payload(&self) -> Value {
        self.draft.to_payload()
    }
}

/// Outcome of a successful reconciliation
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub card: CanonicalCard,
    pub validation: ValidationReport,
    pub domains: DomainResolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_hint: Option<DomainColorSample>,
}

/// A card that failed validation, with everything needed to diagnose it
#[derive(Debug, Clone, Serialize, Error)]
#[error("card '{name}' rejected with {} violation(s)", .violations.len())]
pub struct Rejection {
    pub name: String,
    pub violations: Vec<Violation>,
    pub warnings: Vec<String>,
    pub raw: Value,
    pub normalized: Value,
    pub domains: DomainResolution,
}

/// Runs the normalization stages and the quality gate for single records
pub struct Reconciler {
    config: ReconcileConfig,
    validator: CardValidator,
    sampler: Option<Arc<dyn ColorSampler>>,
    library: Option<Arc<dyn ReferenceLibrary>>,
    overrides: Overrides,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Result<Self> {
        let validator = CardValidator::new(config.max_domains)?;
        Ok(Self {
            config,
            validator,
            sampler: None,
            library: None,
            overrides: Overrides::default(),
        })
    }

    pub fn with_sampler(mut self, sampler: Arc<dyn ColorSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn with_library(mut self, library: Arc<dyn ReferenceLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn validator(&self) -> &CardValidator {
        &self.validator
    }

    /// Apply manual overrides for `source`, then fill remaining gaps from
    /// the reference library.
    pub fn enrich(&self, source: &Path, raw: &mut RawRecord) -> EnrichmentOutcome {
        let overridden = self.overrides.apply(source, raw);
        if !overridden.is_empty() {
            info!("Applied {} override field(s) to {}", overridden.len(), source.display());
        }
        match &self.library {
            Some(library) => enrich_from_library(raw, library.as_ref()),
            None => EnrichmentOutcome::default(),
        }
    }

    /// Run every normalization stage; nothing here can fail.
    pub fn normalize(&self, raw: &RawRecord, image: Option<&Path>) -> NormalizedCard {
        let mut trace = DomainResolution::default();

        let mut draft = CardDraft::ingest(raw);
        draft.cost = normalize_cost(draft.raw_cost.as_ref());

        let color_hint = image.and_then(|path| self.sample(path));

        draft.keywords = canonicalize_terms(&draft.keywords, &KEYWORD_SYNONYMS);
        draft.tags = canonicalize_terms(&draft.tags, &TAG_SYNONYMS);
        draft.supertypes = canonicalize_terms(&draft.supertypes, &SUPERTYPE_SYNONYMS);

        apply_color_hint(&mut draft, color_hint.as_ref(), &self.config, &mut trace);
        override_signature_spell(&mut draft, &mut trace);
        override_champion(&mut draft, &mut trace);
        apply_spell_power(&mut draft, &mut trace);

        draft.effects = normalize_effects(&draft.raw_effects);
        draft.rules_text = normalize_rules_text(Some(&draft.rules_text));

        if self.config.derive_effects && draft.effects.is_empty() {
            draft.effects = derive_effects(&draft.keywords, &draft.rules_text);
            if !draft.effects.is_empty() {
                debug!("Derived {} effect(s) for {}", draft.effects.len(), draft.name);
            }
        }

        harmonize(&mut draft, &mut trace);

        NormalizedCard {
            draft,
            domains: trace,
            color_hint,
        }
    }

    /// Normalize and validate one record.
    #[instrument(skip_all, fields(name = %raw.name().unwrap_or_default()))]
    pub fn reconcile(
        &self,
        raw: &RawRecord,
        image: Option<&Path>,
    ) -> std::result::Result<ReconcileReport, Rejection> {
        let normalized = self.normalize(raw, image);
        let payload = normalized.payload();

        match self.validator.accept(&payload) {
            Ok((card, validation)) => {
                for warning in &validation.warnings {
                    warn!("{}: {}", card.name, warning);
                }
                Ok(ReconcileReport {
                    card,
                    validation,
                    domains: normalized.domains,
                    color_hint: normalized.color_hint,
                })
            }
            Err(report) => {
                debug!("Rejected with violations {:?}", report.violations);
                Err(Rejection {
                    name: normalized.draft.name.clone(),
                    violations: report.violations,
                    warnings: report.warnings,
                    raw: raw.to_value(),
                    normalized: payload,
                    domains: normalized.domains,
                })
            }
        }
    }

    fn sample(&self, image: &Path) -> Option<DomainColorSample> {
        let sampler = self.sampler.as_ref()?;
        match sampler.sample(image) {
            Ok(sample) => {
                debug!(
                    "Color sample for {}: {:?} at {:.2}",
                    image.display(),
                    sample.domains,
                    sample.confidence
                );
                Some(sample)
            }
            Err(e) => {
                warn!("Color sampling failed for {}: {}", image.display(), e);
                None
            }
        }
    }
}
