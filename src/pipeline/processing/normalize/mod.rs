//! Card normalization stages.
//!
//! Every function here is pure and synchronous; the reconciler decides the
//! order they run in.

pub mod cost;
pub mod domains;
pub mod draft;
pub mod effects;
pub mod rules_text;
pub mod synonyms;
pub mod terms;

pub use cost::{normalize_cost, CostDraft};
pub use domains::{DomainResolution, DomainSource, DomainStep};
pub use draft::{resolve_card_type, CardDraft, StatsDraft};
pub use effects::{derive_effects, normalize_effects};
pub use rules_text::normalize_rules_text;
pub use terms::{canonicalize_term, canonicalize_terms, canonicalize_values};
