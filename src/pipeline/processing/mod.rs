// Card processing: reference enrichment, normalization, and the quality gate

pub mod enrich;
pub mod normalize;
pub mod quality_gate;
