// Job description analysis.
// Implements: text normalization, structure repair, schema validation, stage orchestration.
// All model calls go through llm_client — no direct endpoint calls here.

pub mod handlers;
pub mod normalizer;
pub mod orchestrator;
pub mod prompts;
pub mod repair;
pub mod schema;
