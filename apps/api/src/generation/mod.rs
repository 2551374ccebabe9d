// Résumé tailoring engine.
// Prompt construction, answer parsing and the optimization flows.
// All model calls go through llm_client::TextGenerator.

pub mod parsing;
pub mod pipeline;
pub mod prompts;

pub use pipeline::{FlowResult, Outcome, Pipeline, Warnings};
