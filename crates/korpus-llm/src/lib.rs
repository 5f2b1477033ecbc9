//! # korpus-llm — Generation Guard
//!
//! Turns retrieval citations into grounded, citation-backed generation.
//! The LLM itself is an external sidecar (a llama.cpp CLI invocation);
//! this crate owns everything around it:
//!
//! - a prompt that embeds the output JSON schema literally and supplies
//!   the citations as the only allowed grounding source,
//! - strict parsing with one repair round, then a schema-valid fallback,
//! - the "no citation → no claim" enforcement pass,
//! - a best-effort audit append that never affects the returned result.
//!
//! A schema-invalid model output is never an error to the caller: the
//! guard's result is always a valid [`DefenseDirections`] value.

pub mod enforcement;
pub mod error;
pub mod orchestrator;
pub mod prompting;
pub mod runtime;
pub mod schema;

pub use enforcement::{enforce_no_citation_no_claim, EnforcementLimits};
pub use error::{LlmError, LlmResult};
pub use orchestrator::{generate_defense_directions, AuditContext};
pub use runtime::{find_gguf_model, find_llama_bin, LlamaCppRuntime, LlamaParams, SidecarRuntime};
pub use schema::{ArgumentPath, CitationRef, DefenseDirections};
