//! # Response Schema
//!
//! The strict output contract for defense-direction generation. Extra
//! keys are forbidden at parse time (`deny_unknown_fields`); value
//! constraints the type system cannot express are checked by
//! [`DefenseDirections::validate`].

use serde::{Deserialize, Serialize};

/// A reference to a retrieval citation grounding a claim.
///
/// `quote` must be copied verbatim from a supplied citation; the
/// remaining fields locate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CitationRef {
    pub quote: String,
    #[serde(default)]
    pub chunk_id: Option<String>,
    #[serde(default)]
    pub practice_doc_id: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
}

impl CitationRef {
    /// Build a reference carrying only the quote.
    pub fn from_quote(quote: impl Into<String>) -> Self {
        Self {
            quote: quote.into(),
            chunk_id: None,
            practice_doc_id: None,
            source_url: None,
            start: None,
            end: None,
        }
    }
}

/// One proposed line of argument with its grounding citations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgumentPath {
    pub title: String,
    pub claims: Vec<String>,
    #[serde(default)]
    pub supporting_citations: Vec<CitationRef>,
}

/// The generation output contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefenseDirections {
    #[serde(default)]
    pub argument_paths: Vec<ArgumentPath>,
    #[serde(default)]
    pub counterarguments: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub missing_info: Vec<String>,
    #[serde(default)]
    pub insufficient_authority: bool,
}

impl DefenseDirections {
    /// Value constraints beyond structure: every path needs a real title
    /// and at least one claim. Citations may be empty here; enforcement
    /// prunes ungrounded paths afterwards.
    pub fn validate(&self) -> Result<(), String> {
        for (i, path) in self.argument_paths.iter().enumerate() {
            if path.title.trim().chars().count() < 3 {
                return Err(format!("argument_paths[{i}].title must be at least 3 characters"));
            }
            if path.claims.is_empty() {
                return Err(format!("argument_paths[{i}].claims must not be empty"));
            }
        }
        Ok(())
    }

    /// The schema-valid fallback returned after a failed repair round.
    pub fn fallback(missing_info: Vec<String>) -> Self {
        Self {
            argument_paths: Vec::new(),
            counterarguments: Vec::new(),
            risks: Vec::new(),
            missing_info: if missing_info.is_empty() {
                vec!["LLM output was not valid JSON per schema.".to_string()]
            } else {
                missing_info
            },
            insufficient_authority: true,
        }
    }
}

/// The JSON schema text embedded literally in prompts.
///
/// Kept as a constant so the prompt, the repair prompt, and the tests
/// all carry the identical contract the parser actually enforces.
pub fn schema_json() -> String {
    let schema = serde_json::json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "argument_paths": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "title": {"type": "string", "minLength": 3},
                        "claims": {"type": "array", "items": {"type": "string"}, "minItems": 1},
                        "supporting_citations": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "additionalProperties": false,
                                "properties": {
                                    "quote": {"type": "string"},
                                    "chunk_id": {"type": ["string", "null"]},
                                    "practice_doc_id": {"type": ["string", "null"]},
                                    "source_url": {"type": ["string", "null"]},
                                    "start": {"type": ["integer", "null"]},
                                    "end": {"type": ["integer", "null"]}
                                },
                                "required": ["quote"]
                            }
                        }
                    },
                    "required": ["title", "claims"]
                }
            },
            "counterarguments": {"type": "array", "items": {"type": "string"}},
            "risks": {"type": "array", "items": {"type": "string"}},
            "missing_info": {"type": "array", "items": {"type": "string"}},
            "insufficient_authority": {"type": "boolean"}
        },
        "required": ["argument_paths", "counterarguments", "risks", "missing_info", "insufficient_authority"]
    });
    // Pretty output with sorted keys for prompt stability.
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}
