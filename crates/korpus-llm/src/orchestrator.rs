//! # Generation Orchestrator
//!
//! Drives one guarded generation: prompt → parse → validate → enforce,
//! with exactly one repair round on a parse or schema failure and a
//! schema-valid fallback after a second failure. Every outcome,
//! including the fallback, is audited best-effort.

use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, warn};

use korpus_store::audit::{try_append, AuditEvent};

use crate::enforcement::{enforce_no_citation_no_claim, EnforcementLimits};
use crate::error::{LlmError, LlmResult};
use crate::prompting::{defense_prompt, repair_prompt};
use crate::runtime::{LlamaParams, SidecarRuntime};
use crate::schema::{schema_json, CitationRef, DefenseDirections};

/// Where to audit a generation, and under which identity.
pub struct AuditContext<'a> {
    pub conn: &'a Connection,
    pub pack_version: String,
    pub retrieval_run_id: Option<String>,
}

/// Generate defense directions grounded in `citations`.
///
/// The returned value is always schema-valid:
/// - a valid model output passes through (after enforcement),
/// - an invalid first output triggers exactly one repair call,
/// - a second failure yields the fallback with
///   `insufficient_authority = true` and both error summaries in
///   `missing_info`.
///
/// Runtime failures (spawn, timeout) are real errors and do propagate;
/// schema failures never do.
pub fn generate_defense_directions(
    runtime: &dyn SidecarRuntime,
    query: &str,
    citations: &[CitationRef],
    params: &LlamaParams,
    audit: Option<&AuditContext<'_>>,
) -> LlmResult<DefenseDirections> {
    let schema = schema_json();
    let prompt = defense_prompt(query, citations, &schema);

    let raw_first = runtime.generate(&prompt, params)?;
    let first_error = match parse_and_validate(&raw_first) {
        Ok(response) => {
            let fin = enforce_no_citation_no_claim(&response, EnforcementLimits::default());
            audit_best_effort(runtime, params, audit, &fin);
            return Ok(fin);
        }
        Err(e) => e,
    };
    debug!(error = %first_error, "first output rejected, issuing repair call");

    let repair = repair_prompt(&schema, &raw_first, &first_error.to_string());
    let raw_second = runtime.generate(&repair, params)?;
    match parse_and_validate(&raw_second) {
        Ok(response) => {
            let fin = enforce_no_citation_no_claim(&response, EnforcementLimits::default());
            audit_best_effort(runtime, params, audit, &fin);
            Ok(fin)
        }
        Err(second_error) => {
            warn!(%first_error, %second_error, "output invalid after repair, falling back");
            let info = vec![
                "LLM output was not valid JSON per schema after repair attempt.".to_string(),
                format!("first_error={}", clip(&first_error.to_string(), 500)),
                format!("second_error={}", clip(&second_error.to_string(), 500)),
            ];
            let fallback = enforce_no_citation_no_claim(
                &DefenseDirections::fallback(info),
                EnforcementLimits::default(),
            );
            audit_best_effort(runtime, params, audit, &fallback);
            Ok(fallback)
        }
    }
}

/// Strict parse, then substring extraction from the first `{` to the
/// last `}`, then schema validation.
pub fn parse_and_validate(raw: &str) -> LlmResult<DefenseDirections> {
    let value = extract_json_object(raw)?;
    let response: DefenseDirections =
        serde_json::from_value(value).map_err(|e| LlmError::Schema(e.to_string()))?;
    response.validate().map_err(LlmError::Schema)?;
    Ok(response)
}

/// Best-effort extraction of one JSON object from model output.
fn extract_json_object(raw: &str) -> LlmResult<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LlmError::Parse("empty output".into()));
    }
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Ok(value);
    }
    let start = raw.find('{');
    let end = raw.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if end > start => {
            serde_json::from_str(&raw[start..=end]).map_err(|e| LlmError::Parse(e.to_string()))
        }
        _ => Err(LlmError::Parse("no JSON object found".into())),
    }
}

fn audit_best_effort(
    runtime: &dyn SidecarRuntime,
    params: &LlamaParams,
    audit: Option<&AuditContext<'_>>,
    output: &DefenseDirections,
) {
    let Some(ctx) = audit else {
        return;
    };
    let params_value = serde_json::json!({
        "temperature": params.temperature,
        "top_p": params.top_p,
        "top_k": params.top_k,
        "repeat_penalty": params.repeat_penalty,
        "seed": params.seed,
        "ctx": params.ctx,
        "n_predict": params.n_predict,
        "threads": params.threads,
        "batch": params.batch,
        "stop": params.stop,
        "timeout_sec": params.timeout_sec,
    });
    let output_value = match serde_json::to_value(output) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "audit skipped: output not serializable");
            return;
        }
    };
    let model = runtime.model_id();
    try_append(
        ctx.conn,
        &AuditEvent {
            event: "llm_generate_defense",
            model: &model,
            pack_version: &ctx.pack_version,
            retrieval_run_id: ctx.retrieval_run_id.as_deref(),
            params: &params_value,
            output: &output_value,
        },
    );
}

fn clip(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
