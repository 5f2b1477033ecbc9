//! Guarded generation end-to-end with a scripted fake sidecar.

use std::cell::RefCell;

use korpus_llm::{
    generate_defense_directions, AuditContext, LlamaParams, LlmResult, SidecarRuntime,
};
use serde_json::json;

/// Replays a fixed sequence of outputs and records the prompts it saw.
struct ScriptedRuntime {
    outputs: RefCell<Vec<String>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedRuntime {
    fn new(outputs: Vec<&str>) -> Self {
        Self {
            outputs: RefCell::new(outputs.into_iter().rev().map(String::from).collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }

    fn prompt(&self, index: usize) -> String {
        self.prompts.borrow()[index].clone()
    }
}

impl SidecarRuntime for ScriptedRuntime {
    fn generate(&self, prompt: &str, _params: &LlamaParams) -> LlmResult<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self
            .outputs
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| "exhausted".to_string()))
    }

    fn model_id(&self) -> String {
        "scripted-test-model".into()
    }
}

fn valid_output() -> String {
    json!({
        "argument_paths": [{
            "title": "Procesinių pažeidimų linija",
            "claims": ["Pažeidimai galėjo paveikti sprendimo teisėtumą."],
            "supporting_citations": [{"quote": "cituojamas tekstas", "chunk_id": "c1"}]
        }],
        "counterarguments": [],
        "risks": [],
        "missing_info": [],
        "insufficient_authority": false
    })
    .to_string()
}

#[test]
fn valid_first_output_passes_through_in_one_call() {
    let runtime = ScriptedRuntime::new(vec![&valid_output()]);
    let result = generate_defense_directions(
        &runtime,
        "gynybos kryptys",
        &[korpus_llm::CitationRef::from_quote("cituojamas tekstas")],
        &LlamaParams::default(),
        None,
    )
    .unwrap();

    assert_eq!(runtime.calls(), 1);
    assert_eq!(result.argument_paths.len(), 1);
    assert!(!result.insufficient_authority);

    let prompt = runtime.prompt(0);
    assert!(prompt.contains("gynybos kryptys"));
    assert!(prompt.contains("cituojamas tekstas"));
    assert!(prompt.contains("ONLY a single valid JSON object"));
}

#[test]
fn invalid_then_valid_uses_exactly_one_repair() {
    let runtime = ScriptedRuntime::new(vec!["this is prose, not JSON", &valid_output()]);
    let result = generate_defense_directions(
        &runtime,
        "gynybos kryptys",
        &[],
        &LlamaParams::default(),
        None,
    )
    .unwrap();

    assert_eq!(runtime.calls(), 2);
    assert_eq!(result.argument_paths.len(), 1);

    let repair = runtime.prompt(1);
    assert!(repair.contains("did not match the required JSON schema"));
    assert!(repair.contains("this is prose, not JSON"));
}

#[test]
fn two_failures_yield_fallback_not_error() {
    let runtime = ScriptedRuntime::new(vec!["still prose", "yet more prose"]);
    let result = generate_defense_directions(
        &runtime,
        "defense directions",
        &[],
        &LlamaParams::default(),
        None,
    )
    .unwrap();

    assert_eq!(runtime.calls(), 2, "exactly one repair call, never more");
    assert!(result.insufficient_authority);
    assert!(result.argument_paths.is_empty());
    assert!(result
        .missing_info
        .iter()
        .any(|m| m.contains("not valid JSON per schema")));
    assert!(result.missing_info.iter().any(|m| m.starts_with("first_error=")));
    assert!(result.missing_info.iter().any(|m| m.starts_with("second_error=")));
}

#[test]
fn json_with_fences_is_recovered_by_extraction() {
    let fenced = format!("```json\n{}\n```", valid_output());
    let runtime = ScriptedRuntime::new(vec![&fenced]);
    let result = generate_defense_directions(
        &runtime,
        "q",
        &[],
        &LlamaParams::default(),
        None,
    )
    .unwrap();
    assert_eq!(runtime.calls(), 1);
    assert_eq!(result.argument_paths.len(), 1);
}

#[test]
fn ungrounded_paths_are_enforced_away() {
    let output = json!({
        "argument_paths": [{
            "title": "Be citatų",
            "claims": ["nepagrįstas teiginys"],
            "supporting_citations": []
        }],
        "counterarguments": [],
        "risks": [],
        "missing_info": [],
        "insufficient_authority": false
    })
    .to_string();
    let runtime = ScriptedRuntime::new(vec![&output]);
    let result = generate_defense_directions(
        &runtime,
        "q",
        &[],
        &LlamaParams::default(),
        None,
    )
    .unwrap();

    assert!(result.argument_paths.is_empty());
    assert!(result.insufficient_authority);
    assert!(result.missing_info.iter().any(|m| m.contains("Be citatų")));
}

#[test]
fn every_outcome_is_audited_including_fallback() {
    let conn = korpus_store::connect_in_memory().unwrap();
    let runtime = ScriptedRuntime::new(vec!["prose", "prose again"]);
    let audit = AuditContext {
        conn: &conn,
        pack_version: "1.1.0".into(),
        retrieval_run_id: Some("run-77".into()),
    };
    let result = generate_defense_directions(
        &runtime,
        "q",
        &[],
        &LlamaParams::default(),
        Some(&audit),
    )
    .unwrap();
    assert!(result.insufficient_authority);

    let (count, model, pack_version, run_id): (i64, String, String, Option<String>) = conn
        .query_row(
            "SELECT COUNT(*), MAX(model), MAX(pack_version), MAX(retrieval_run_id) FROM audit_log;",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(model, "scripted-test-model");
    assert_eq!(pack_version, "1.1.0");
    assert_eq!(run_id.as_deref(), Some("run-77"));

    let output_sha: String = conn
        .query_row("SELECT output_sha256 FROM audit_log;", [], |r| r.get(0))
        .unwrap();
    assert_eq!(output_sha.len(), 64);
}

#[test]
fn audit_failure_does_not_affect_result() {
    let conn = korpus_store::connect_in_memory().unwrap();
    conn.execute_batch("DROP TABLE audit_log;").unwrap();
    let runtime = ScriptedRuntime::new(vec![&valid_output()]);
    let audit = AuditContext {
        conn: &conn,
        pack_version: "dev".into(),
        retrieval_run_id: None,
    };
    let result = generate_defense_directions(
        &runtime,
        "q",
        &[],
        &LlamaParams::default(),
        Some(&audit),
    )
    .unwrap();
    assert_eq!(result.argument_paths.len(), 1);
}
