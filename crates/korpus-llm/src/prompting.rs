//! # Prompt Construction
//!
//! Strict "ONLY JSON" prompts. The output schema is embedded literally,
//! the citations are supplied as the only allowed grounding source, and
//! a minimal schema-valid example shows the shape. The repair prompt
//! carries the error summary and the prior raw output back to the
//! model for exactly one correction round.

use serde_json::json;

use crate::schema::CitationRef;

/// Build the defense-direction generation prompt.
pub fn defense_prompt(query: &str, citations: &[CitationRef], schema_json: &str) -> String {
    let citations_json = serde_json::to_string_pretty(citations)
        .unwrap_or_else(|_| "[]".to_string());

    // Tiny but schema-valid example (shape only).
    let example = json!({
        "argument_paths": [
            {
                "title": "Proceso pažeidimų linija",
                "claims": ["Procesiniai pažeidimai galėjo paveikti sprendimo teisėtumą."],
                "supporting_citations": [
                    {
                        "quote": "…",
                        "chunk_id": "chunk_123",
                        "practice_doc_id": null,
                        "source_url": null,
                        "start": null,
                        "end": null
                    }
                ]
            }
        ],
        "counterarguments": ["Prokuroras teigs, kad pažeidimai nereikšmingi."],
        "risks": ["Nepakankamai duomenų apie įrodymų rinkimo aplinkybes."],
        "missing_info": ["Kokie konkretūs procesiniai veiksmai buvo atlikti ir kada."],
        "insufficient_authority": true
    });
    let example_json =
        serde_json::to_string_pretty(&example).unwrap_or_else(|_| "{}".to_string());

    format!(
        "You are a legal assistant. Your task: propose defense directions based on the query and the provided citations.\n\
         \n\
         CRITICAL OUTPUT RULES:\n\
         - Output ONLY a single valid JSON object.\n\
         - No markdown. No code fences. No prose. No commentary.\n\
         - Do not include any text before or after the JSON.\n\
         \n\
         JSON CONTRACT (must match exactly; extra keys forbidden):\n\
         {schema_json}\n\
         \n\
         FIELD GUIDANCE:\n\
         - argument_paths: array of {{title, claims, supporting_citations}}\n\
         - supporting_citations: MUST be non-empty; use the provided citations; the 'quote' MUST be copied from them.\n\
         - counterarguments/risks/missing_info: arrays of strings (can be empty).\n\
         - If citations are insufficient or key facts are missing: set insufficient_authority=true and add items to missing_info.\n\
         \n\
         USER QUERY:\n\
         {query}\n\
         \n\
         AVAILABLE CITATIONS (use these only):\n\
         {citations_json}\n\
         \n\
         VALID EXAMPLE (shape only, keep yours grounded in citations):\n\
         {example_json}\n\
         \n\
         Now produce the JSON response.\n"
    )
}

/// Build the single-round repair prompt.
pub fn repair_prompt(schema_json: &str, raw: &str, error_summary: &str) -> String {
    format!(
        "You MUST output ONLY a single valid JSON object and nothing else.\n\
         No markdown. No code fences. No prose.\n\
         \n\
         The previous output did not match the required JSON schema.\n\
         Fix the JSON so it matches the schema EXACTLY (extra keys forbidden).\n\
         \n\
         REQUIRED JSON SCHEMA:\n\
         {schema_json}\n\
         \n\
         ERROR SUMMARY:\n\
         {error_summary}\n\
         \n\
         PREVIOUS RAW OUTPUT (for reference):\n\
         -----BEGIN RAW-----\n\
         {raw}\n\
         -----END RAW-----\n\
         \n\
         Return the corrected JSON now.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::schema_json;

    #[test]
    fn prompt_embeds_schema_query_and_citations() {
        let citations = vec![CitationRef::from_quote("cituojamas tekstas")];
        let prompt = defense_prompt("gynybos kryptys", &citations, &schema_json());
        assert!(prompt.contains("ONLY a single valid JSON object"));
        assert!(prompt.contains("extra keys forbidden"));
        assert!(prompt.contains("gynybos kryptys"));
        assert!(prompt.contains("cituojamas tekstas"));
        assert!(prompt.contains("insufficient_authority"));
        assert!(prompt.contains("use these only"));
    }

    #[test]
    fn prompt_forbids_fences_and_prose() {
        let prompt = defense_prompt("q", &[], &schema_json());
        assert!(prompt.contains("No markdown. No code fences."));
    }

    #[test]
    fn repair_prompt_carries_error_and_raw_output() {
        let prompt = repair_prompt(&schema_json(), "not json at all", "expected value at line 1");
        assert!(prompt.contains("did not match the required JSON schema"));
        assert!(prompt.contains("expected value at line 1"));
        assert!(prompt.contains("-----BEGIN RAW-----\nnot json at all\n-----END RAW-----"));
    }
}
