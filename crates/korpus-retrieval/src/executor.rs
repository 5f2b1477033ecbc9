//! # Plan Executor
//!
//! Runs every atom of a query plan against the lexical index and
//! aggregates per-chunk results using atom weights.
//!
//! Aggregation, per chunk:
//! - `atom_score = weight · (−bm25)` for each matching atom,
//! - `score = max(atom_score)` across matches (not a sum),
//! - `bm25_score = min(bm25)` across matches.
//!
//! Sorting: score DESC, then bm25 ASC, then chunk_id ASC.

use std::collections::HashMap;

use rusqlite::Connection;

use korpus_store::{fts_search, FtsFilter};

use crate::error::RetrievalResult;
use crate::planner::{AtomKind, QueryPlan};

/// Per-atom match detail kept for debugging and run metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomMatch {
    pub kind: AtomKind,
    pub text: String,
    pub weight: f64,
    pub bm25_score: f64,
}

/// One aggregated lexical hit across all plan atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedHit {
    pub chunk_id: String,
    pub practice_doc_id: String,
    /// Best (lowest) bm25 among matching atoms.
    pub bm25_score: f64,
    /// Best weighted score among matching atoms.
    pub score: f64,
    pub matches: Vec<AtomMatch>,
}

/// Execute all atoms of `plan` and aggregate.
pub fn execute_fts_plan(
    conn: &Connection,
    plan: &QueryPlan,
    top_n: i64,
    per_atom: i64,
    filter: Option<&FtsFilter>,
) -> RetrievalResult<Vec<AggregatedHit>> {
    if top_n <= 0 || per_atom <= 0 || plan.atoms.is_empty() {
        return Ok(Vec::new());
    }

    let mut agg: HashMap<String, AggregatedHit> = HashMap::new();
    for atom in &plan.atoms {
        let hits = fts_search(conn, &atom.text, per_atom, filter)?;
        for hit in hits {
            let atom_score = atom.weight * (-hit.bm25_score);
            let entry = agg.entry(hit.chunk_id.clone()).or_insert_with(|| AggregatedHit {
                chunk_id: hit.chunk_id.clone(),
                practice_doc_id: hit.practice_doc_id.clone(),
                bm25_score: hit.bm25_score,
                score: atom_score,
                matches: Vec::new(),
            });
            entry.bm25_score = entry.bm25_score.min(hit.bm25_score);
            entry.score = entry.score.max(atom_score);
            entry.matches.push(AtomMatch {
                kind: atom.kind,
                text: atom.text.clone(),
                weight: atom.weight,
                bm25_score: hit.bm25_score,
            });
        }
    }

    let mut out: Vec<AggregatedHit> = agg.into_values().collect();
    out.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.bm25_score.total_cmp(&b.bm25_score))
            .then(a.chunk_id.cmp(&b.chunk_id))
    });
    out.truncate(top_n as usize);
    Ok(out)
}
