//! # Lexical Search
//!
//! Parameterized FTS5 queries over chunk text. Scoring uses
//! `bm25(chunks_fts)` where lower is better, and the raw value is
//! returned to callers verbatim; fusion and weighting happen upstream.
//!
//! Query strings pass through unmodified; quoting for phrase matching is
//! a caller concern (the query planner emits quoted phrase atoms).

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Filters over the owning document of each chunk.
///
/// `court` and `tags` are reserved for API compatibility and rejected as
/// unsupported, never silently ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FtsFilter {
    pub practice_doc_id: Option<String>,
    /// MIME type, exact match.
    pub doc_type: Option<String>,
    pub court: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD` compared lexicographically
    /// against the date prefix of `created_at_utc`.
    pub date_from: Option<String>,
    /// Inclusive upper bound, same comparison.
    pub date_to: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// One lexical hit.
#[derive(Debug, Clone, PartialEq)]
pub struct FtsHit {
    pub chunk_id: String,
    pub practice_doc_id: String,
    pub bm25_score: f64,
}

/// Run a parameterized FTS5 query, best (lowest) bm25 first.
///
/// Empty query or non-positive `top_n` returns an empty result, not an
/// error.
pub fn fts_search(
    conn: &Connection,
    query: &str,
    top_n: i64,
    filter: Option<&FtsFilter>,
) -> StoreResult<Vec<FtsHit>> {
    let query = query.trim();
    if query.is_empty() || top_n <= 0 {
        return Ok(Vec::new());
    }

    let default_filter = FtsFilter::default();
    let filter = filter.unwrap_or(&default_filter);
    if filter.court.is_some() {
        return Err(StoreError::UnsupportedFilter { filter: "court" });
    }
    if filter.tags.as_ref().is_some_and(|t| !t.is_empty()) {
        return Err(StoreError::UnsupportedFilter { filter: "tags" });
    }

    let mut where_clauses = vec!["chunks_fts MATCH ?".to_string()];
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(query.to_string())];

    if let Some(practice_doc_id) = &filter.practice_doc_id {
        where_clauses.push("CAST(d.id AS TEXT) = ?".into());
        params.push(Box::new(practice_doc_id.clone()));
    }
    if let Some(doc_type) = &filter.doc_type {
        where_clauses.push("d.mime = ?".into());
        params.push(Box::new(doc_type.clone()));
    }
    if let Some(date_from) = &filter.date_from {
        where_clauses.push("substr(d.created_at_utc, 1, 10) >= ?".into());
        params.push(Box::new(date_from.clone()));
    }
    if let Some(date_to) = &filter.date_to {
        where_clauses.push("substr(d.created_at_utc, 1, 10) <= ?".into());
        params.push(Box::new(date_to.clone()));
    }

    let sql = format!(
        "SELECT c.id AS chunk_id,
                CAST(d.id AS TEXT) AS practice_doc_id,
                bm25(chunks_fts) AS bm25_score
         FROM chunks_fts
         JOIN chunks c ON chunks_fts.rowid = c.rowid
         JOIN documents d ON c.document_id = d.id
         WHERE {}
         ORDER BY bm25_score ASC
         LIMIT ?;",
        where_clauses.join(" AND ")
    );
    params.push(Box::new(top_n));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
            |row| {
                Ok(FtsHit {
                    chunk_id: row.get(0)?,
                    practice_doc_id: row.get(1)?,
                    bm25_score: row.get(2)?,
                })
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
