//! # Retrieval Run Log
//!
//! Append-only persistence of hybrid retrieval invocations: one run row,
//! its hits in `rank` order, and each hit's citations in `idx` order,
//! all inserted in a single transaction so loaders see all or none, and
//! loading returns the exact sequence originally produced.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use korpus_core::{CanonicalBytes, Timestamp};

use crate::error::{StoreError, StoreResult};

/// A verbatim quote from a chunk with its `[start, end)` offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub quote: String,
    pub start: i64,
    pub end: i64,
    pub source_url: Option<String>,
}

/// One ranked hybrid retrieval hit with its citations.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridHit {
    pub chunk_id: String,
    pub practice_doc_id: String,
    pub score: f64,
    pub fts_bm25: Option<f64>,
    pub vector_distance: Option<f64>,
    pub citations: Vec<Citation>,
}

/// One persisted retrieval run header.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    pub created_at_utc: String,
    pub query: String,
    pub top_n: i64,
    pub filters: Option<Value>,
    pub use_fts: bool,
    pub use_vector: bool,
    pub algo_version: String,
    pub meta: Option<Value>,
}

/// Stable (canonical) serialization for JSON columns.
fn stable_json(value: &Value) -> StoreResult<String> {
    let canonical = CanonicalBytes::new(value)?;
    Ok(String::from_utf8_lossy(canonical.as_bytes()).into_owned())
}

/// Insert a run row and its hits + citations in one transaction.
/// Returns the assigned run id.
#[allow(clippy::too_many_arguments)]
pub fn persist_run(
    conn: &mut Connection,
    query: &str,
    top_n: i64,
    filters: Option<&Value>,
    use_fts: bool,
    use_vector: bool,
    algo_version: &str,
    meta: Option<&Value>,
    hits: &[HybridHit],
) -> StoreResult<String> {
    let run_id = Uuid::new_v4().to_string();
    let created_at = Timestamp::now().to_canonical_string();
    let filters_json = filters.map(stable_json).transpose()?;
    let meta_json = meta.map(stable_json).transpose()?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO retrieval_runs(
           id, created_at_utc, query, top_n, filters_json, use_fts, use_vector,
           algo_version, meta_json
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            run_id,
            created_at,
            query,
            top_n,
            filters_json,
            use_fts as i64,
            use_vector as i64,
            algo_version,
            meta_json,
        ],
    )?;

    for (rank, hit) in hits.iter().enumerate() {
        tx.execute(
            "INSERT INTO retrieval_run_hits(
               run_id, rank, chunk_id, practice_doc_id, score, fts_bm25, vector_distance
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                run_id,
                rank as i64,
                hit.chunk_id,
                hit.practice_doc_id,
                hit.score,
                hit.fts_bm25,
                hit.vector_distance,
            ],
        )?;
        let hit_id = tx.last_insert_rowid();
        for (idx, citation) in hit.citations.iter().enumerate() {
            tx.execute(
                "INSERT INTO retrieval_run_citations(
                   hit_id, idx, quote, start_offset, end_offset, source_url
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    hit_id,
                    idx as i64,
                    citation.quote,
                    citation.start,
                    citation.end,
                    citation.source_url,
                ],
            )?;
        }
    }

    tx.commit()?;
    Ok(run_id)
}

/// Load a run header by id.
pub fn load_run(conn: &Connection, run_id: &str) -> StoreResult<RunRecord> {
    let parse = |text: Option<String>| -> StoreResult<Option<Value>> {
        match text {
            None => Ok(None),
            Some(t) => Ok(Some(serde_json::from_str(&t).map_err(|e| {
                StoreError::NotFound(format!("run {run_id}: corrupt JSON column: {e}"))
            })?)),
        }
    };

    let row = conn
        .query_row(
            "SELECT id, created_at_utc, query, top_n, filters_json, use_fts, use_vector,
                    algo_version, meta_json
             FROM retrieval_runs WHERE id = ?1;",
            params![run_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, Option<String>>(8)?,
                ))
            },
        )
        .optional()?;

    let (id, created_at_utc, query, top_n, filters_json, use_fts, use_vector, algo_version, meta_json) =
        row.ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;

    Ok(RunRecord {
        id,
        created_at_utc,
        query,
        top_n,
        filters: parse(filters_json)?,
        use_fts: use_fts != 0,
        use_vector: use_vector != 0,
        algo_version,
        meta: parse(meta_json)?,
    })
}

/// Load a run's hits in `rank` order, each with citations in `idx` order.
pub fn load_run_hits(conn: &Connection, run_id: &str) -> StoreResult<Vec<HybridHit>> {
    let mut hits_stmt = conn.prepare(
        "SELECT id, chunk_id, practice_doc_id, score, fts_bm25, vector_distance
         FROM retrieval_run_hits WHERE run_id = ?1 ORDER BY rank ASC;",
    )?;
    let hit_rows = hits_stmt
        .query_map(params![run_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                HybridHit {
                    chunk_id: row.get(1)?,
                    practice_doc_id: row.get(2)?,
                    score: row.get(3)?,
                    fts_bm25: row.get(4)?,
                    vector_distance: row.get(5)?,
                    citations: Vec::new(),
                },
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut citations_stmt = conn.prepare(
        "SELECT quote, start_offset, end_offset, source_url
         FROM retrieval_run_citations WHERE hit_id = ?1 ORDER BY idx ASC;",
    )?;

    let mut out = Vec::with_capacity(hit_rows.len());
    for (hit_id, mut hit) in hit_rows {
        hit.citations = citations_stmt
            .query_map(params![hit_id], |row| {
                Ok(Citation {
                    quote: row.get(0)?,
                    start: row.get(1)?,
                    end: row.get(2)?,
                    source_url: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        out.push(hit);
    }
    Ok(out)
}
