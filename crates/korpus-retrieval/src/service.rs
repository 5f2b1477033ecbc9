//! # Retrieval Service
//!
//! The facade over the query path: lexical search, vector search,
//! hybrid retrieval, and persisted hybrid runs. Owns the store
//! connection; the vector backend (index + idmap + embedder) is
//! optional and belongs to the currently active pack.

use rusqlite::Connection;
use serde_json::Value;

use korpus_store::chunks::chunk_texts;
use korpus_store::{fts_search, runs, FtsFilter, FtsHit, HybridHit, StoreError};

use crate::embed::{embed_query, Embedder};
use crate::error::{RetrievalError, RetrievalResult};
use crate::executor::{execute_fts_plan, AggregatedHit};
use crate::hybrid::hybrid_retrieve;
use crate::planner::{build_query_plan, CaseFrame};
use crate::vector::{IdMap, VectorIndex};

/// Version tag stored with every persisted run.
pub const ALGO_VERSION: &str = "hybrid_v1";

/// Overfetch factor for post-filter backfill on the vector path.
const VECTOR_OVERFETCH: usize = 5;

/// One vector-signal hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk_id: String,
    pub practice_doc_id: String,
    pub distance: f32,
}

/// The per-pack vector search stack.
pub struct VectorBackend {
    pub index: VectorIndex,
    pub idmap: IdMap,
    pub embedder: Box<dyn Embedder>,
}

impl std::fmt::Debug for VectorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorBackend")
            .field("index", &self.index)
            .field("idmap_len", &self.idmap.len())
            .finish()
    }
}

/// Embed the query, search the index, resolve labels to chunks, and
/// apply the practice-doc filter with overfetch backfill.
pub fn vector_retrieve(
    conn: &Connection,
    backend: &VectorBackend,
    query: &str,
    top_k: usize,
    practice_doc_id: Option<&str>,
) -> RetrievalResult<Vec<VectorHit>> {
    let query = query.trim();
    if query.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let query_vec = embed_query(backend.embedder.as_ref(), query)?;
    let overfetch = (top_k * VECTOR_OVERFETCH).max(top_k);
    let pairs = backend.index.search(&query_vec, overfetch)?;
    if pairs.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_ids: Vec<String> = pairs
        .iter()
        .filter_map(|(label, _)| backend.idmap.chunk_id(*label).map(str::to_string))
        .collect();
    let meta = chunk_texts(conn, &chunk_ids)?;

    let mut out = Vec::new();
    for (label, distance) in pairs {
        let Some(chunk_id) = backend.idmap.chunk_id(label) else {
            continue;
        };
        let Some((_text, doc_id)) = meta.get(chunk_id) else {
            continue;
        };
        if let Some(wanted) = practice_doc_id {
            if doc_id.as_str() != wanted {
                continue;
            }
        }
        out.push(VectorHit {
            chunk_id: chunk_id.to_string(),
            practice_doc_id: doc_id.clone(),
            distance,
        });
        if out.len() >= top_k {
            break;
        }
    }
    Ok(out)
}

/// The retrieval operations of the platform, over one store connection.
pub struct RetrievalService {
    conn: Connection,
    vector: Option<VectorBackend>,
}

impl RetrievalService {
    /// Lexical-only service.
    pub fn new(conn: Connection) -> Self {
        Self { conn, vector: None }
    }

    /// Attach a vector backend (typically opened from the active pack).
    pub fn with_vector(mut self, backend: VectorBackend) -> Self {
        self.vector = Some(backend);
        self
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Lexical search: raw BM25, best first.
    pub fn fts(
        &self,
        query: &str,
        top_n: i64,
        filter: Option<&FtsFilter>,
    ) -> RetrievalResult<Vec<FtsHit>> {
        Ok(fts_search(&self.conn, query, top_n, filter)?)
    }

    /// Vector search. Only the `practice_doc_id` filter is implemented
    /// on this path; any other supplied filter field is rejected.
    pub fn vector(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&FtsFilter>,
    ) -> RetrievalResult<Vec<VectorHit>> {
        let backend = self
            .vector
            .as_ref()
            .ok_or_else(|| RetrievalError::Index("vector index not configured".into()))?;
        if let Some(filter) = filter {
            reject_non_practice_filters(filter)?;
        }
        let practice_doc_id = filter.and_then(|f| f.practice_doc_id.as_deref());
        vector_retrieve(&self.conn, backend, query, top_k, practice_doc_id)
    }

    /// Plan-and-execute lexical retrieval for a structured case frame:
    /// build up to `k` weighted atoms, run each against the FTS, and
    /// aggregate per chunk.
    pub fn search_case_frame(
        &self,
        frame: &CaseFrame,
        k: usize,
        top_n: i64,
        per_atom: i64,
        filter: Option<&FtsFilter>,
    ) -> RetrievalResult<Vec<AggregatedHit>> {
        let plan = build_query_plan(frame, k);
        execute_fts_plan(&self.conn, &plan, top_n, per_atom, filter)
    }

    /// Hybrid retrieval with citations.
    pub fn hybrid(
        &self,
        query: &str,
        top_n: usize,
        filter: Option<&FtsFilter>,
        use_fts: bool,
        use_vector: bool,
    ) -> RetrievalResult<Vec<HybridHit>> {
        hybrid_retrieve(
            &self.conn,
            self.vector.as_ref(),
            query,
            top_n,
            filter,
            use_fts,
            use_vector,
        )
    }

    /// Hybrid retrieval, persisted: returns the assigned run id and the
    /// hits. Run, hits, and citations land in one transaction.
    pub fn hybrid_run(
        &mut self,
        query: &str,
        top_n: usize,
        filter: Option<&FtsFilter>,
        use_fts: bool,
        use_vector: bool,
    ) -> RetrievalResult<(String, Vec<HybridHit>)> {
        let hits = self.hybrid(query, top_n, filter, use_fts, use_vector)?;
        let filters_value: Option<Value> = match filter {
            Some(f) => Some(serde_json::to_value(f)?),
            None => None,
        };
        let run_id = runs::persist_run(
            &mut self.conn,
            query,
            top_n as i64,
            filters_value.as_ref(),
            use_fts,
            use_vector,
            ALGO_VERSION,
            None,
            &hits,
        )?;
        Ok((run_id, hits))
    }

    /// Load a persisted run header.
    pub fn load_run(&self, run_id: &str) -> RetrievalResult<runs::RunRecord> {
        Ok(runs::load_run(&self.conn, run_id)?)
    }

    /// Load a persisted run's hits, in rank order with citations in
    /// idx order.
    pub fn load_run_hits(&self, run_id: &str) -> RetrievalResult<Vec<HybridHit>> {
        Ok(runs::load_run_hits(&self.conn, run_id)?)
    }
}

fn reject_non_practice_filters(filter: &FtsFilter) -> RetrievalResult<()> {
    let unsupported: Option<&'static str> = if filter.court.is_some() {
        Some("court")
    } else if filter.tags.as_ref().map_or(false, |t| !t.is_empty()) {
        Some("tags")
    } else if filter.doc_type.is_some() {
        Some("doc_type")
    } else if filter.date_from.is_some() || filter.date_to.is_some() {
        Some("date range")
    } else {
        None
    };
    match unsupported {
        Some(name) => Err(StoreError::UnsupportedFilter { filter: name }.into()),
        None => Ok(()),
    }
}
