//! # korpus-retrieval — Hybrid Retrieval Pipeline
//!
//! The query path of the platform: a pure, deterministic query planner
//! over structured case frames; weighted aggregation of lexical (BM25)
//! results across plan atoms; a per-pack vector index over chunk
//! embeddings; fusion of both signals into a single ranking; and
//! citation extraction so every returned hit carries a verbatim,
//! offset-addressed quote.
//!
//! Scoring conventions, fixed across the pipeline:
//!
//! - BM25 is lower-is-better as returned by the FTS engine, and is
//!   reported verbatim.
//! - Cosine distance is lower-is-better.
//! - Fused score `S = 0.6·(1/(1+bm25)) + 0.4·(1/(1+distance))`, a
//!   missing signal contributing 0. Lexical precision dominates;
//!   the vector signal lifts recall.

pub mod build;
pub mod embed;
pub mod error;
pub mod executor;
pub mod hybrid;
pub mod planner;
pub mod service;
pub mod vector;

pub use build::{build_vector_index, VectorBuildParams};
pub use embed::{Embedder, HashEmbedder};
pub use error::{RetrievalError, RetrievalResult};
pub use executor::{execute_fts_plan, AggregatedHit};
pub use hybrid::{extract_citations, extract_query_terms, hybrid_retrieve, merge_and_rank};
pub use planner::{build_query_plan, AtomKind, CaseFrame, QueryAtom, QueryPlan};
pub use service::{RetrievalService, VectorBackend, VectorHit};
pub use vector::{IdMap, VectorIndex};
