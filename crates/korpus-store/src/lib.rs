//! # korpus-store — Relational Store
//!
//! SQLite-backed storage for ingested documents, their chunks, the
//! full-text index, persisted retrieval runs, and the audit log.
//!
//! The chunk store is the consumer-facing contract of the document
//! pipeline: upstream collaborators (extractor, chunker) produce
//! `(chunk_id, text, document_id, offsets)` rows and this crate owns
//! everything that happens to them afterwards. Chunks of a document are
//! replaced as one transaction, and the FTS5 mirror is maintained inside
//! that same transaction, so the lexical index can never drift from the
//! relational rows.

pub mod audit;
pub mod chunks;
pub mod db;
pub mod documents;
pub mod error;
pub mod fts;
pub mod runs;
pub mod schema;

pub use chunks::ChunkRecord;
pub use db::{connect, connect_in_memory};
pub use documents::{DocumentRecord, DocumentStatus};
pub use error::{StoreError, StoreResult};
pub use fts::{fts_search, FtsFilter, FtsHit};
pub use runs::{Citation, HybridHit, RunRecord};
