//! # Vector Index Build
//!
//! Builds the per-pack vector index from the chunk store: chunks are
//! read in sorted `chunk_id` order (fixing the dense label assignment),
//! embedded in batches, and written out as `vectors.bin` + `idmap.json`
//! + `meta.json`. The index is intentionally not built on server
//! startup; a pack apply triggers a build and readers open the result.

use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use korpus_store::chunks::all_chunks_sorted;

use crate::embed::Embedder;
use crate::error::{RetrievalError, RetrievalResult};
use crate::vector::{IdMap, VectorIndex, IDMAP_FILE};

/// Build parameters for the HNSW graph.
#[derive(Debug, Clone)]
pub struct VectorBuildParams {
    pub m: usize,
    pub ef_construction: usize,
    pub batch_size: usize,
}

impl Default for VectorBuildParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            batch_size: 128,
        }
    }
}

/// Embed every chunk and write a fresh index into `out_dir`.
///
/// Labels are assigned `0..N-1` in sorted `chunk_id` order. Returns the
/// built index and its idmap.
pub fn build_vector_index(
    conn: &Connection,
    embedder: &dyn Embedder,
    out_dir: &Path,
    params: &VectorBuildParams,
) -> RetrievalResult<(VectorIndex, IdMap)> {
    let chunks = all_chunks_sorted(conn)?;
    if chunks.is_empty() {
        return Err(RetrievalError::Index("no chunks to index".into()));
    }

    let dim = embedder.dim();
    let batch_size = params.batch_size.max(1);
    let mut rows: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
        let embedded = embedder.embed(&texts)?;
        if embedded.len() != texts.len() {
            return Err(RetrievalError::Embedding(format!(
                "embedder returned {} rows for {} texts",
                embedded.len(),
                texts.len()
            )));
        }
        for row in &embedded {
            if row.len() != dim {
                return Err(RetrievalError::Embedding(format!(
                    "embedder returned dim {}, expected {dim}",
                    row.len()
                )));
            }
        }
        rows.extend(embedded);
    }

    let chunk_ids: Vec<String> = chunks.into_iter().map(|(id, _)| id).collect();
    let idmap = IdMap::new(chunk_ids);
    let index = VectorIndex::build(dim, rows, params.m, params.ef_construction)?;

    index.save(out_dir)?;
    idmap.save(&out_dir.join(IDMAP_FILE))?;
    info!(
        chunks = index.len(),
        dim,
        out = %out_dir.display(),
        "vector index built"
    );
    Ok((index, idmap))
}
