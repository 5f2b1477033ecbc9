//! # Vector Index
//!
//! Per-pack approximate nearest neighbor search over L2-normalized
//! float32 embeddings under cosine distance (lower is better).
//!
//! Labels are dense `0..N-1`, assigned in sorted `chunk_id` order at
//! build time; the label↔chunk_id bijection is persisted as
//! `idmap.json`. The index is never mutated incrementally (a pack apply
//! triggers a fresh build), so persistence is a flat row-major vector
//! file (`vectors.bin`) plus a small `meta.json`, and opening rebuilds
//! the in-memory HNSW graph from the rows.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::embed::l2_normalize;
use crate::error::{RetrievalError, RetrievalResult};

/// Flat vector file name inside an index directory.
pub const VECTORS_FILE: &str = "vectors.bin";
/// Label → chunk_id map file name.
pub const IDMAP_FILE: &str = "idmap.json";
/// Index metadata file name.
pub const META_FILE: &str = "meta.json";

const VECTORS_MAGIC: u32 = 0x4b56_5831; // "KVX1"

/// Build-time graph parameters, persisted so `open` rebuilds the graph
/// the same way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexMeta {
    pub dim: usize,
    pub count: usize,
    pub space: String,
    pub m: usize,
    pub ef_construction: usize,
}

/// The dense-label → chunk_id bijection of one index build.
#[derive(Debug, Clone, PartialEq)]
pub struct IdMap(Vec<String>);

impl IdMap {
    /// Wrap chunk ids already in label order (label = position).
    pub fn new(chunk_ids: Vec<String>) -> Self {
        Self(chunk_ids)
    }

    /// Resolve a label to its chunk id.
    pub fn chunk_id(&self, label: usize) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Write as a JSON object `{"<label>": "<chunk_id>"}`.
    pub fn save(&self, path: &Path) -> RetrievalResult<()> {
        let map: std::collections::BTreeMap<String, &String> = self
            .0
            .iter()
            .enumerate()
            .map(|(label, id)| (label.to_string(), id))
            .collect();
        let mut text = serde_json::to_string_pretty(&map)?;
        text.push('\n');
        korpus_core::fsio::atomic_write_text(path, &text)?;
        Ok(())
    }

    /// Load and validate: labels must be exactly `0..N-1`.
    pub fn load(path: &Path) -> RetrievalResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let map: std::collections::HashMap<String, String> = serde_json::from_str(&text)?;
        let mut ids = vec![None; map.len()];
        for (label, chunk_id) in map {
            let index: usize = label
                .parse()
                .map_err(|_| RetrievalError::Index(format!("non-numeric idmap label {label:?}")))?;
            if index >= ids.len() {
                return Err(RetrievalError::Index(format!(
                    "idmap label {index} out of range for {} entries",
                    ids.len()
                )));
            }
            ids[index] = Some(chunk_id);
        }
        let ids: Option<Vec<String>> = ids.into_iter().collect();
        ids.map(Self)
            .ok_or_else(|| RetrievalError::Index("idmap labels are not dense 0..N-1".into()))
    }
}

/// In-memory cosine ANN index over normalized rows.
pub struct VectorIndex {
    dim: usize,
    rows: Vec<Vec<f32>>,
    hnsw: Hnsw<'static, f32, DistCosine>,
    meta: VectorIndexMeta,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dim", &self.dim)
            .field("count", &self.rows.len())
            .finish()
    }
}

impl VectorIndex {
    /// Build a fresh index over `rows` (label = row position). Rows are
    /// L2-normalized on the way in.
    pub fn build(dim: usize, rows: Vec<Vec<f32>>, m: usize, ef_construction: usize) -> RetrievalResult<Self> {
        if dim == 0 {
            return Err(RetrievalError::Index("dim must be > 0".into()));
        }
        for (label, row) in rows.iter().enumerate() {
            if row.len() != dim {
                return Err(RetrievalError::Index(format!(
                    "row {label} has dim {}, expected {dim}",
                    row.len()
                )));
            }
        }
        let rows: Vec<Vec<f32>> = rows.iter().map(|r| l2_normalize(r)).collect();
        let hnsw = build_graph(&rows, m, ef_construction);
        let meta = VectorIndexMeta {
            dim,
            count: rows.len(),
            space: "cosine".into(),
            m,
            ef_construction,
        };
        Ok(Self { dim, rows, hnsw, meta })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Nearest neighbors of `query`: `(label, cosine distance)` pairs,
    /// distance ascending. `top_k` is clamped to the index size.
    pub fn search(&self, query: &[f32], top_k: usize) -> RetrievalResult<Vec<(usize, f32)>> {
        if query.len() != self.dim {
            return Err(RetrievalError::Index(format!(
                "query dim {} does not match index dim {}",
                query.len(),
                self.dim
            )));
        }
        let k = top_k.min(self.rows.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        let normalized = l2_normalize(query);
        let ef_search = k.max(50);
        let mut neighbours: Vec<(usize, f32)> = self
            .hnsw
            .search(&normalized, k, ef_search)
            .into_iter()
            .map(|n| (n.d_id, n.distance))
            .collect();
        neighbours.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        neighbours.truncate(k);
        Ok(neighbours)
    }

    /// Persist the flat vector file and metadata into `dir`.
    pub fn save(&self, dir: &Path) -> RetrievalResult<()> {
        std::fs::create_dir_all(dir)?;
        let mut writer = BufWriter::new(File::create(dir.join(VECTORS_FILE))?);
        writer.write_all(&VECTORS_MAGIC.to_le_bytes())?;
        writer.write_all(&(self.dim as u32).to_le_bytes())?;
        writer.write_all(&(self.rows.len() as u64).to_le_bytes())?;
        for row in &self.rows {
            for value in row {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
        writer.flush()?;

        let mut meta_text = serde_json::to_string_pretty(&self.meta)?;
        meta_text.push('\n');
        korpus_core::fsio::atomic_write_text(&dir.join(META_FILE), &meta_text)?;
        Ok(())
    }

    /// Open an index directory: read metadata and rows, rebuild the graph.
    pub fn open(dir: &Path) -> RetrievalResult<Self> {
        let meta_text = std::fs::read_to_string(dir.join(META_FILE))?;
        let meta: VectorIndexMeta = serde_json::from_str(&meta_text)?;
        if meta.space != "cosine" {
            return Err(RetrievalError::Index(format!(
                "unsupported space {:?}",
                meta.space
            )));
        }

        let mut reader = BufReader::new(File::open(dir.join(VECTORS_FILE))?);
        let magic = read_u32(&mut reader)?;
        if magic != VECTORS_MAGIC {
            return Err(RetrievalError::Index("bad vectors.bin magic".into()));
        }
        let dim = read_u32(&mut reader)? as usize;
        let count = read_u64(&mut reader)? as usize;
        if dim != meta.dim || count != meta.count {
            return Err(RetrievalError::Index(format!(
                "vectors.bin header (dim={dim}, count={count}) disagrees with meta.json (dim={}, count={})",
                meta.dim, meta.count
            )));
        }

        let mut rows = Vec::with_capacity(count);
        let mut buf = [0u8; 4];
        for _ in 0..count {
            let mut row = Vec::with_capacity(dim);
            for _ in 0..dim {
                reader.read_exact(&mut buf)?;
                row.push(f32::from_le_bytes(buf));
            }
            rows.push(row);
        }

        let hnsw = build_graph(&rows, meta.m, meta.ef_construction);
        Ok(Self {
            dim,
            rows,
            hnsw,
            meta,
        })
    }
}

fn build_graph(rows: &[Vec<f32>], m: usize, ef_construction: usize) -> Hnsw<'static, f32, DistCosine> {
    let capacity = rows.len().max(1);
    let nb_layer = 16.min(((capacity as f32).ln().trunc() as usize).max(1));
    let hnsw = Hnsw::<f32, DistCosine>::new(m, capacity, nb_layer, ef_construction, DistCosine {});
    for (label, row) in rows.iter().enumerate() {
        hnsw.insert((row, label));
    }
    hnsw
}

fn read_u32(reader: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_rows() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0],
        ]
    }

    #[test]
    fn nearest_neighbor_is_itself() {
        let index = VectorIndex::build(4, demo_rows(), 16, 200).unwrap();
        let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].0, 0);
        assert!(hits[0].1 < 1e-5);
        assert_eq!(hits[1].0, 1);
    }

    #[test]
    fn distances_ascend() {
        let index = VectorIndex::build(4, demo_rows(), 16, 200).unwrap();
        let hits = index.search(&[0.8, 0.2, 0.0, 0.0], 4).unwrap();
        for pair in hits.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn top_k_is_clamped_to_count() {
        let index = VectorIndex::build(4, demo_rows(), 16, 200).unwrap();
        let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 100).unwrap();
        assert_eq!(hits.len(), 4);
    }

    #[test]
    fn query_dim_mismatch_is_rejected() {
        let index = VectorIndex::build(4, demo_rows(), 16, 200).unwrap();
        assert!(index.search(&[1.0, 0.0], 2).is_err());
    }

    #[test]
    fn empty_index_returns_empty() {
        let index = VectorIndex::build(4, Vec::new(), 16, 200).unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn save_open_roundtrip_preserves_search_results() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::build(4, demo_rows(), 16, 200).unwrap();
        index.save(dir.path()).unwrap();

        let reopened = VectorIndex::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 4);
        assert_eq!(reopened.dim(), 4);
        let a = index.search(&[0.9, 0.1, 0.0, 0.0], 4).unwrap();
        let b = reopened.search(&[0.9, 0.1, 0.0, 0.0], 4).unwrap();
        assert_eq!(
            a.iter().map(|(l, _)| *l).collect::<Vec<_>>(),
            b.iter().map(|(l, _)| *l).collect::<Vec<_>>()
        );
    }

    #[test]
    fn open_rejects_corrupt_header() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::build(4, demo_rows(), 16, 200).unwrap();
        index.save(dir.path()).unwrap();
        std::fs::write(dir.path().join(VECTORS_FILE), b"garbage").unwrap();
        assert!(VectorIndex::open(dir.path()).is_err());
    }

    #[test]
    fn idmap_roundtrip_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let idmap = IdMap::new(vec!["a".into(), "b".into(), "c".into()]);
        let path = dir.path().join(IDMAP_FILE);
        idmap.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"0\": \"a\""));

        let loaded = IdMap::load(&path).unwrap();
        assert_eq!(loaded, idmap);
        assert_eq!(loaded.chunk_id(2), Some("c"));
        assert_eq!(loaded.chunk_id(3), None);
    }

    #[test]
    fn idmap_rejects_sparse_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(IDMAP_FILE);
        std::fs::write(&path, r#"{"0": "a", "2": "c"}"#).unwrap();
        assert!(IdMap::load(&path).is_err());
    }
}
