//! # Embedder Seam
//!
//! The embedding model is an external collaborator: anything that maps a
//! batch of texts to fixed-dimension float32 vectors can back the vector
//! index. Production deployments plug a real model in behind this trait;
//! [`HashEmbedder`] is a dependency-free deterministic implementation
//! for tests and smoke environments.

use crate::error::{RetrievalError, RetrievalResult};

/// Maps batches of texts to `(n, dim)` float32 embeddings.
pub trait Embedder {
    /// Embedding dimension of this model.
    fn dim(&self) -> usize;

    /// Embed a batch of texts. Must return one `dim`-length vector per
    /// input text, in order.
    fn embed(&self, texts: &[String]) -> RetrievalResult<Vec<Vec<f32>>>;
}

/// Deterministic bag-of-tokens embedder.
///
/// Each case-folded whitespace token is hashed (FNV-1a) into one of
/// `dim` buckets; the resulting count vector is L2-normalized. Texts
/// sharing tokens land near each other under cosine distance, which is
/// all the hybrid pipeline's contracts require of a model.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, texts: &[String]) -> RetrievalResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let mut vector = vec![0.0f32; self.dim];
            for token in text.split_whitespace() {
                let bucket = (fnv1a(&token.to_lowercase()) % self.dim as u64) as usize;
                vector[bucket] += 1.0;
            }
            out.push(l2_normalize(&vector));
        }
        Ok(out)
    }
}

/// Embed a single query string, checking the output shape.
pub fn embed_query(embedder: &dyn Embedder, text: &str) -> RetrievalResult<Vec<f32>> {
    let mut rows = embedder.embed(&[text.to_string()])?;
    if rows.len() != 1 {
        return Err(RetrievalError::Embedding(format!(
            "expected 1 embedding row, got {}",
            rows.len()
        )));
    }
    let row = rows.remove(0);
    if row.len() != embedder.dim() {
        return Err(RetrievalError::Embedding(format!(
            "expected dim {}, got {}",
            embedder.dim(),
            row.len()
        )));
    }
    Ok(row)
}

/// L2-normalize a vector. A small epsilon keeps the all-zero vector
/// finite instead of dividing by zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt() + 1e-12;
    v.iter().map(|x| x / norm).collect()
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn embeddings_are_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(64);
        let texts = vec!["PVM deklaracija FR0600".to_string()];
        let a = embedder.embed(&texts).unwrap();
        let b = embedder.embed(&texts).unwrap();
        assert_eq!(a, b);
        let norm: f32 = a[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    fn shared_tokens_beat_disjoint_tokens() {
        let embedder = HashEmbedder::new(128);
        let rows = embedder
            .embed(&[
                "PVM deklaracija FR0600".to_string(),
                "FR0600 PVM deklaracija terminas".to_string(),
                "darbo užmokestis".to_string(),
            ])
            .unwrap();
        let near = cosine(&rows[0], &rows[1]);
        let far = cosine(&rows[0], &rows[2]);
        assert!(near > far);
    }

    #[test]
    fn case_folding_merges_tokens() {
        let embedder = HashEmbedder::new(128);
        let rows = embedder
            .embed(&["Deklaracija".to_string(), "deklaracija".to_string()])
            .unwrap();
        assert_eq!(rows[0], rows[1]);
    }

    #[test]
    fn empty_text_is_finite() {
        let embedder = HashEmbedder::new(16);
        let rows = embedder.embed(&["".to_string()]).unwrap();
        assert!(rows[0].iter().all(|x| x.is_finite()));
    }

    #[test]
    fn embed_query_checks_shape() {
        let embedder = HashEmbedder::new(32);
        let q = embed_query(&embedder, "deklaracija").unwrap();
        assert_eq!(q.len(), 32);
    }
}
