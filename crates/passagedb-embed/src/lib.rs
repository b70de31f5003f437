//! Embedding collaborators.
//!
//! The real embedding model lives outside this system; callers hand the
//! indexer any `Embedder`. This crate ships a deterministic feature-hashing
//! embedder so the pipeline runs offline and tests stay reproducible.

use passagedb_core::traits::Embedder;

/// Hashes whitespace tokens into `dim` buckets and L2-normalizes. Not a
/// semantic model; deterministic output of a fixed length is the point.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_deterministic_and_fixed_length() {
        let embedder = HashEmbedder::new(32);
        let texts = vec!["hello world".to_string()];
        let a = embedder.embed_batch(&texts).unwrap();
        let b = embedder.embed_batch(&texts).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 32);
    }

    #[test]
    fn different_texts_embed_differently() {
        let embedder = HashEmbedder::new(32);
        let out = embedder
            .embed_batch(&["alpha bravo".to_string(), "charlie delta".to_string()])
            .unwrap();
        assert_ne!(out[0], out[1]);
    }

    #[test]
    fn vectors_are_normalized() {
        let embedder = HashEmbedder::new(16);
        let out = embedder.embed_batch(&["some text to hash".to_string()]).unwrap();
        let norm: f32 = out[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
