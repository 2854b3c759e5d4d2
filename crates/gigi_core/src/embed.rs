use anyhow::{bail, Result};

use crate::retrieval::cosine_similarity;

/// Maps text to a fixed-length vector whose direction carries its meaning.
///
/// Implementations must be usable from several threads at once; callers
/// never observe internal state between calls.
pub trait EmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }
}

impl EmbeddingProvider for Box<dyn EmbeddingProvider + Send + Sync> {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        (**self).similarity(a, b)
    }
}

impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for &T {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        (**self).similarity(a, b)
    }
}

/// Bag-of-tokens embedding: every token bumps one FNV-1a bucket.
///
/// Only texts sharing tokens score above zero, which makes it handy for
/// tests and for running without model files.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dim: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self { dim: 384 }
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; self.dim];
        let lowered = text.to_lowercase();
        let mut tokens = 0usize;

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut h: u64 = 1469598103934665603;
            for b in token.as_bytes() {
                h ^= *b as u64;
                h = h.wrapping_mul(1099511628211);
            }
            let idx = (h % self.dim as u64) as usize;
            v[idx] += 1.0;
            tokens += 1;
        }

        if tokens == 0 {
            bail!("no tokens to embed in {text:?}");
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for x in &mut v {
            *x /= norm;
        }

        Ok(v)
    }
}
