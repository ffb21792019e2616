//! Offline embedding provider based on feature hashing.

use crate::embeddings::provider::EmbeddingProvider;
use docqa_core::AppResult;
use std::collections::BTreeMap;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic, content-aware embeddings without a model.
///
/// Each text is hashed into a fixed number of buckets from its lowercase
/// words and its character trigrams, then L2-normalized. Character trigrams
/// keep the vectors useful for scripts without whitespace word boundaries.
/// Not semantic, but stable across runs and platforms, which makes it the
/// default for offline use and tests.
#[derive(Debug)]
pub struct HashingProvider {
    dimensions: usize,
}

impl HashingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        // BTreeMap keeps accumulation order, and so float rounding, fixed.
        let mut features: BTreeMap<u64, f32> = BTreeMap::new();

        for word in lower.split_whitespace() {
            *features.entry(fnv1a(b"w:", word.as_bytes())).or_insert(0.0) += 1.0;
        }

        let chars: Vec<char> = lower.chars().filter(|c| !c.is_whitespace()).collect();
        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            *features.entry(fnv1a(b"t:", trigram.as_bytes())).or_insert(0.0) += 0.5;
        }
        if chars.len() < 3 && !chars.is_empty() {
            let short: String = chars.iter().collect();
            *features.entry(fnv1a(b"t:", short.as_bytes())).or_insert(0.0) += 0.5;
        }

        for (hash, weight) in features {
            let bucket = (hash % self.dimensions as u64) as usize;
            // The high bit picks a sign so unrelated features tend to cancel.
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign * weight.sqrt();
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

fn fnv1a(prefix: &[u8], bytes: &[u8]) -> u64 {
    prefix
        .iter()
        .chain(bytes)
        .fold(FNV_OFFSET, |acc, b| (acc ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingProvider {
    fn provider_name(&self) -> &str {
        "hashing"
    }

    fn model_name(&self) -> &str {
        "hashing-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::squared_l2;

    #[tokio::test]
    async fn test_batch_shape_and_normalization() {
        let provider = HashingProvider::new(64);
        let texts = vec![
            "mitochondria produce energy".to_string(),
            "细胞分裂".to_string(),
            "ok".to_string(),
        ];

        let embeddings = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 3);
        for embedding in &embeddings {
            assert_eq!(embedding.len(), 64);
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4);
        }
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = HashingProvider::new(128);
        let texts = vec!["the same sentence twice".to_string()];
        let a = provider.embed_batch(&texts).await.unwrap();
        let b = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_similar_texts_are_closer() {
        let provider = HashingProvider::new(256);
        let texts = vec![
            "photosynthesis converts light into chemical energy".to_string(),
            "photosynthesis converts sunlight into chemical energy".to_string(),
            "the french revolution began in 1789".to_string(),
        ];
        let e = provider.embed_batch(&texts).await.unwrap();
        assert!(squared_l2(&e[0], &e[1]) < squared_l2(&e[0], &e[2]));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let provider = HashingProvider::new(16);
        let e = provider.embed_batch(&[String::new()]).await.unwrap();
        assert!(e[0].iter().all(|&x| x == 0.0));
    }
}
