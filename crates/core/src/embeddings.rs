//! Deterministic local embedding provider: hashed character trigrams,
//! L2-normalized. Good enough for offline use and tests; production
//! deployments swap in a remote provider behind [`EmbeddingProvider`].

use async_trait::async_trait;

use crate::error::IndexError;
use crate::traits::EmbeddingProvider;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Character budget per embedded input. Characters stand in for tokens
/// here, which can over- or under-truncate against a real tokenizer.
pub const MAX_EMBED_CHARS: usize = 8_000;

#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    pub dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl HashingEmbedder {
    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered: String = text.to_lowercase().chars().take(MAX_EMBED_CHARS).collect();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        Ok(self.embed_sync(text))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        Ok(texts.iter().map(|text| self.embed_sync(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedder_is_deterministic() {
        let embedder = HashingEmbedder::default();
        let first = embedder.embed("vedtekter for organisasjonen").await.unwrap();
        let second = embedder.embed("vedtekter for organisasjonen").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn embedder_outputs_expected_length() {
        let embedder = HashingEmbedder { dimensions: 32 };
        let vector = embedder.embed("abc").await.unwrap();
        assert_eq!(vector.len(), 32);
    }

    #[tokio::test]
    async fn similar_texts_score_higher_than_unrelated() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("styret og generalforsamlingen").await.unwrap();
        let b = embedder.embed("styret og generalforsamling").await.unwrap();
        let c = embedder.embed("zzzz qqqq xxxx wwww").await.unwrap();

        let dot = |x: &[f32], y: &[f32]| -> f32 { x.iter().zip(y).map(|(l, r)| l * r).sum() };
        assert!(dot(&a, &b) > dot(&a, &c));
    }
}
