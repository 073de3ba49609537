//! Deterministic mock embedder for tests: vectors are derived from a text
//! hash, so identical input always embeds identically and no model or
//! network is required.

use std::hash::{DefaultHasher, Hash, Hasher};

use super::EmbedderError;

#[derive(Debug, Clone, Copy)]
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let bytes = hasher.finish().to_le_bytes();

        let mut embedding = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            // Offset by position so short dimensions still vary.
            embedding.push((bytes[i % 8] as f32 + (i / 8) as f32) / 255.0);
        }

        // L2 normalize
        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut embedding {
                *v *= inv;
            }
        }

        Ok(embedding)
    }

    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimension: 384 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        let embedder = MockEmbedder::new(64);
        assert_eq!(embedder.embed("hello").unwrap().len(), 64);
    }

    #[test]
    fn test_deterministic() {
        let embedder = MockEmbedder::new(32);
        assert_eq!(
            embedder.embed("hello").unwrap(),
            embedder.embed("hello").unwrap()
        );
    }

    #[test]
    fn test_different_inputs_differ() {
        let embedder = MockEmbedder::new(32);
        assert_ne!(
            embedder.embed("hello").unwrap(),
            embedder.embed("world").unwrap()
        );
    }

    #[test]
    fn test_unit_length() {
        let embedder = MockEmbedder::new(32);
        let vec = embedder.embed("normalize me").unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_batch() {
        let embedder = MockEmbedder::new(16);
        let out = embedder
            .embed_batch(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(out.len(), 2);
    }
}
