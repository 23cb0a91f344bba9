//! Deterministic character-trigram embeddings for the local search backend.

use std::collections::HashMap;

/// Default embedding width.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Trigram-based embedder for local, offline retrieval.
///
/// Produces deterministic, content-dependent unit vectors from character
/// trigrams and whole terms. Terms are split on anything that is not
/// alphanumeric, so CJK runs stay together and punctuation separates them.
#[derive(Debug, Clone)]
pub struct TrigramEmbedder {
    dimensions: usize,
}

impl TrigramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Embed text as a unit vector (zero vector for text without terms).
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];
        let lower = text.to_lowercase();

        let mut term_freq: HashMap<&str, u32> = HashMap::new();
        for term in lower
            .split(|c: char| !c.is_alphanumeric() && c != '.')
            .filter(|t| !t.is_empty())
        {
            *term_freq.entry(term).or_insert(0) += 1;
        }

        for (term, freq) in &term_freq {
            let chars: Vec<char> = term.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let idx = (hash(&trigram, 37) as usize) % self.dimensions;
                embedding[idx] += (*freq as f32).sqrt();
            }

            let idx = (hash(term, 31) as usize) % self.dimensions;
            embedding[idx] += *freq as f32;
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

impl Default for TrigramEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

fn hash(text: &str, multiplier: u64) -> u64 {
    text.bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(b as u64))
}

/// Squared Euclidean distance; in [0, 2] for unit vectors with
/// non-negative components.
pub fn squared_l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_embedding_is_unit_length() {
        let embedder = TrigramEmbedder::default();
        let embedding = embedder.embed("混凝土保护层最小厚度应符合表 8.2.1 的规定");
        assert_eq!(embedding.len(), DEFAULT_DIMENSIONS);
        assert!((norm(&embedding) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_deterministic() {
        let embedder = TrigramEmbedder::default();
        assert_eq!(embedder.embed("立杆间距"), embedder.embed("立杆间距"));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = TrigramEmbedder::default();
        assert!(embedder.embed("，。 ").iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_related_text_is_closer() {
        let embedder = TrigramEmbedder::default();
        let query = embedder.embed("混凝土保护层厚度");
        let related = embedder.embed("混凝土保护层厚度不应小于钢筋公称直径");
        let unrelated = embedder.embed("脚手架连墙件设置");

        assert!(
            squared_l2_distance(&query, &related) < squared_l2_distance(&query, &unrelated)
        );
    }

    #[test]
    fn test_identical_vectors_have_zero_distance() {
        let embedder = TrigramEmbedder::default();
        let v = embedder.embed("GB 50010");
        assert!(squared_l2_distance(&v, &v).abs() < 1e-6);
    }
}
