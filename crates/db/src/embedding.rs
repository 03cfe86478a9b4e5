//! Text embeddings for the similarity search path.
//!
//! The dimension is fixed by the `unit_embeddings` schema; any model
//! swapped in behind [`Embedder`] must produce 384-float vectors.

use sakan_core::text::normalize;

pub const EMBEDDING_DIM: usize = 384;

/// Capability seam for the discovery path. Implementations must return
/// L2-normalized vectors of exactly [`EMBEDDING_DIM`] floats.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Deterministic feature-hashing embedder for tests and offline use.
///
/// Unigrams and adjacent bigrams of the normalized text are hashed into
/// signed buckets. Not semantically smart, but stable across runs and
/// processes, which is what the fixtures and tests need.
#[derive(Clone, Copy, Debug, Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    fn bump(vector: &mut [f32], feature: &str) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % EMBEDDING_DIM as u64) as usize;
        let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; EMBEDDING_DIM];
        let normalized = normalize(text);
        let tokens: Vec<&str> = normalized.split_whitespace().collect();
        for token in &tokens {
            Self::bump(&mut vector, token);
        }
        for pair in tokens.windows(2) {
            Self::bump(&mut vector, &format!("{} {}", pair[0], pair[1]));
        }
        let norm = vector.iter().map(|v| (*v as f64).powi(2)).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v = (*v as f64 / norm) as f32;
            }
        }
        vector
    }
}

/// Cosine similarity in [-1, 1]; 0.0 when either vector is all zeros or
/// the lengths differ.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
        norm_a += (*x as f64).powi(2);
        norm_b += (*y as f64).powi(2);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
