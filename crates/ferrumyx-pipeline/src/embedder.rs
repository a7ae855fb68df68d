//! Embedder (C7): a fixed-dimension dense vector for an entity summary
//! string. The model is interchangeable; the pipeline only requires
//! determinism given (model identity, input string) and a stable
//! dimensionality across a single corpus run.

use crate::config::PipelineDefaults;

/// Anything that can turn text into a fixed-dimension embedding.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
    fn dimension(&self) -> usize;
    fn model_id(&self) -> &str;
}

/// Build the summary string the Orchestrator embeds for a node.
pub fn summary_string(standard_name: &str, entity_description: &str) -> String {
    format!("Concept: {standard_name}. Description: {entity_description}")
}

/// A deterministic hash-based embedder. Not a semantic model — it exists so
/// the pipeline has a real, dependency-free default that satisfies the
/// determinism and fixed-dimensionality requirements without a model
/// download. Swap in a real sentence-embedding backend by implementing
/// [`Embedder`] and passing it to the orchestrator.
pub struct DeterministicHashEmbedder {
    dimension: usize,
}

impl DeterministicHashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for DeterministicHashEmbedder {
    fn default() -> Self {
        Self::new(PipelineDefaults::EMBEDDING_DIM)
    }
}

impl Embedder for DeterministicHashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        // FNV-1a over sliding 3-grams; each gram perturbs one dimension
        // chosen by its hash, so the same text always yields the same vector.
        let bytes = text.as_bytes();
        if bytes.is_empty() {
            return vector;
        }
        let window = 3.min(bytes.len());
        for i in 0..=bytes.len() - window {
            let mut hash: u64 = 0xcbf29ce484222325;
            for &b in &bytes[i..i + window] {
                hash ^= b as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            let dim = (hash as usize) % self.dimension;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[dim] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "deterministic-hash-embedder-v1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_string_matches_expected_shape() {
        assert_eq!(
            summary_string("Hypertension", "elevated blood pressure"),
            "Concept: Hypertension. Description: elevated blood pressure"
        );
    }

    #[test]
    fn same_input_yields_same_vector() {
        let embedder = DeterministicHashEmbedder::default();
        let a = embedder.embed("Concept: KRAS. Description: a proto-oncogene");
        let b = embedder.embed("Concept: KRAS. Description: a proto-oncogene");
        assert_eq!(a, b);
    }

    #[test]
    fn different_input_yields_different_vector() {
        let embedder = DeterministicHashEmbedder::default();
        let a = embedder.embed("Concept: KRAS. Description: a gene");
        let b = embedder.embed("Concept: TP53. Description: a different gene");
        assert_ne!(a, b);
    }

    #[test]
    fn dimensionality_is_stable_and_matches_config() {
        let embedder = DeterministicHashEmbedder::default();
        assert_eq!(embedder.dimension(), PipelineDefaults::EMBEDDING_DIM);
        assert_eq!(embedder.embed("anything").len(), PipelineDefaults::EMBEDDING_DIM);
    }

    #[test]
    fn empty_string_yields_zero_vector_of_correct_dimension() {
        let embedder = DeterministicHashEmbedder::default();
        let v = embedder.embed("");
        assert_eq!(v.len(), PipelineDefaults::EMBEDDING_DIM);
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
