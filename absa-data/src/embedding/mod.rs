//! Embedding matrices for a prepared dataset.
//!
//! An [`EmbeddingProvider`] turns the vocabulary and the record set of a dataset into an
//! [`EmbeddingMatrix`]. Two providers exist:
//!
//! - [`WordVectorProvider`] looks up every vocabulary word in a static word-vector file and
//!   produces one row per vocabulary index.
//! - [`ContextualProvider`] runs every record through a [`ContextEncoder`] and keeps the
//!   per-token hidden states of each example.
//!
//! Results are persisted by [`EmbeddingCache`], which names the artifact after the embedding
//! dimension and the dataset tag and reports whether it was reused.

mod cache;
mod contextual;
mod word_vectors;

#[cfg(feature = "bert")]
mod bert;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::corpus::AspectRecord;
use crate::error::Result;
use crate::vocab::Tokenizer;

pub use cache::{CacheStatus, EmbeddingCache};
pub use contextual::{ContextEncoder, ContextualProvider};
pub use word_vectors::{load_word_vec, WordVectorProvider};

#[cfg(feature = "bert")]
pub use bert::BertEncoder;

/// The embedding artifact of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EmbeddingMatrix {
    /// One row per vocabulary index, `(vocabulary size, dimension)`.
    Static(Array2<f32>),
    /// One `(tokens, hidden size)` matrix per example, in record order.
    Contextual(Vec<Array2<f32>>),
}

impl EmbeddingMatrix {
    pub fn as_static(&self) -> Option<&Array2<f32>> {
        match self {
            EmbeddingMatrix::Static(matrix) => Some(matrix),
            EmbeddingMatrix::Contextual(_) => None,
        }
    }

    pub fn as_contextual(&self) -> Option<&[Array2<f32>]> {
        match self {
            EmbeddingMatrix::Static(_) => None,
            EmbeddingMatrix::Contextual(matrices) => Some(matrices),
        }
    }

    /// Width of a single vector, `None` for a contextual matrix without examples.
    pub fn embed_dim(&self) -> Option<usize> {
        match self {
            EmbeddingMatrix::Static(matrix) => Some(matrix.ncols()),
            EmbeddingMatrix::Contextual(matrices) => matrices.first().map(|m| m.ncols()),
        }
    }
}

/// Everything a provider may draw on: the final vocabulary and the raw training records.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingContext<'a> {
    pub tokenizer: &'a Tokenizer,
    pub records: &'a [AspectRecord],
}

/// Produces an embedding matrix for a dataset.
pub trait EmbeddingProvider {
    /// Dimension used in the cache file name.
    fn embed_dim(&self) -> usize;

    /// Digest of the inputs the matrix depends on. A cached artifact is only reused
    /// when its stored fingerprint equals this value.
    fn fingerprint(&self, context: &EmbeddingContext<'_>) -> String;

    /// Computes the matrix from scratch.
    fn build(&self, context: &EmbeddingContext<'_>) -> Result<EmbeddingMatrix>;
}

/// Incremental SHA-256 over length-prefixed fields, rendered as lowercase hex.
pub(crate) struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub(crate) fn new(kind: &str) -> Self {
        let mut fingerprint = Fingerprint {
            hasher: Sha256::new(),
        };
        fingerprint.field(kind.as_bytes());
        fingerprint
    }

    pub(crate) fn field(&mut self, bytes: &[u8]) -> &mut Self {
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
        self
    }

    pub(crate) fn number(&mut self, value: usize) -> &mut Self {
        self.field(&(value as u64).to_le_bytes())
    }

    pub(crate) fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    #[test]
    fn test_fingerprint_is_deterministic_and_field_aware() {
        let digest = |fields: &[&str]| {
            let mut fp = Fingerprint::new("test");
            for field in fields {
                fp.field(field.as_bytes());
            }
            fp.finish()
        };

        assert_eq!(digest(&["ab", "c"]), digest(&["ab", "c"]));
        assert_ne!(digest(&["ab", "c"]), digest(&["a", "bc"]));
        assert_eq!(digest(&["x"]).len(), 64);
        assert!(digest(&["x"])
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_embed_dim() {
        let static_matrix = EmbeddingMatrix::Static(Array2::zeros((4, 3)));
        assert_eq!(static_matrix.embed_dim(), Some(3));
        assert!(static_matrix.as_contextual().is_none());

        let contextual = EmbeddingMatrix::Contextual(vec![array![[0.5, 0.5]]]);
        assert_eq!(contextual.embed_dim(), Some(2));
        assert_eq!(contextual.as_contextual().map(|m| m.len()), Some(1));

        assert_eq!(EmbeddingMatrix::Contextual(Vec::new()).embed_dim(), None);
    }
}
