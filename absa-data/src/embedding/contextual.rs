use ndarray::Array2;

use super::{EmbeddingContext, EmbeddingMatrix, EmbeddingProvider, Fingerprint};
use crate::error::{DataError, Result};

/// A pretrained encoder producing one hidden-state vector per token.
pub trait ContextEncoder {
    /// Identifier of the underlying model, part of the cache fingerprint.
    fn model_id(&self) -> &str;

    /// Width of each hidden-state vector.
    fn hidden_size(&self) -> usize;

    /// Encodes `text` into a `(tokens, hidden_size)` matrix.
    fn encode(&self, text: &str) -> Result<Array2<f32>>;
}

/// ContextualProvider struct building per-example contextual embeddings.
/// Every record's full sentence goes through the encoder once, and the outputs of
/// all records are kept together in record order.
pub struct ContextualProvider<E> {
    encoder: E,
}

impl<E: ContextEncoder> ContextualProvider<E> {
    pub fn new(encoder: E) -> Self {
        ContextualProvider { encoder }
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }
}

impl<E: ContextEncoder> EmbeddingProvider for ContextualProvider<E> {
    fn embed_dim(&self) -> usize {
        self.encoder.hidden_size()
    }

    fn fingerprint(&self, context: &EmbeddingContext<'_>) -> String {
        let mut fp = Fingerprint::new("contextual");
        fp.field(self.encoder.model_id().as_bytes())
            .number(self.encoder.hidden_size())
            .number(context.records.len());
        for record in context.records {
            fp.field(record.full_text.as_bytes());
        }
        fp.finish()
    }

    fn build(&self, context: &EmbeddingContext<'_>) -> Result<EmbeddingMatrix> {
        let total = context.records.len();
        let hidden_size = self.encoder.hidden_size();
        let mut encodings = Vec::with_capacity(total);

        for (i, record) in context.records.iter().enumerate() {
            let encoded = self.encoder.encode(&record.full_text)?;
            if encoded.ncols() != hidden_size {
                return Err(DataError::Encoder(format!(
                    "example {} encoded to width {}, expected {}",
                    i,
                    encoded.ncols(),
                    hidden_size
                )));
            }
            encodings.push(encoded);

            if (i + 1) % 500 == 0 {
                log::info!("encoded {}/{} examples", i + 1, total);
            }
        }

        log::info!("encoded {} examples with {}", total, self.encoder.model_id());
        Ok(EmbeddingMatrix::Contextual(encodings))
    }
}
