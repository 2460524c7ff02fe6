use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{EmbeddingContext, EmbeddingMatrix, EmbeddingProvider, Fingerprint};
use crate::error::{DataError, Result};
use crate::vocab::{Tokenizer, PAD_INDEX, UNK_INDEX};

/// Reads the vectors of all vocabulary words from a word-vector file.
///
/// Each line holds a word followed by `embed_dim` numbers. The word is everything before
/// the last `embed_dim` tokens, so multi-token words such as `new york` are kept intact.
///
/// # Arguments
/// * `path` - The word-vector file.
/// * `tokenizer` - Only words of this vocabulary are retained.
/// * `embed_dim` - Number of components per vector.
///
/// # Returns
/// A map from word to vector for every vocabulary word found in the file.
///
/// # Errors
/// Returns an error if the file cannot be read, a non-blank line has no room for a word,
/// or a retained vector has a non-numeric component.
pub fn load_word_vec(
    path: &Path,
    tokenizer: &Tokenizer,
    embed_dim: usize,
) -> Result<HashMap<String, Vec<f32>>> {
    let file = File::open(path).map_err(|e| DataError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut word_vec = HashMap::new();
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| DataError::io(path, e))?;
        if read == 0 {
            break;
        }
        line_no += 1;
        if line_no % 100_000 == 0 {
            log::debug!("scanned {} word vectors, {} retained", line_no, word_vec.len());
        }

        let line = String::from_utf8_lossy(&buf);
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() <= embed_dim {
            return Err(DataError::format(
                path,
                line_no,
                format!(
                    "expected a word and {} components, found {} tokens",
                    embed_dim,
                    tokens.len()
                ),
            ));
        }

        let split = tokens.len() - embed_dim;
        let word = tokens[..split].join(" ");
        if !tokenizer.contains(&word) {
            continue;
        }
        let vector = tokens[split..]
            .iter()
            .map(|value| {
                value.parse::<f32>().map_err(|_| {
                    DataError::format(path, line_no, format!("component '{}' is not a number", value))
                })
            })
            .collect::<Result<Vec<f32>>>()?;
        word_vec.insert(word, vector);
    }

    log::info!(
        "found vectors for {} of {} vocabulary words",
        word_vec.len(),
        tokenizer.len()
    );
    Ok(word_vec)
}

/// WordVectorProvider struct building a static embedding matrix from a word-vector file.
#[derive(Debug, Clone)]
pub struct WordVectorProvider {
    path: PathBuf,
    embed_dim: usize,
    seed: Option<u64>,
}

impl WordVectorProvider {
    /// Creates a new instance of [`WordVectorProvider`].
    ///
    /// # Arguments
    /// * `path` - The word-vector file, e.g. a GloVe text file.
    /// * `embed_dim` - Number of components per vector in that file.
    pub fn new(path: impl Into<PathBuf>, embed_dim: usize) -> Self {
        WordVectorProvider {
            path: path.into(),
            embed_dim,
            seed: None,
        }
    }

    /// Seeds the generator of the unknown-token row.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EmbeddingProvider for WordVectorProvider {
    fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    fn fingerprint(&self, context: &EmbeddingContext<'_>) -> String {
        let mut fp = Fingerprint::new("word_vectors");
        fp.field(self.path.to_string_lossy().as_bytes())
            .number(self.embed_dim);
        for (idx, word) in context.tokenizer.entries() {
            fp.number(idx).field(word.as_bytes());
        }
        fp.finish()
    }

    fn build(&self, context: &EmbeddingContext<'_>) -> Result<EmbeddingMatrix> {
        if self.embed_dim == 0 {
            return Err(DataError::Config(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        let tokenizer = context.tokenizer;
        let mut matrix = Array2::<f32>::zeros((tokenizer.index_bound(), self.embed_dim));

        if matrix.nrows() > UNK_INDEX {
            let mut rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let bound = 1.0 / (self.embed_dim as f32).sqrt();
            matrix
                .row_mut(UNK_INDEX)
                .iter_mut()
                .for_each(|v| *v = rng.gen_range(-bound..bound));
        }

        log::info!("loading word vectors from {}", self.path.display());
        let word_vec = load_word_vec(&self.path, tokenizer, self.embed_dim)?;

        // Words without a vector keep their all-zero row.
        for (word, &idx) in tokenizer.word2idx() {
            if idx == PAD_INDEX || idx == UNK_INDEX {
                continue;
            }
            if let Some(vector) = word_vec.get(word) {
                matrix
                    .row_mut(idx)
                    .assign(&ArrayView1::from(vector.as_slice()));
            }
        }

        Ok(EmbeddingMatrix::Static(matrix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use tempfile::NamedTempFile;

    // Helper: write a word-vector file.
    fn create_vectors_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file for vectors");
        write!(file, "{}", content).expect("Failed to write vectors");
        file
    }

    #[test]
    fn test_load_word_vec_multi_token_word() -> Result<()> {
        let vectors = create_vectors_file("new york 0.1 0.2\nparis 0.3 0.4\n");
        let tokenizer = Tokenizer::from_word2idx(
            [("<pad>", 0), ("<unk>", 1), ("new york", 2)]
                .into_iter()
                .map(|(w, i)| (w.to_string(), i))
                .collect(),
        );

        let word_vec = load_word_vec(vectors.path(), &tokenizer, 2)?;
        assert_eq!(word_vec.len(), 1);
        assert_eq!(word_vec.get("new york"), Some(&vec![0.1, 0.2]));
        Ok(())
    }

    #[test]
    fn test_load_word_vec_skips_blank_lines_and_unknown_words() -> Result<()> {
        let vectors = create_vectors_file("\nfood 1 2 3\nxylophone bad bad bad\n\n");
        let mut tokenizer = Tokenizer::new();
        tokenizer.fit("food");

        let word_vec = load_word_vec(vectors.path(), &tokenizer, 3)?;
        assert_eq!(word_vec.get("food"), Some(&vec![1.0, 2.0, 3.0]));
        assert_eq!(word_vec.len(), 1);
        Ok(())
    }

    #[test]
    fn test_load_word_vec_short_line_is_fatal() {
        let vectors = create_vectors_file("food 1 2 3\n0.5 0.5\n");
        let tokenizer = Tokenizer::new();

        match load_word_vec(vectors.path(), &tokenizer, 3) {
            Err(DataError::Format { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_word_vec_bad_component_is_fatal() {
        let vectors = create_vectors_file("food 1 two\n");
        let mut tokenizer = Tokenizer::new();
        tokenizer.fit("food");

        assert!(matches!(
            load_word_vec(vectors.path(), &tokenizer, 2),
            Err(DataError::Format { .. })
        ));
    }

    #[test]
    fn test_build_static_matrix() -> Result<()> {
        let vectors = create_vectors_file(
            "<pad> 9 9 9 9\n<unk> 9 9 9 9\ngood 1 2 3 4\ncheap -1 -2 -3 -4\n",
        );
        let mut tokenizer = Tokenizer::new();
        tokenizer.fit("good cheap service");

        let provider = WordVectorProvider::new(vectors.path(), 4).with_seed(7);
        let context = EmbeddingContext {
            tokenizer: &tokenizer,
            records: &[],
        };
        let matrix = match provider.build(&context)? {
            EmbeddingMatrix::Static(matrix) => matrix,
            other => panic!("expected a static matrix, got {:?}", other),
        };

        assert_eq!(matrix.dim(), (5, 4));
        assert!(matrix.row(PAD_INDEX).iter().all(|&v| v == 0.0));

        let bound = 0.5f32;
        let unk = matrix.row(UNK_INDEX);
        assert!(unk.iter().all(|&v| (-bound..bound).contains(&v)));
        assert!(unk.iter().any(|&v| v != 0.0));

        assert_eq!(matrix.row(2).to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(matrix.row(3).to_vec(), vec![-1.0, -2.0, -3.0, -4.0]);
        assert!(matrix.row(4).iter().all(|&v| v == 0.0));
        Ok(())
    }

    #[test]
    fn test_seeded_unknown_row_is_reproducible() -> Result<()> {
        let vectors = create_vectors_file("good 1 2\n");
        let mut tokenizer = Tokenizer::new();
        tokenizer.fit("good");
        let context = EmbeddingContext {
            tokenizer: &tokenizer,
            records: &[],
        };

        let provider = WordVectorProvider::new(vectors.path(), 2).with_seed(42);
        assert_eq!(provider.build(&context)?, provider.build(&context)?);
        Ok(())
    }

    #[test]
    fn test_fingerprint_follows_vocabulary() {
        let provider = WordVectorProvider::new("glove.txt", 300);
        let mut tokenizer = Tokenizer::new();
        tokenizer.fit("battery");
        let before = provider.fingerprint(&EmbeddingContext {
            tokenizer: &tokenizer,
            records: &[],
        });
        tokenizer.fit("screen");
        let after = provider.fingerprint(&EmbeddingContext {
            tokenizer: &tokenizer,
            records: &[],
        });
        assert_ne!(before, after);
    }

    #[test]
    fn test_zero_dimension_is_config_error() {
        let provider = WordVectorProvider::new("glove.txt", 0);
        let tokenizer = Tokenizer::new();
        let result = provider.build(&EmbeddingContext {
            tokenizer: &tokenizer,
            records: &[],
        });
        assert!(matches!(result, Err(DataError::Config(_))));
    }
}
