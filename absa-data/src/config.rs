use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::embedding::{EmbeddingProvider, WordVectorProvider};
use crate::error::{DataError, Result};

#[cfg(feature = "bert")]
use crate::embedding::{BertEncoder, ContextualProvider};

fn default_word_vectors_path() -> PathBuf {
    PathBuf::from("glove/glove.840B.300d.txt")
}

fn default_embed_dim() -> usize {
    300
}

/// Which embedding strategy to run and where its inputs live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum EmbeddingConfig {
    WordVectors {
        #[serde(default = "default_word_vectors_path")]
        path: PathBuf,
        #[serde(default = "default_embed_dim")]
        embed_dim: usize,
    },
    Contextual {
        model_dir: PathBuf,
    },
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig::Contextual {
            model_dir: PathBuf::from("bert-base-uncased"),
        }
    }
}

/// Settings of a preparation run.
///
/// ```json
/// {
///   "data_dir": "./datasets",
///   "cache_dir": "./cache",
///   "seed": 13,
///   "embedding": { "strategy": "word_vectors", "path": "glove/glove.840B.300d.txt", "embed_dim": 300 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    /// Root the dataset file paths are resolved against.
    pub data_dir: PathBuf,
    /// Directory of the vocabulary and embedding caches.
    pub cache_dir: PathBuf,
    /// Seed of the unknown-token row; random when absent.
    pub seed: Option<u64>,
    pub embedding: EmbeddingConfig,
}

impl Default for PrepConfig {
    fn default() -> Self {
        PrepConfig {
            data_dir: PathBuf::from("."),
            cache_dir: PathBuf::from("."),
            seed: None,
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl PrepConfig {
    /// Reads a configuration from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| DataError::io(path, e))?;
        serde_json::from_str(&content).map_err(|source| DataError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Creates the embedding provider selected by [`PrepConfig::embedding`].
    ///
    /// # Errors
    /// Returns an error if the encoder model cannot be loaded, or if the contextual
    /// strategy is selected in a build without the `bert` feature.
    pub fn provider(&self) -> Result<Box<dyn EmbeddingProvider>> {
        match &self.embedding {
            EmbeddingConfig::WordVectors { path, embed_dim } => {
                let provider = WordVectorProvider::new(path.clone(), *embed_dim);
                Ok(Box::new(match self.seed {
                    Some(seed) => provider.with_seed(seed),
                    None => provider,
                }))
            }
            #[cfg(feature = "bert")]
            EmbeddingConfig::Contextual { model_dir } => Ok(Box::new(ContextualProvider::new(
                BertEncoder::from_dir(model_dir)?,
            ))),
            #[cfg(not(feature = "bert"))]
            EmbeddingConfig::Contextual { model_dir } => Err(DataError::Config(format!(
                "contextual embeddings from '{}' need the `bert` feature",
                model_dir.display()
            ))),
        }
    }
}
