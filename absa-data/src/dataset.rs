use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::PrepConfig;
use crate::corpus::{read_text, AbsaDataset, CorpusReader};
use crate::embedding::{
    CacheStatus, EmbeddingCache, EmbeddingContext, EmbeddingMatrix, EmbeddingProvider,
};
use crate::error::{DataError, Result};
use crate::vocab::Tokenizer;

/// The benchmark datasets this crate knows how to prepare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetName {
    Restaurant,
    Laptop,
    Restaurant16,
}

impl DatasetName {
    pub const ALL: [DatasetName; 3] = [
        DatasetName::Restaurant,
        DatasetName::Laptop,
        DatasetName::Restaurant16,
    ];

    /// Tag used in messages and cache file names.
    pub fn tag(&self) -> &'static str {
        match self {
            DatasetName::Restaurant => "restaurant",
            DatasetName::Laptop => "laptop",
            DatasetName::Restaurant16 => "restaurant16",
        }
    }

    /// Returns the train and test corpus paths below `data_dir`.
    pub fn files(&self, data_dir: &Path) -> DatasetFiles {
        let (train, test) = match self {
            DatasetName::Restaurant => (
                "semeval14/Restaurants_Train.xml.seg",
                "semeval14/Restaurants_Test_Gold.xml.seg",
            ),
            DatasetName::Laptop => (
                "semeval14/Laptops_Train.xml.seg",
                "semeval14/Laptops_Test_Gold.xml.seg",
            ),
            DatasetName::Restaurant16 => (
                "semeval16/restaurant_2016_training_coba_coba.xml.seg",
                "semeval16/restaurant_2016_testing_gold_coba_coba.xml.seg",
            ),
        };
        DatasetFiles {
            train: data_dir.join(train),
            test: data_dir.join(test),
        }
    }
}

impl FromStr for DatasetName {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        DatasetName::ALL
            .into_iter()
            .find(|name| name.tag() == s)
            .ok_or_else(|| DataError::UnknownDataset(s.to_string()))
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFiles {
    pub train: PathBuf,
    pub test: PathBuf,
}

/// Returns `<cache_dir>/<tag>_word2idx.bin`.
pub fn vocab_cache_path(cache_dir: &Path, tag: &str) -> PathBuf {
    cache_dir.join(format!("{}_word2idx.bin", tag))
}

/// Loads the cached vocabulary of a dataset, or fits one on its train and test text
/// and writes it to `cache_path`.
///
/// # Errors
/// Returns an error if a corpus file or the cache cannot be read or written.
pub fn load_or_fit_vocab(files: &DatasetFiles, cache_path: &Path) -> Result<(Tokenizer, CacheStatus)> {
    if cache_path.exists() {
        log::info!("loading tokenizer: {}", cache_path.display());
        return Ok((Tokenizer::load(cache_path)?, CacheStatus::Hit));
    }

    let text = read_text(&[&files.train, &files.test])?;
    let mut tokenizer = Tokenizer::new();
    tokenizer.fit(&text);

    if let Some(dir) = cache_path.parent() {
        fs::create_dir_all(dir).map_err(|e| DataError::io(dir, e))?;
    }
    tokenizer.save(cache_path)?;
    log::info!(
        "fitted tokenizer with {} words: {}",
        tokenizer.len(),
        cache_path.display()
    );
    Ok((tokenizer, CacheStatus::Miss))
}

/// AbsaDatasetReader struct holding a fully prepared dataset:
/// train and test records indexed with the final vocabulary, and the embedding matrix.
#[derive(Debug)]
pub struct AbsaDatasetReader {
    pub train_data: AbsaDataset,
    pub test_data: AbsaDataset,
    pub embedding_matrix: EmbeddingMatrix,
    pub tokenizer: Tokenizer,
    pub vocab_status: CacheStatus,
    pub embedding_status: CacheStatus,
}

impl AbsaDatasetReader {
    /// Prepares `dataset` with the embedding strategy selected in `config`.
    ///
    /// # Errors
    /// Returns an error if the provider cannot be created or any preparation step fails.
    pub fn new(dataset: DatasetName, config: &PrepConfig) -> Result<Self> {
        let provider = config.provider()?;
        Self::with_provider(dataset, config, provider.as_ref())
    }

    /// Prepares `dataset` with an explicit embedding provider.
    ///
    /// # Arguments
    /// * `dataset` - The dataset to prepare.
    /// * `config` - Data and cache directories.
    /// * `provider` - Builds the embedding matrix when the cache has no usable artifact.
    ///
    /// # Returns
    /// The prepared dataset.
    ///
    /// # Errors
    /// Returns an error if a corpus file is missing or malformed, a cache artifact is corrupt,
    /// or the provider fails.
    pub fn with_provider<P: EmbeddingProvider + ?Sized>(
        dataset: DatasetName,
        config: &PrepConfig,
        provider: &P,
    ) -> Result<Self> {
        log::info!("preparing {} dataset...", dataset);
        let files = dataset.files(&config.data_dir);

        // Raw training records only feed the contextual encoder, which reads their text.
        let raw_tokenizer = Tokenizer::new();
        let data_raw = CorpusReader::new(&raw_tokenizer).read(&files.train)?;

        let (tokenizer, vocab_status) =
            load_or_fit_vocab(&files, &vocab_cache_path(&config.cache_dir, dataset.tag()))?;

        let cache = EmbeddingCache::new(&config.cache_dir);
        let context = EmbeddingContext {
            tokenizer: &tokenizer,
            records: data_raw.records(),
        };
        let (embedding_matrix, embedding_status) =
            cache.load_or_build(dataset.tag(), provider, &context)?;

        let reader = CorpusReader::new(&tokenizer);
        let train_data = reader.read(&files.train)?;
        let test_data = reader.read(&files.test)?;
        log::info!(
            "{}: {} train / {} test records, vocabulary {} ({:?}), embeddings {:?}",
            dataset,
            train_data.len(),
            test_data.len(),
            tokenizer.len(),
            vocab_status,
            embedding_status
        );

        Ok(AbsaDatasetReader {
            train_data,
            test_data,
            embedding_matrix,
            tokenizer,
            vocab_status,
            embedding_status,
        })
    }
}
