use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::persist::{read_bincode, write_bincode};

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const PAD_INDEX: usize = 0;
pub const UNK_INDEX: usize = 1;

/// Tokenizer struct holding the word-to-index vocabulary of a dataset.
/// Indices 0 and 1 are reserved for the padding and unknown tokens,
/// every other word gets the next free index the first time it is seen.
#[derive(Debug, Clone, PartialEq)]
pub struct Tokenizer {
    word2idx: HashMap<String, usize>,
    idx2word: HashMap<usize, String>,
    next_index: usize,
}

impl Default for Tokenizer {
    /// Creates a new instance of [`Tokenizer`] containing only the reserved tokens.
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// Creates a new instance of [`Tokenizer`].
    ///
    /// # Returns
    /// A tokenizer whose vocabulary contains `<pad>` (0) and `<unk>` (1).
    ///
    /// # Example
    /// ```
    /// use absa_data::vocab::{Tokenizer, UNK_INDEX};
    ///
    /// let mut tokenizer = Tokenizer::new();
    /// tokenizer.fit("The food was great");
    /// assert_eq!(tokenizer.encode("great service"), vec![5, UNK_INDEX]);
    /// ```
    pub fn new() -> Self {
        let mut tokenizer = Tokenizer {
            word2idx: HashMap::new(),
            idx2word: HashMap::new(),
            next_index: 0,
        };
        tokenizer.push(PAD_TOKEN);
        tokenizer.push(UNK_TOKEN);
        tokenizer
    }

    /// Rebuilds a tokenizer from an existing word-to-index mapping.
    ///
    /// # Arguments
    /// * `word2idx` - The mapping to adopt verbatim.
    ///
    /// # Returns
    /// A tokenizer with the reverse mapping reconstructed. No index is reassigned,
    /// later calls to [`Tokenizer::fit`] continue after the largest index.
    pub fn from_word2idx(word2idx: HashMap<String, usize>) -> Self {
        let idx2word = word2idx
            .iter()
            .map(|(word, &idx)| (idx, word.clone()))
            .collect();
        let next_index = word2idx.values().max().map_or(0, |&max| max + 1);
        Tokenizer {
            word2idx,
            idx2word,
            next_index,
        }
    }

    fn push(&mut self, word: &str) {
        self.word2idx.insert(word.to_string(), self.next_index);
        self.idx2word.insert(self.next_index, word.to_string());
        self.next_index += 1;
    }

    /// Learns every unseen word of `text`.
    ///
    /// # Arguments
    /// * `text` - Free text; it is lower-cased and split on whitespace.
    pub fn fit(&mut self, text: &str) {
        let text = text.to_lowercase();
        for word in text.split_whitespace() {
            if !self.word2idx.contains_key(word) {
                self.push(word);
            }
        }
    }

    /// Converts `text` into a sequence of indices.
    ///
    /// # Arguments
    /// * `text` - Free text; it is lower-cased and split on whitespace.
    ///
    /// # Returns
    /// One index per word, [`UNK_INDEX`] for words outside the vocabulary.
    /// Text without any word yields `[PAD_INDEX]`, never an empty sequence.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        let text = text.to_lowercase();
        let sequence: Vec<usize> = text
            .split_whitespace()
            .map(|word| self.word2idx.get(word).copied().unwrap_or(UNK_INDEX))
            .collect();
        if sequence.is_empty() {
            vec![PAD_INDEX]
        } else {
            sequence
        }
    }

    /// Maps indices back to words; indices outside the vocabulary become `<unk>`.
    pub fn decode(&self, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .map(|idx| {
                self.idx2word
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| UNK_TOKEN.to_string())
            })
            .collect()
    }

    pub fn index_of(&self, word: &str) -> Option<usize> {
        self.word2idx.get(word).copied()
    }

    pub fn word_of(&self, index: usize) -> Option<&str> {
        self.idx2word.get(&index).map(String::as_str)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.word2idx.contains_key(word)
    }

    pub fn word2idx(&self) -> &HashMap<String, usize> {
        &self.word2idx
    }

    /// Number of words in the vocabulary, reserved tokens included.
    pub fn len(&self) -> usize {
        self.word2idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word2idx.is_empty()
    }

    /// Number of rows an embedding matrix needs so that every index is addressable.
    pub fn index_bound(&self) -> usize {
        self.next_index
    }

    /// Returns `(index, word)` pairs in index order.
    pub fn entries(&self) -> Vec<(usize, &str)> {
        let mut entries: Vec<(usize, &str)> = self
            .idx2word
            .iter()
            .map(|(&idx, word)| (idx, word.as_str()))
            .collect();
        entries.sort_unstable_by_key(|&(idx, _)| idx);
        entries
    }

    /// Saves the word-to-index mapping to a file.
    ///
    /// # Arguments
    /// * `path` - The vocabulary cache file to write.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or the mapping cannot be serialized.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_bincode(path, &self.word2idx)
    }

    /// Loads a tokenizer from a vocabulary cache file written by [`Tokenizer::save`].
    ///
    /// # Errors
    /// Returns an error if the file is missing or is not a valid mapping.
    pub fn load(path: &Path) -> Result<Self> {
        let word2idx: HashMap<String, usize> = read_bincode(path)?;
        Ok(Self::from_word2idx(word2idx))
    }
}
