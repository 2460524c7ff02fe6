use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while reading corpora, building vocabularies and embeddings.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("format error in '{}' at line {line}: {message}", path.display())]
    Format {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("unknown dataset '{0}' (expected one of: restaurant, laptop, restaurant16)")]
    UnknownDataset(String),

    #[error("cache artifact '{}' could not be (de)serialized: {source}", path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("JSON error on '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("encoder error: {0}")]
    Encoder(String),
}

impl DataError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        DataError::Format {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_message() {
        let err = DataError::format("train.seg", 7, "polarity 'x' is not an integer");
        assert_eq!(
            err.to_string(),
            "format error in 'train.seg' at line 7: polarity 'x' is not an integer"
        );
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = DataError::io(
            "missing.seg",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("missing.seg"));
    }
}
