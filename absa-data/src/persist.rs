use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DataError, Result};

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// Reads a bincode value from `path`.
///
/// Decoding is limited to the size of the file, so a corrupt length prefix
/// fails with [`DataError::Cache`] instead of allocating.
pub(crate) fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| DataError::io(path, e))?;
    let limit = file.metadata().map_err(|e| DataError::io(path, e))?.len();
    options()
        .with_limit(limit)
        .deserialize_from(BufReader::new(file))
        .map_err(|source| DataError::Cache {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes `value` to `path` in the encoding [`read_bincode`] expects.
pub(crate) fn write_bincode<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| DataError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    options()
        .serialize_into(&mut writer, value)
        .map_err(|source| DataError::Cache {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush().map_err(|e| DataError::io(path, e))
}
