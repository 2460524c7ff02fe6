use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{EmbeddingContext, EmbeddingMatrix, EmbeddingProvider};
use crate::error::{DataError, Result};
use crate::persist::{read_bincode, write_bincode};

/// How [`EmbeddingCache::load_or_build`] obtained its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// A matching artifact was loaded; nothing was computed.
    Hit,
    /// No artifact existed; the matrix was built and written.
    Miss,
    /// An artifact existed for other inputs; the matrix was rebuilt and overwritten.
    Stale,
}

#[derive(Deserialize)]
struct CachedMatrix {
    fingerprint: String,
    matrix: EmbeddingMatrix,
}

#[derive(Serialize)]
struct CachedMatrixRef<'a> {
    fingerprint: &'a str,
    matrix: &'a EmbeddingMatrix,
}

/// EmbeddingCache struct owning the directory and naming convention of embedding artifacts.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    dir: PathBuf,
}

impl EmbeddingCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        EmbeddingCache { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns `<dir>/<embed_dim>_<tag>_embedding_matrix.bin`.
    pub fn path_for(&self, embed_dim: usize, tag: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}_embedding_matrix.bin", embed_dim, tag))
    }

    /// Loads the cached matrix for `tag` or builds and caches it with `provider`.
    ///
    /// # Arguments
    /// * `tag` - The dataset tag used in the file name.
    /// * `provider` - The provider that builds the matrix on a miss.
    /// * `context` - The vocabulary and records passed to the provider.
    ///
    /// # Returns
    /// The matrix and whether it came from the cache.
    ///
    /// # Errors
    /// Returns an error if the artifact is unreadable or corrupt, if building fails,
    /// or if the new artifact cannot be written.
    pub fn load_or_build<P: EmbeddingProvider + ?Sized>(
        &self,
        tag: &str,
        provider: &P,
        context: &EmbeddingContext<'_>,
    ) -> Result<(EmbeddingMatrix, CacheStatus)> {
        let path = self.path_for(provider.embed_dim(), tag);
        let fingerprint = provider.fingerprint(context);

        let status = if path.exists() {
            log::info!("loading embedding matrix: {}", path.display());
            let cached: CachedMatrix = read_bincode(&path)?;
            if cached.fingerprint == fingerprint {
                return Ok((cached.matrix, CacheStatus::Hit));
            }
            log::warn!(
                "embedding matrix {} was built from different inputs, rebuilding",
                path.display()
            );
            CacheStatus::Stale
        } else {
            CacheStatus::Miss
        };

        log::info!("building embedding matrix: {}", path.display());
        let matrix = provider.build(context)?;
        fs::create_dir_all(&self.dir).map_err(|e| DataError::io(&self.dir, e))?;
        let artifact = CachedMatrixRef {
            fingerprint: &fingerprint,
            matrix: &matrix,
        };
        write_bincode(&path, &artifact)?;
        Ok((matrix, status))
    }
}
