//! Local filesystem store.
//!
//! Commits blocks under `resolver(dest_key)/dir/file_name`, creating
//! directories as needed. The file is fsynced before the store reports
//! success, since the engine acks upstream messages on return.

use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use jetvault_core::{BlockStore, Committed, Error, Result, SealedBuffer};

use crate::error::BoxError;

type ResolverFn<K> = Box<dyn Fn(&K) -> std::result::Result<PathBuf, BoxError> + Send + Sync>;

/// Writes blocks to the local filesystem, grouping by a key-derived
/// base directory.
pub struct LocalFsStore<K> {
    resolver: ResolverFn<K>,
}

impl<K> LocalFsStore<K> {
    /// `resolver` maps a destination key to the base directory its
    /// blocks land under.
    pub fn new(
        resolver: impl Fn(&K) -> std::result::Result<PathBuf, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            resolver: Box::new(resolver),
        }
    }

    /// A store that ignores the key and writes everything under `root`.
    pub fn single_dir(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::new(move |_| Ok(root.clone()))
    }
}

#[async_trait]
impl<K: Send + Sync> BlockStore<K> for LocalFsStore<K> {
    async fn write(
        &self,
        block: &mut SealedBuffer,
        dest_key: &K,
        dir: &str,
        file_name: &str,
    ) -> Result<Committed> {
        let started = Instant::now();

        let base = (self.resolver)(dest_key).map_err(|e| Error::Store(e.to_string()))?;
        let target_dir = base.join(dir);
        tokio::fs::create_dir_all(&target_dir).await?;

        let path = target_dir.join(file_name);
        debug!(path = %path.display(), "writing block");

        let mut file = tokio::fs::File::create(&path).await?;
        let bytes_written = tokio::io::copy(block, &mut file).await?;
        file.sync_all().await?;

        Ok(Committed {
            locator: path.display().to_string(),
            bytes_written,
            elapsed: started.elapsed(),
        })
    }
}
