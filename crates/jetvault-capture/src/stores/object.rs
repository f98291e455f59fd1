//! Object-store-backed block store.
//!
//! Wraps any [`object_store::ObjectStore`] (S3, GCS, Azure, local, or
//! in-memory), uploading blocks at `prefix(dest_key)/dir/file_name`.
//! The upload buffers the sealed block in memory; `put` returning
//! success is the backend's durability acknowledgement.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tokio::io::AsyncReadExt;
use tracing::debug;

use jetvault_core::{BlockStore, Committed, Error, Result, SealedBuffer};

use crate::error::BoxError;

type PrefixFn<K> = Box<dyn Fn(&K) -> std::result::Result<String, BoxError> + Send + Sync>;

/// Commits blocks to an [`ObjectStore`] backend.
pub struct ObjectStoreBlockStore<K> {
    store: Arc<dyn ObjectStore>,
    prefix: PrefixFn<K>,
}

impl<K> ObjectStoreBlockStore<K> {
    /// `prefix` maps a destination key to the object-path prefix its
    /// blocks are uploaded under.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        prefix: impl Fn(&K) -> std::result::Result<String, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            store,
            prefix: Box::new(prefix),
        }
    }

    /// A store uploading everything under a fixed prefix.
    pub fn with_prefix(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::new(store, move |_| Ok(prefix.clone()))
    }
}

#[async_trait]
impl<K: Send + Sync> BlockStore<K> for ObjectStoreBlockStore<K> {
    async fn write(
        &self,
        block: &mut SealedBuffer,
        dest_key: &K,
        dir: &str,
        file_name: &str,
    ) -> Result<Committed> {
        let started = Instant::now();

        let prefix = (self.prefix)(dest_key).map_err(|e| Error::Store(e.to_string()))?;
        let location = format!(
            "{}/{}{}",
            prefix.trim_end_matches('/'),
            dir,
            file_name
        );
        let path = ObjectPath::parse(&location).map_err(|e| Error::Store(e.to_string()))?;

        let mut data = Vec::new();
        block.read_to_end(&mut data).await?;
        let payload = bytes::Bytes::from(data);
        let bytes_written = payload.len() as u64;

        debug!(path = %path, bytes = bytes_written, "uploading block");

        self.store
            .put(&path, payload.into())
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        Ok(Committed {
            locator: path.to_string(),
            bytes_written,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use object_store::memory::InMemory;

    use jetvault_core::{BlockBuffer, MemoryBuffer};

    use super::*;

    fn sealed(content: &[u8]) -> SealedBuffer {
        let mut buffer: Box<dyn BlockBuffer> = Box::new(MemoryBuffer::new());
        buffer.write_all(content).unwrap();
        buffer.done_writing().unwrap()
    }

    #[tokio::test]
    async fn test_upload_path_and_contents() {
        let backend = Arc::new(InMemory::new());
        let store = ObjectStoreBlockStore::new(backend.clone(), |key: &String| {
            Ok(format!("captured/{}", key))
        });

        let mut block = sealed(b"object bytes");
        let committed = store
            .write(&mut block, &"acme".to_string(), "2023/11/14/22/10/", "backup-01.json")
            .await
            .unwrap();

        assert_eq!(
            committed.locator,
            "captured/acme/2023/11/14/22/10/backup-01.json"
        );
        assert_eq!(committed.bytes_written, 12);

        let fetched = backend
            .get(&ObjectPath::parse(&committed.locator).unwrap())
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(fetched.as_ref(), b"object bytes");
    }

    #[tokio::test]
    async fn test_fixed_prefix_ignores_key() {
        let backend = Arc::new(InMemory::new());
        let store = ObjectStoreBlockStore::with_prefix(backend, "archive");

        let mut block = sealed(b"x");
        let committed = store
            .write(&mut block, &"whatever".to_string(), "a/b/", "f.json")
            .await
            .unwrap();
        assert_eq!(committed.locator, "archive/a/b/f.json");
    }

    #[tokio::test]
    async fn test_prefix_error_is_store_error() {
        let backend = Arc::new(InMemory::new());
        let store = ObjectStoreBlockStore::new(backend, |_key: &String| Err("nope".into()));

        let mut block = sealed(b"x");
        let err = store
            .write(&mut block, &"k".to_string(), "d/", "f")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }
}
