//! The store contract.
//!
//! A store commits a sealed block's bytes under a destination key, a
//! time-bucket directory, and a file name. A successful return from
//! [`BlockStore::write`] is the durability commit point: the engine
//! acknowledges the block's upstream messages immediately afterwards,
//! so an implementation must not report success before the bytes are
//! actually accepted by the backing storage.

use std::time::Duration;

use async_trait::async_trait;

use crate::buffer::SealedBuffer;
use crate::error::Result;

/// Outcome of a successful block commit.
#[derive(Debug, Clone)]
pub struct Committed {
    /// Where the block ended up (path, URL, object key, ...).
    pub locator: String,
    /// Number of bytes written.
    pub bytes_written: u64,
    /// How long the commit took.
    pub elapsed: Duration,
}

/// Commits sealed blocks to a storage backend.
///
/// `dir` is a time-bucket prefix (`YYYY/MM/DD/HH/MM/`) derived from the
/// block's window start. Implementations may ignore it (single-directory
/// stores) or combine it with a base derived from `dest_key`.
#[async_trait]
pub trait BlockStore<K>: Send + Sync {
    async fn write(
        &self,
        block: &mut SealedBuffer,
        dest_key: &K,
        dir: &str,
        file_name: &str,
    ) -> Result<Committed>;
}
