//! Core primitives for jetvault.
//!
//! This crate is broker-agnostic. It provides the building blocks the
//! capture engine assembles around a NATS JetStream consumer:
//!
//! - [`Compression`]: the supported on-disk compression modes.
//! - [`buffer`]: write-then-read block buffers (memory, temp file, or
//!   either wrapped in a streaming compressor) with a sealed read-only
//!   stage enforced by the type system.
//! - [`FormattedWriter`]: the contract a payload formatter implements
//!   (NDJSON, CSV, ...). One instance is created per block.
//! - [`BlockStore`]: the contract a storage backend implements. A
//!   successful `write` is the durability commit point.

pub mod buffer;
pub mod compression;
pub mod error;
pub mod store;
pub mod writer;

pub use buffer::{new_buffer, BlockBuffer, CompressedBuffer, DiskBuffer, MemoryBuffer, SealedBuffer};
pub use compression::Compression;
pub use error::{Error, Result};
pub use store::{BlockStore, Committed};
pub use writer::{FormattedWriter, WriterFactory};
