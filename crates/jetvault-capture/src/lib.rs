//! JetStream capture engine.
//!
//! jetvault drains a durable JetStream pull consumer into batched,
//! time-bounded, optionally compressed artifacts on a pluggable storage
//! backend. Messages are decoded into a caller-defined payload type,
//! grouped by a caller-defined destination key, accumulated into blocks
//! covering a fixed time window, and acknowledged upstream only after a
//! block's bytes are committed to the store. Delivery from stream to
//! storage is therefore at-least-once.
//!
//! The caller supplies three plug-ins:
//!
//! - a [`MessageDecoder`] mapping each raw message to
//!   `(payload, destination key)`;
//! - a [`WriterFactory`] producing one [`FormattedWriter`] per block
//!   (NDJSON and CSV implementations ship in [`formats`]);
//! - a [`BlockStore`] committing sealed blocks (local filesystem and
//!   `object_store`-backed implementations ship in [`stores`]).
//!
//! # Example
//!
//! ```ignore
//! use jetvault_capture::{
//!     raw_message_decoder, subject_dest_key, CaptureOptions, ShutdownHandle,
//! };
//! use jetvault_capture::formats::ndjson_writer;
//! use jetvault_capture::stores::LocalFsStore;
//!
//! let options = CaptureOptions::new(
//!     "ORDERS",
//!     "archiver",
//!     raw_message_decoder(subject_dest_key),
//!     ndjson_writer(),
//!     LocalFsStore::single_dir("/var/lib/capture"),
//! )
//! .with_suffix("json");
//!
//! let shutdown = ShutdownHandle::new();
//! shutdown.install_ctrl_c();
//!
//! let mut capture = options.build()?;
//! capture.run(shutdown.subscribe()).await?;
//! ```

pub mod app;
mod block;
mod capture;
mod decode;
mod error;
pub mod formats;
mod nats;
mod options;
mod shutdown;
pub mod stores;

pub use capture::Capture;
pub use decode::{
    raw_message_decoder, subject_dest_key, CapturedMessage, CapturedMetadata, MessageDecoder,
};
pub use error::{BoxError, CaptureError, Result};
pub use nats::{NatsConfig, DEFAULT_NATS_URL};
pub use options::{CaptureOptions, StoreCompleteFn, DEFAULT_MAX_AGE};
pub use shutdown::{Shutdown, ShutdownHandle};

// Core contracts, re-exported so most callers need only this crate.
pub use jetvault_core::{
    BlockBuffer, BlockStore, Committed, Compression, FormattedWriter, SealedBuffer, WriterFactory,
};
