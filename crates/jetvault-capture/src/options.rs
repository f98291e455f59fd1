//! Capture configuration.
//!
//! [`CaptureOptions`] is the full configuration surface of a capture
//! run: the stream/consumer binding, buffering and compression choices,
//! block cutoffs, and the three caller-supplied plug-ins (decoder,
//! formatter factory, store). The plug-ins are constructor arguments, so
//! a half-built configuration is unrepresentable; `validate` covers the
//! remaining value-level invariants.

use std::fmt::Debug;
use std::path::PathBuf;
use std::time::Duration;

use jetvault_core::{BlockStore, Committed, Compression, WriterFactory};

use crate::capture::Capture;
use crate::decode::MessageDecoder;
use crate::error::{CaptureError, Result};
use crate::nats::NatsConfig;

/// Window size and flush cutoff used when none is configured.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(15 * 60);

/// Prefix for committed file names: `backup-{id}.{suffix}`.
pub(crate) const FILE_PREFIX: &str = "backup";

/// Bounded wait for one pull request.
pub(crate) const FETCH_WAIT: Duration = Duration::from_secs(1);

/// Budget for consumer-info queries made from the fetch loop.
pub(crate) const CONSUMER_INFO_TIMEOUT: Duration = Duration::from_secs(5);

/// Fraction of max-ack-pending that triggers a forced flush.
pub(crate) const BACKPRESSURE_THRESHOLD: f64 = 0.95;

/// How much longer than `max_age` the consumer's ack-wait must be, so a
/// block can age out and commit before the broker starts redelivering.
pub(crate) const ACK_WAIT_MARGIN: Duration = Duration::from_secs(30);

/// Batch size used when the consumer does not limit request batches.
pub(crate) const DEFAULT_FETCH_BATCH: usize = 256;

/// Callback invoked after every store attempt, success or failure.
pub type StoreCompleteFn<K> =
    Box<dyn Fn(&K, &jetvault_core::Result<Committed>) + Send + Sync>;

/// Configuration for a [`Capture`] run.
pub struct CaptureOptions<P, K> {
    pub stream_name: String,
    pub consumer_name: String,
    pub nats: NatsConfig,
    pub compression: Compression,
    /// Base file extension, e.g. `"json"` or `"csv"`. Compression
    /// extends it (`.gz` / `.snappy`).
    pub suffix: String,
    /// Spool block bytes to temp files instead of memory.
    pub buffer_to_disk: bool,
    /// Block window size and age-based flush cutoff.
    pub max_age: Duration,
    /// Secondary per-block message-count cutoff; 0 means unlimited.
    pub max_messages: usize,
    /// Root directory for disk buffers.
    pub temp_dir: PathBuf,

    pub(crate) decoder: Box<dyn MessageDecoder<P, K>>,
    pub(crate) writer_factory: WriterFactory<P>,
    pub(crate) store: Box<dyn BlockStore<K>>,
    pub(crate) on_store_complete: Option<StoreCompleteFn<K>>,
}

impl<P, K> CaptureOptions<P, K> {
    pub fn new(
        stream_name: impl Into<String>,
        consumer_name: impl Into<String>,
        decoder: impl MessageDecoder<P, K> + 'static,
        writer_factory: WriterFactory<P>,
        store: impl BlockStore<K> + 'static,
    ) -> Self {
        Self {
            stream_name: stream_name.into(),
            consumer_name: consumer_name.into(),
            nats: NatsConfig::default(),
            compression: Compression::None,
            suffix: String::new(),
            buffer_to_disk: false,
            max_age: DEFAULT_MAX_AGE,
            max_messages: 0,
            temp_dir: std::env::temp_dir(),
            decoder: Box::new(decoder),
            writer_factory,
            store: Box::new(store),
            on_store_complete: None,
        }
    }

    pub fn with_nats(mut self, nats: NatsConfig) -> Self {
        self.nats = nats;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_buffer_to_disk(mut self, buffer_to_disk: bool) -> Self {
        self.buffer_to_disk = buffer_to_disk;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_on_store_complete(
        mut self,
        callback: impl Fn(&K, &jetvault_core::Result<Committed>) + Send + Sync + 'static,
    ) -> Self {
        self.on_store_complete = Some(Box::new(callback));
        self
    }

    /// Check value-level invariants, filling defaults where allowed.
    pub fn validate(&mut self) -> Result<()> {
        if self.stream_name.is_empty() {
            return Err(CaptureError::Config("stream name not set".to_string()));
        }
        if self.consumer_name.is_empty() {
            return Err(CaptureError::Config("consumer name not set".to_string()));
        }
        if self.max_age.is_zero() {
            self.max_age = DEFAULT_MAX_AGE;
        }
        Ok(())
    }

    /// Validate and build the capture engine.
    pub fn build(self) -> Result<Capture<P, K>>
    where
        P: Send,
        K: Eq + std::hash::Hash + Clone + Debug + Send + Sync,
    {
        Capture::new(self)
    }

    /// The configured suffix extended by the compression extension.
    pub(crate) fn file_suffix(&self) -> String {
        self.compression.suffix(&self.suffix)
    }
}
