//! The capture engine.
//!
//! One [`Capture`] instance drives a single-task cooperative loop
//! against a durable JetStream pull consumer: fetch a batch, decode and
//! route each message into its `(destination key, window)` block, then
//! sweep mature blocks through seal → store → ack. Acks are published
//! only after the store accepted a block's bytes, so delivery from
//! stream to storage is at-least-once; duplicates across restarts are
//! possible and expected.
//!
//! Block age is measured against observed *stream time* (the newest
//! broker timestamp seen), not the wall clock, which keeps replays and
//! backfills correct. The trade-off is that a quiet stream stops aging
//! blocks; the ack-pending backpressure check below is the backstop. A
//! pull consumer at its ack-pending ceiling silently stops delivering,
//! and from the outside that looks identical to an empty stream — so on
//! every idle fetch the engine asks the broker for consumer info and
//! force-flushes when ack-pending is near the ceiling.
//!
//! Horizontal scaling is running more instances bound to the same
//! durable consumer; the broker partitions delivery between them.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use async_nats::jetstream;
use async_nats::jetstream::consumer::{AckPolicy, PullConsumer};
use async_nats::Client;
use futures::StreamExt;
use time::OffsetDateTime;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use jetvault_core::new_buffer;

use crate::block::{window_start, DataBlock};
use crate::decode::safe_decode;
use crate::error::{CaptureError, Result};
use crate::options::{
    CaptureOptions, ACK_WAIT_MARGIN, BACKPRESSURE_THRESHOLD, CONSUMER_INFO_TIMEOUT,
    DEFAULT_FETCH_BATCH, FETCH_WAIT, FILE_PREFIX,
};
use crate::shutdown::Shutdown;

enum Fetched {
    /// At least one message arrived within the wait.
    Messages,
    /// The wait elapsed without deliveries.
    Idle,
}

/// The capture engine. See the module docs for the loop structure.
pub struct Capture<P, K> {
    opts: CaptureOptions<P, K>,
    blocks: HashMap<K, Vec<DataBlock<P>>>,
    newest_message: OffsetDateTime,
    fetched: u64,
    acked: u64,
}

impl<P, K> Capture<P, K>
where
    P: Send,
    K: Eq + Hash + Clone + Debug + Send + Sync,
{
    /// Validate the options and build an engine.
    pub fn new(mut opts: CaptureOptions<P, K>) -> Result<Self> {
        opts.validate()?;
        Ok(Self {
            opts,
            blocks: HashMap::new(),
            newest_message: OffsetDateTime::UNIX_EPOCH,
            fetched: 0,
            acked: 0,
        })
    }

    /// Messages fetched so far.
    pub fn fetched(&self) -> u64 {
        self.fetched
    }

    /// Messages acknowledged so far. Lags `fetched` by the messages in
    /// open blocks plus any that failed decode/format/commit.
    pub fn acked(&self) -> u64 {
        self.acked
    }

    /// Connect per the configured [`crate::NatsConfig`] and run.
    pub async fn run(&mut self, shutdown: Shutdown) -> Result<()> {
        let client = self.opts.nats.connect().await?;
        self.run_with_client(client, shutdown).await
    }

    /// Run against a caller-supplied connection. The client's event
    /// callbacks are left untouched.
    pub async fn run_with_client(&mut self, client: Client, mut shutdown: Shutdown) -> Result<()> {
        let js = jetstream::new(client.clone());

        let stream = js.get_stream(&self.opts.stream_name).await.map_err(|e| {
            CaptureError::JetStream(format!(
                "failed to bind stream '{}': {}",
                self.opts.stream_name, e
            ))
        })?;

        let mut consumer: PullConsumer =
            stream.get_consumer(&self.opts.consumer_name).await.map_err(|e| {
                CaptureError::JetStream(format!(
                    "failed to bind consumer '{}': {}",
                    self.opts.consumer_name, e
                ))
            })?;

        let consumer_info = consumer
            .info()
            .await
            .map_err(|e| CaptureError::JetStream(format!("consumer info: {}", e)))?
            .clone();

        if consumer_info.config.ack_policy != AckPolicy::Explicit {
            return Err(CaptureError::Config(format!(
                "consumer '{}' must use the explicit ack policy",
                self.opts.consumer_name
            )));
        }

        // An ack-wait shorter than the block window plus a commit margin
        // would redeliver every message before its block can be stored.
        if consumer_info.config.ack_wait <= self.opts.max_age + ACK_WAIT_MARGIN {
            return Err(CaptureError::Config(format!(
                "consumer ack wait ({:?}) must exceed max age ({:?}) plus a {:?} commit margin",
                consumer_info.config.ack_wait, self.opts.max_age, ACK_WAIT_MARGIN
            )));
        }

        let batch_size = if consumer_info.config.max_batch > 0 {
            consumer_info.config.max_batch as usize
        } else {
            DEFAULT_FETCH_BATCH
        };

        info!(
            stream = %self.opts.stream_name,
            consumer = %self.opts.consumer_name,
            batch_size,
            max_ack_pending = consumer_info.config.max_ack_pending,
            "capture started"
        );

        let result = self
            .pump(&client, &mut consumer, batch_size, &mut shutdown)
            .await;

        // Drain: try to commit everything still open. Whatever fails to
        // commit stays unacked and the broker redelivers it.
        self.sweep_blocks(&client, true).await;

        if self.fetched != self.acked {
            warn!(
                fetched = self.fetched,
                acked = self.acked,
                "exiting with unacknowledged messages"
            );
        }

        if let Err(e) = client.flush().await {
            error!(error = %e, "connection flush on exit failed");
        }

        result
    }

    async fn pump(
        &mut self,
        client: &Client,
        consumer: &mut PullConsumer,
        batch_size: usize,
        shutdown: &mut Shutdown,
    ) -> Result<()> {
        loop {
            if shutdown.is_triggered() {
                return Ok(());
            }

            let outcome = tokio::select! {
                _ = shutdown.triggered() => return Ok(()),
                outcome = self.fetch(consumer, batch_size) => outcome,
            };

            let mut force_flush = false;

            match outcome {
                Ok(Fetched::Messages) => {}
                Ok(Fetched::Idle) => {
                    // An idle fetch is ambiguous: an empty stream and a
                    // consumer stalled at its ack-pending ceiling look
                    // the same from here. Ask the broker which it is.
                    let consumer_info = timeout(CONSUMER_INFO_TIMEOUT, consumer.info())
                        .await
                        .map_err(|_| {
                            CaptureError::JetStream("consumer info query timed out".to_string())
                        })?
                        .map_err(|e| CaptureError::JetStream(format!("consumer info: {}", e)))?;

                    let ceiling = (consumer_info.config.max_ack_pending as f64
                        * BACKPRESSURE_THRESHOLD) as usize;
                    if consumer_info.config.max_ack_pending > 0
                        && consumer_info.num_ack_pending >= ceiling
                    {
                        debug!(
                            num_ack_pending = consumer_info.num_ack_pending,
                            ceiling, "ack pending near ceiling, forcing flush"
                        );
                        force_flush = true;
                    }
                }
                Err(e) => {
                    error!(error = %e, "fetch failed");
                    return Err(e);
                }
            }

            self.sweep_blocks(client, force_flush).await;
        }
    }

    async fn fetch(&mut self, consumer: &mut PullConsumer, batch_size: usize) -> Result<Fetched> {
        let mut batch = consumer
            .batch()
            .max_messages(batch_size)
            .expires(FETCH_WAIT)
            .messages()
            .await
            .map_err(|e| CaptureError::Fetch(e.to_string()))?;

        let mut delivered = 0usize;

        while let Some(next) = batch.next().await {
            let message = next.map_err(|e| CaptureError::Fetch(e.to_string()))?;
            delivered += 1;
            self.fetched += 1;

            let (published, sequence) = match message.info() {
                Ok(info) => (info.published, info.stream_sequence),
                Err(e) => {
                    error!(
                        stream = %self.opts.stream_name,
                        consumer = %self.opts.consumer_name,
                        error = %e,
                        "message carries no usable metadata, skipping"
                    );
                    continue;
                }
            };

            if published > self.newest_message {
                self.newest_message = published;
            }

            let (payload, dest_key) = match safe_decode(self.opts.decoder.as_ref(), &message) {
                Ok(decoded) => decoded,
                Err(e) => {
                    error!(
                        stream = %self.opts.stream_name,
                        consumer = %self.opts.consumer_name,
                        sequence,
                        error = %e,
                        "decode failed, leaving message for redelivery"
                    );
                    continue;
                }
            };

            let start = window_start(published, self.opts.max_age);
            let reply = message.reply.clone();

            let block = match self.find_block(dest_key, start) {
                Ok(block) => block,
                Err(e) => {
                    error!(sequence, error = %e, "failed to open block, skipping message");
                    continue;
                }
            };

            if let Err(e) = block.write(&payload, reply, published) {
                error!(sequence, error = %e, "format failed, leaving message for redelivery");
            }
        }

        Ok(if delivered == 0 {
            Fetched::Idle
        } else {
            Fetched::Messages
        })
    }

    /// Locate the open block for `(dest_key, start)`, creating one with
    /// a fresh buffer and formatter when none exists. Multiple open
    /// blocks per key occur only while deliveries straddle adjacent
    /// windows.
    fn find_block(
        &mut self,
        dest_key: K,
        start: OffsetDateTime,
    ) -> jetvault_core::Result<&mut DataBlock<P>> {
        let blocks = self.blocks.entry(dest_key).or_default();

        let position = match blocks.iter().position(|b| b.start() == start) {
            Some(position) => position,
            None => {
                let buffer = new_buffer(
                    self.opts.buffer_to_disk,
                    &self.opts.temp_dir,
                    self.opts.compression,
                )?;
                let writer = (self.opts.writer_factory)(buffer)?;
                blocks.push(DataBlock::new(start, writer));
                blocks.len() - 1
            }
        };

        Ok(&mut blocks[position])
    }

    fn is_mature(&self, block: &DataBlock<P>, force_flush: bool) -> bool {
        force_flush
            || self.newest_message > block.start() + self.opts.max_age
            || (self.opts.max_messages > 0 && block.message_count() >= self.opts.max_messages)
    }

    /// Finalize every mature block; keep the rest open.
    async fn sweep_blocks(&mut self, client: &Client, force_flush: bool) {
        let dest_keys: Vec<K> = self.blocks.keys().cloned().collect();

        for dest_key in dest_keys {
            let Some(blocks) = self.blocks.remove(&dest_key) else {
                continue;
            };
            let mut keep = Vec::new();

            for block in blocks {
                if self.is_mature(&block, force_flush) {
                    match self.finalize_block(client, block, &dest_key).await {
                        Ok(acked) => self.acked += acked,
                        Err(e) => {
                            error!(dest_key = ?dest_key, error = %e, "failed to finalize block")
                        }
                    }
                } else {
                    keep.push(block);
                }
            }

            if !keep.is_empty() {
                self.blocks.insert(dest_key, keep);
            }
        }

        debug!(force_flush, open_keys = self.blocks.len(), "sweep done");
    }

    /// Seal, commit, and acknowledge one block. The block's buffer is
    /// released on every path; a commit failure simply leaves the
    /// messages unacked for redelivery.
    async fn finalize_block(
        &self,
        client: &Client,
        block: DataBlock<P>,
        dest_key: &K,
    ) -> jetvault_core::Result<u64> {
        let mut sealed = block.seal()?;
        let dir = sealed.path();
        let file_name = sealed.file_name(FILE_PREFIX, &self.opts.file_suffix());

        let result = self
            .opts
            .store
            .write(&mut sealed.data, dest_key, &dir, &file_name)
            .await;

        if let Some(callback) = &self.opts.on_store_complete {
            callback(dest_key, &result);
        }

        let committed = match result {
            Ok(committed) => committed,
            Err(e) => {
                let _ = sealed.discard();
                return Err(e);
            }
        };

        debug!(
            dest_key = ?dest_key,
            locator = %committed.locator,
            bytes = committed.bytes_written,
            elapsed_ms = committed.elapsed.as_millis() as u64,
            messages = sealed.message_count,
            rows = sealed.row_count,
            "block committed"
        );

        let acked = sealed.ack_all(client).await;
        sealed.discard()?;
        Ok(acked)
    }
}
