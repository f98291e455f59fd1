//! Time-windowed data blocks.
//!
//! A [`DataBlock`] accumulates one destination key's messages for one
//! time window. Its window start is the message timestamp truncated to
//! the configured block duration, and its identifier is a UUIDv7 seeded
//! from that start, so committed file names sort lexically by time.
//!
//! The open/sealed split enforces the block lifecycle: an open block
//! only accepts writes; sealing consumes it exactly once (finishing the
//! formatter, then sealing the buffer so compressed trailers land before
//! the sync); and only a [`SealedBlock`] exposes readable bytes and the
//! acknowledgement step.
//!
//! A reply token is recorded only after the formatter accepted the
//! payload. A message whose decode or format failed is therefore never
//! acked and the broker redelivers it after ack-wait.

use std::time::Duration;

use async_nats::{Client, Subject};
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::error;
use uuid::Uuid;

use jetvault_core::{FormattedWriter, Result, SealedBuffer};

const ACK_PAYLOAD: &[u8] = b"+ACK";

/// Truncate a timestamp to the start of its window.
pub(crate) fn window_start(timestamp: OffsetDateTime, max_age: Duration) -> OffsetDateTime {
    let window = max_age.as_nanos() as i128;
    if window == 0 {
        return timestamp;
    }
    let nanos = timestamp.unix_timestamp_nanos();
    OffsetDateTime::from_unix_timestamp_nanos(nanos - nanos.rem_euclid(window))
        .unwrap_or(timestamp)
}

fn block_id(start: OffsetDateTime) -> Uuid {
    let seconds = start.unix_timestamp().max(0) as u64;
    let ts = uuid::Timestamp::from_unix(uuid::NoContext, seconds, start.nanosecond());
    Uuid::new_v7(ts)
}

/// One open accumulation of messages for a `(destination key, window)`.
pub(crate) struct DataBlock<P> {
    id: Uuid,
    start: OffsetDateTime,
    newest_message: OffsetDateTime,
    message_count: usize,
    row_count: u64,
    writer: Box<dyn FormattedWriter<P>>,
    acks: Vec<Subject>,
}

impl<P> DataBlock<P> {
    pub fn new(start: OffsetDateTime, writer: Box<dyn FormattedWriter<P>>) -> Self {
        Self {
            id: block_id(start),
            start,
            newest_message: start,
            message_count: 0,
            row_count: 0,
            writer,
            acks: Vec::new(),
        }
    }

    pub fn start(&self) -> OffsetDateTime {
        self.start
    }

    pub fn message_count(&self) -> usize {
        self.message_count
    }

    /// Write one payload. The reply token is recorded for later
    /// acknowledgement only if the formatter succeeds.
    pub fn write(
        &mut self,
        payload: &P,
        reply: Option<Subject>,
        published: OffsetDateTime,
    ) -> Result<()> {
        if published > self.newest_message {
            self.newest_message = published;
        }
        self.message_count += 1;

        let rows = self.writer.write(payload)?;
        self.row_count += rows;
        if let Some(reply) = reply {
            self.acks.push(reply);
        }
        Ok(())
    }

    /// Finish the formatter and seal the buffer, transitioning the block
    /// into its read-only committed form.
    pub fn seal(self) -> Result<SealedBlock> {
        let sink = self.writer.finish()?;
        let data = sink.done_writing()?;
        Ok(SealedBlock {
            id: self.id,
            start: self.start,
            message_count: self.message_count,
            row_count: self.row_count,
            acks: self.acks,
            data,
        })
    }
}

/// A closed block, ready to be committed and acknowledged.
pub(crate) struct SealedBlock {
    pub id: Uuid,
    pub start: OffsetDateTime,
    pub message_count: usize,
    pub row_count: u64,
    pub acks: Vec<Subject>,
    pub data: SealedBuffer,
}

impl SealedBlock {
    /// Time-bucket directory prefix derived from the window start (UTC).
    pub fn path(&self) -> String {
        format!(
            "{:04}/{:02}/{:02}/{:02}/{:02}/",
            self.start.year(),
            u8::from(self.start.month()),
            self.start.day(),
            self.start.hour(),
            self.start.minute(),
        )
    }

    pub fn file_name(&self, prefix: &str, suffix: &str) -> String {
        format!("{}-{}.{}", prefix, self.id, suffix)
    }

    /// Publish a positive acknowledgement for every recorded reply token,
    /// in recorded order, then flush the connection. Returns the number
    /// of successfully published acks.
    pub async fn ack_all(&self, client: &Client) -> u64 {
        let mut acked = 0;
        for reply in &self.acks {
            match client
                .publish(reply.clone(), Bytes::from_static(ACK_PAYLOAD))
                .await
            {
                Ok(()) => acked += 1,
                Err(e) => error!(reply = %reply, error = %e, "ack publish failed"),
            }
        }
        if let Err(e) = client.flush().await {
            error!(error = %e, "flush after acks failed");
        }
        acked
    }

    /// Release the block's backing storage.
    pub fn discard(self) -> Result<()> {
        self.data.remove()
    }
}
