//! The formatter contract.
//!
//! A formatter turns decoded payloads into the bytes of one block. The
//! capture engine creates a fresh instance per block through a
//! [`WriterFactory`], handing it the block's buffer; when the block
//! matures, [`FormattedWriter::finish`] flushes any internal buffering
//! and returns the sink so it can be sealed. Committed bytes are always
//! complete because the engine never seals a buffer without finishing
//! the formatter first.

use crate::buffer::BlockBuffer;
use crate::error::Result;

/// Writes payloads of type `P` into a block buffer.
pub trait FormattedWriter<P>: Send {
    /// Encode one payload. Returns the number of rows produced (a single
    /// payload may flatten to several rows, e.g. in CSV).
    fn write(&mut self, payload: &P) -> Result<u64>;

    /// Push any buffered bytes down to the sink.
    fn flush(&mut self) -> Result<()>;

    /// Flush and hand the sink back for sealing.
    fn finish(self: Box<Self>) -> Result<Box<dyn BlockBuffer>>;
}

/// Factory producing one formatter per block, bound to that block's
/// buffer. Implementations may write a header immediately (CSV does).
pub type WriterFactory<P> =
    Box<dyn Fn(Box<dyn BlockBuffer>) -> Result<Box<dyn FormattedWriter<P>>> + Send + Sync>;
