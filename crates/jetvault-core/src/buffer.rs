//! Block buffers.
//!
//! A block accumulates formatted bytes into a buffer before commit. The
//! lifecycle has two stages, enforced by types rather than flags:
//!
//! 1. An open [`BlockBuffer`] accepts writes (`io::Write`).
//! 2. [`BlockBuffer::done_writing`] consumes the buffer and yields a
//!    read-only [`SealedBuffer`], after which no further writes are
//!    possible and the bytes are readable from the start.
//!
//! Three implementations:
//!
//! - [`MemoryBuffer`]: plain in-process accumulator.
//! - [`DiskBuffer`]: a collision-free temp file under a caller-chosen
//!   directory. Sealing fsyncs and rewinds. The backing file is deleted
//!   when the sealed buffer is removed or dropped, so a failed commit
//!   never leaks temp files.
//! - [`CompressedBuffer`]: wraps another buffer in a streaming gzip or
//!   Snappy encoder. Sealing closes the encoder *before* sealing the
//!   inner buffer; the reverse order would truncate the trailer.

use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use flate2::write::GzEncoder;
use snap::write::FrameEncoder;
use tempfile::TempPath;
use tokio::io::{AsyncRead, ReadBuf};
use tracing::debug;

use crate::compression::Compression;
use crate::error::Result;

/// A write-only block buffer that can be sealed into a readable form.
pub trait BlockBuffer: Write + Send {
    /// Finish writing: flush and close any wrapped encoder, sync the
    /// backing storage, and return the bytes in readable form.
    fn done_writing(self: Box<Self>) -> Result<SealedBuffer>;
}

/// Create a block buffer per the configured spool target and compression.
pub fn new_buffer(
    buffer_to_disk: bool,
    temp_dir: &Path,
    compression: Compression,
) -> Result<Box<dyn BlockBuffer>> {
    let inner: Box<dyn BlockBuffer> = if buffer_to_disk {
        Box::new(DiskBuffer::create(temp_dir)?)
    } else {
        Box::new(MemoryBuffer::new())
    };

    Ok(match compression {
        Compression::None => inner,
        Compression::Gzip => Box::new(CompressedBuffer::gzip(inner)),
        Compression::Snappy => Box::new(CompressedBuffer::snappy(inner)),
    })
}

/// In-memory block buffer.
#[derive(Default)]
pub struct MemoryBuffer {
    buf: Vec<u8>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Write for MemoryBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BlockBuffer for MemoryBuffer {
    fn done_writing(self: Box<Self>) -> Result<SealedBuffer> {
        Ok(SealedBuffer::Memory(Cursor::new(self.buf)))
    }
}

/// Temp-file-backed block buffer.
pub struct DiskBuffer {
    file: tempfile::NamedTempFile,
}

impl DiskBuffer {
    /// Create a fresh temp file under `temp_dir`.
    pub fn create(temp_dir: &Path) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("capture-")
            .tempfile_in(temp_dir)?;
        debug!(path = %file.path().display(), "created disk buffer");
        Ok(Self { file })
    }
}

impl Write for DiskBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.file.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl BlockBuffer for DiskBuffer {
    fn done_writing(self: Box<Self>) -> Result<SealedBuffer> {
        self.file.as_file().sync_all()?;
        let (mut file, path) = self.file.into_parts();
        file.seek(SeekFrom::Start(0))?;
        Ok(SealedBuffer::Disk {
            file: tokio::fs::File::from_std(file),
            path,
        })
    }
}

/// A block buffer wrapped in a streaming compressor.
pub struct CompressedBuffer {
    encoder: Encoder,
}

enum Encoder {
    Gzip(GzEncoder<Box<dyn BlockBuffer>>),
    Snappy(FrameEncoder<Box<dyn BlockBuffer>>),
}

impl CompressedBuffer {
    pub fn gzip(inner: Box<dyn BlockBuffer>) -> Self {
        Self {
            encoder: Encoder::Gzip(GzEncoder::new(inner, flate2::Compression::default())),
        }
    }

    pub fn snappy(inner: Box<dyn BlockBuffer>) -> Self {
        Self {
            encoder: Encoder::Snappy(FrameEncoder::new(inner)),
        }
    }
}

impl Write for CompressedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match &mut self.encoder {
            Encoder::Gzip(w) => w.write(data),
            Encoder::Snappy(w) => w.write(data),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.encoder {
            Encoder::Gzip(w) => w.flush(),
            Encoder::Snappy(w) => w.flush(),
        }
    }
}

impl BlockBuffer for CompressedBuffer {
    fn done_writing(self: Box<Self>) -> Result<SealedBuffer> {
        // The encoder must emit its trailing bytes into the inner buffer
        // before that buffer is sealed.
        let inner = match self.encoder {
            Encoder::Gzip(w) => w.finish()?,
            Encoder::Snappy(mut w) => {
                w.flush()?;
                w.into_inner()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.error().to_string()))?
            }
        };
        inner.done_writing()
    }
}

/// A sealed, read-only block buffer.
///
/// Implements [`AsyncRead`] so stores can stream the committed bytes.
pub enum SealedBuffer {
    Memory(Cursor<Vec<u8>>),
    Disk {
        file: tokio::fs::File,
        path: TempPath,
    },
}

impl SealedBuffer {
    /// Release the backing storage: delete the temp file, or drop the
    /// in-memory bytes. Dropping a `SealedBuffer` has the same effect;
    /// this form surfaces deletion errors.
    pub fn remove(self) -> Result<()> {
        match self {
            SealedBuffer::Memory(_) => Ok(()),
            SealedBuffer::Disk { file, path } => {
                drop(file);
                path.close()?;
                Ok(())
            }
        }
    }
}

impl AsyncRead for SealedBuffer {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SealedBuffer::Memory(cursor) => Pin::new(cursor).poll_read(cx, buf),
            SealedBuffer::Disk { file, .. } => Pin::new(file).poll_read(cx, buf),
        }
    }
}
