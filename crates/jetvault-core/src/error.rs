//! Error types shared by the jetvault data plane.
//!
//! Everything that touches block bytes (buffers, formatters, stores)
//! returns `Result<T>` aliased over this crate's [`Error`], so `?`
//! propagation works across buffer, formatter, and store boundaries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from a buffer, temp file, or local filesystem store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown compression mode name.
    #[error("unknown compression type: '{0}'")]
    InvalidCompression(String),

    /// A formatter failed to encode a payload.
    #[error("encode error: {0}")]
    Encode(String),

    /// A store failed to commit a block.
    #[error("store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(format!("{}", err).contains("missing"));
    }

    #[test]
    fn test_invalid_compression_display() {
        let err = Error::InvalidCompression("lzma".to_string());
        assert_eq!(format!("{}", err), "unknown compression type: 'lzma'");
    }

    #[test]
    fn test_question_mark_propagation() {
        fn inner() -> Result<()> {
            Err(Error::Encode("bad row".to_string()))?;
            Ok(())
        }
        assert!(inner().is_err());
    }

    #[test]
    fn test_io_error_has_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "inner");
        let err = Error::Io(io_err);
        assert!(std::error::Error::source(&err).is_some());
    }
}
