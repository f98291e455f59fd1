//! Error types for the capture engine.
//!
//! The propagation policy mirrors the failure domains: per-message
//! problems (decode, format) are logged and recovered inside the fetch
//! loop, per-block problems (seal, store) are logged and the sweep
//! continues, and only structural problems (configuration, connection,
//! consumer binding) surface from [`crate::Capture::run`] as values of
//! this type.

use thiserror::Error;

/// Boxed error type used by caller-supplied decoders and resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// Invalid or incomplete configuration. Fatal before the loop starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed to connect to the NATS server.
    #[error("NATS connect error: {0}")]
    Connect(#[from] async_nats::ConnectError),

    /// Failed to bind the stream/consumer or query consumer info.
    #[error("JetStream error: {0}")]
    JetStream(String),

    /// A pull request against the consumer failed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// A buffer, formatter, or store failure that escaped the loop.
    #[error(transparent)]
    Block(#[from] jetvault_core::Error),

    /// I/O error outside the data plane (credentials, context files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = CaptureError::Config("stream name not set".to_string());
        assert_eq!(format!("{}", err), "configuration error: stream name not set");
    }

    #[test]
    fn test_core_error_is_transparent() {
        let core = jetvault_core::Error::Encode("bad row".to_string());
        let err: CaptureError = core.into();
        assert_eq!(format!("{}", err), "encode error: bad row");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CaptureError = io_err.into();
        assert!(format!("{}", err).contains("denied"));
    }
}
