//! The decoder contract and raw-message pass-through decoding.
//!
//! A decoder maps one delivered JetStream message to a decoded payload
//! plus the destination key that routes it to a block. The engine calls
//! decoders from a single task (never concurrently) and runs them under
//! panic recovery: a hostile or unexpected payload costs that one
//! message, never the loop.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use async_nats::jetstream::Message;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::BoxError;

/// Maps a raw JetStream message to `(payload, destination key)`.
///
/// Implemented for any matching closure, so a plain `fn` or a capturing
/// closure works directly as a decoder.
pub trait MessageDecoder<P, K>: Send + Sync {
    fn decode(&self, message: &Message) -> Result<(P, K), BoxError>;
}

impl<P, K, F> MessageDecoder<P, K> for F
where
    F: Fn(&Message) -> Result<(P, K), BoxError> + Send + Sync,
{
    fn decode(&self, message: &Message) -> Result<(P, K), BoxError> {
        self(message)
    }
}

/// Run a decoder with panic containment.
pub(crate) fn safe_decode<P, K>(
    decoder: &dyn MessageDecoder<P, K>,
    message: &Message,
) -> Result<(P, K), BoxError> {
    recover_panic(|| decoder.decode(message))
}

/// Convert a panic in `f` into an error carrying the panic message.
fn recover_panic<T>(f: impl FnOnce() -> Result<T, BoxError>) -> Result<T, BoxError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(format!("decoder panicked: {}", reason).into())
        }
    }
}

/// Broker metadata captured alongside a pass-through message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedMetadata {
    pub stream: String,
    pub consumer: String,
    pub stream_sequence: u64,
    pub consumer_sequence: u64,
    pub delivered: i64,
    pub pending: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub published: OffsetDateTime,
}

/// A serializable snapshot of a delivered message, for archiving streams
/// without interpreting their payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedMessage {
    pub subject: String,
    pub reply: Option<String>,
    pub headers: BTreeMap<String, Vec<String>>,
    pub payload: Vec<u8>,
    pub metadata: CapturedMetadata,
}

/// Build a decoder that snapshots each raw message into a
/// [`CapturedMessage`], routing by `resolve_key`.
pub fn raw_message_decoder<K, F>(resolve_key: F) -> impl MessageDecoder<CapturedMessage, K>
where
    F: Fn(&Message) -> K + Send + Sync,
{
    move |message: &Message| -> Result<(CapturedMessage, K), BoxError> {
        let key = resolve_key(message);
        let info = message.info()?;

        let mut headers = BTreeMap::new();
        if let Some(map) = &message.headers {
            for (name, values) in map.iter() {
                headers.insert(
                    name.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                );
            }
        }

        let captured = CapturedMessage {
            subject: message.subject.to_string(),
            reply: message.reply.as_ref().map(|r| r.to_string()),
            headers,
            payload: message.payload.to_vec(),
            metadata: CapturedMetadata {
                stream: info.stream.to_string(),
                consumer: info.consumer.to_string(),
                stream_sequence: info.stream_sequence,
                consumer_sequence: info.consumer_sequence,
                delivered: info.delivered,
                pending: info.pending,
                published: info.published,
            },
        };

        Ok((captured, key))
    }
}

/// Destination-key resolver that routes by message subject.
pub fn subject_dest_key(message: &Message) -> String {
    message.subject.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Panic recovery
    // ---------------------------------------------------------------

    #[test]
    fn test_recover_panic_passes_through_ok() {
        let result = recover_panic(|| Ok(42u32));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_recover_panic_passes_through_err() {
        let result: Result<(), BoxError> = recover_panic(|| Err("decode failed".into()));
        assert_eq!(result.unwrap_err().to_string(), "decode failed");
    }

    #[test]
    fn test_recover_panic_str_payload() {
        let result: Result<(), BoxError> = recover_panic(|| panic!("no bueno!"));
        let message = result.unwrap_err().to_string();
        assert!(message.contains("decoder panicked"));
        assert!(message.contains("no bueno!"));
    }

    #[test]
    fn test_recover_panic_string_payload() {
        let bad_order = 200_006;
        let result: Result<(), BoxError> =
            recover_panic(|| panic!("rejecting order {}", bad_order));
        assert!(result.unwrap_err().to_string().contains("200006"));
    }

    // ---------------------------------------------------------------
    // CapturedMessage serialization
    // ---------------------------------------------------------------

    fn sample_captured() -> CapturedMessage {
        CapturedMessage {
            subject: "orders.acme.1".to_string(),
            reply: Some("$JS.ACK.STREAM1.durable.1.2.3.4.5".to_string()),
            headers: BTreeMap::from([(
                "Nats-Msg-Id".to_string(),
                vec!["abc-123".to_string()],
            )]),
            payload: br#"{"amount": 99.99}"#.to_vec(),
            metadata: CapturedMetadata {
                stream: "STREAM1".to_string(),
                consumer: "archiver".to_string(),
                stream_sequence: 42,
                consumer_sequence: 42,
                delivered: 1,
                pending: 0,
                published: OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
            },
        }
    }

    #[test]
    fn test_captured_message_json_round_trip() {
        let captured = sample_captured();
        let json = serde_json::to_string(&captured).unwrap();
        let back: CapturedMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.subject, captured.subject);
        assert_eq!(back.payload, captured.payload);
        assert_eq!(back.metadata.stream_sequence, 42);
        assert_eq!(back.metadata.published, captured.metadata.published);
    }

    #[test]
    fn test_captured_message_timestamp_is_rfc3339() {
        let json = serde_json::to_string(&sample_captured()).unwrap();
        assert!(json.contains("2023-11-14T22:13:20Z"));
    }
}
