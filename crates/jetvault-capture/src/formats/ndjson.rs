//! Newline-delimited JSON formatter.
//!
//! Each payload becomes exactly one `serde_json` document followed by a
//! newline; a committed block carries no other bytes.

use std::io::Write;
use std::marker::PhantomData;

use serde::Serialize;

use jetvault_core::{BlockBuffer, Error, FormattedWriter, Result, WriterFactory};

pub struct NdJsonWriter<P> {
    out: Box<dyn BlockBuffer>,
    _payload: PhantomData<fn(&P)>,
}

impl<P: Serialize> FormattedWriter<P> for NdJsonWriter<P> {
    fn write(&mut self, payload: &P) -> Result<u64> {
        serde_json::to_writer(&mut self.out, payload)
            .map_err(|e| Error::Encode(e.to_string()))?;
        self.out.write_all(b"\n")?;
        Ok(1)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.out.flush()?)
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn BlockBuffer>> {
        Ok(self.out)
    }
}

/// Factory producing one [`NdJsonWriter`] per block.
pub fn ndjson_writer<P: Serialize + 'static>() -> WriterFactory<P> {
    Box::new(|out| {
        Ok(Box::new(NdJsonWriter {
            out,
            _payload: PhantomData,
        }))
    })
}

#[cfg(test)]
mod tests {
    use serde::Serialize;
    use tokio::io::AsyncReadExt;

    use jetvault_core::MemoryBuffer;

    use super::*;

    #[derive(Serialize)]
    struct TestPayload {
        #[serde(rename = "A")]
        a: String,
        #[serde(rename = "B")]
        b: i64,
        #[serde(rename = "C")]
        c: bool,
    }

    fn test_payload() -> TestPayload {
        TestPayload {
            a: "hello".to_string(),
            b: 1337,
            c: true,
        }
    }

    async fn run_writer<P: Serialize + 'static>(payloads: &[P]) -> Vec<u8> {
        let factory = ndjson_writer::<P>();
        let mut writer = factory(Box::new(MemoryBuffer::new())).unwrap();
        for payload in payloads {
            assert_eq!(writer.write(payload).unwrap(), 1);
        }
        let mut sealed = writer.finish().unwrap().done_writing().unwrap();
        let mut out = Vec::new();
        sealed.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_empty_block_has_no_bytes() {
        let out = run_writer::<TestPayload>(&[]).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_single_document() {
        let out = run_writer(&[test_payload()]).await;
        assert_eq!(out, b"{\"A\":\"hello\",\"B\":1337,\"C\":true}\n");
    }

    #[tokio::test]
    async fn test_repeated_documents_no_trailing_bytes() {
        let payloads = vec![test_payload(), test_payload(), test_payload()];
        let out = run_writer(&payloads).await;
        let expected = "{\"A\":\"hello\",\"B\":1337,\"C\":true}\n".repeat(3);
        assert_eq!(out, expected.as_bytes());
    }
}
