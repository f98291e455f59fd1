//! CSV formatter.
//!
//! Callers supply the header row and a `flatten` function turning one
//! payload into zero or more CSV rows. The header is written when the
//! block opens, so even an otherwise empty block commits with a header.

use std::sync::Arc;

use jetvault_core::{BlockBuffer, Error, FormattedWriter, Result, WriterFactory};

use crate::error::BoxError;

type FlattenFn<P> = Arc<dyn Fn(&P) -> std::result::Result<Vec<Vec<String>>, BoxError> + Send + Sync>;

pub struct CsvWriter<P> {
    writer: csv::Writer<Box<dyn BlockBuffer>>,
    flatten: FlattenFn<P>,
}

impl<P> FormattedWriter<P> for CsvWriter<P> {
    fn write(&mut self, payload: &P) -> Result<u64> {
        let rows = (self.flatten)(payload).map_err(|e| Error::Encode(e.to_string()))?;
        let count = rows.len() as u64;
        for row in rows {
            self.writer
                .write_record(&row)
                .map_err(|e| Error::Encode(e.to_string()))?;
        }
        Ok(count)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn BlockBuffer>> {
        self.writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}

/// Factory producing one [`CsvWriter`] per block, writing `header`
/// first (skipped when empty).
pub fn csv_writer<P, F>(header: Vec<String>, flatten: F) -> WriterFactory<P>
where
    P: 'static,
    F: Fn(&P) -> std::result::Result<Vec<Vec<String>>, BoxError> + Send + Sync + 'static,
{
    let flatten: FlattenFn<P> = Arc::new(flatten);
    Box::new(move |out| {
        let mut writer = csv::Writer::from_writer(out);
        if !header.is_empty() {
            writer
                .write_record(&header)
                .map_err(|e| Error::Encode(e.to_string()))?;
        }
        Ok(Box::new(CsvWriter {
            writer,
            flatten: flatten.clone(),
        }))
    })
}
