//! Reference formatter implementations.

mod csv;
mod ndjson;

pub use self::csv::{csv_writer, CsvWriter};
pub use self::ndjson::{ndjson_writer, NdJsonWriter};
