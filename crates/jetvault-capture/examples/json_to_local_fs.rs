//! Decode JSON messages into typed payloads and write gzip-compressed
//! CSV files grouped by region.
//!
//! Messages are expected to look like:
//!
//! ```json
//! {"first_name": "Ada", "last_name": "Lovelace", "region": "eu-north"}
//! ```
//!
//! Each region gets its own directory under `./backup`, with one CSV
//! file per hourly window.
//!
//! ```bash
//! cargo run --example json_to_local_fs -- \
//!     --stream PEOPLE --consumer backup --compression gzip
//! ```

use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use jetvault_capture::app::CaptureArgs;
use jetvault_capture::formats::csv_writer;
use jetvault_capture::stores::LocalFsStore;
use jetvault_capture::{BoxError, CaptureOptions, ShutdownHandle};

#[derive(Debug, Deserialize)]
struct Person {
    first_name: String,
    last_name: String,
    region: String,
}

#[derive(Debug, Parser)]
struct Cli {
    #[command(flatten)]
    capture: CaptureArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.capture.init_tracing();

    let decoder = |message: &async_nats::jetstream::Message| -> Result<(Person, String), BoxError> {
        let person: Person = serde_json::from_slice(&message.payload)?;
        let region = person.region.clone();
        Ok((person, region))
    };

    let writer_factory = csv_writer(
        vec![
            "first_name".to_string(),
            "last_name".to_string(),
            "region".to_string(),
        ],
        |person: &Person| {
            Ok(vec![vec![
                person.first_name.clone(),
                person.last_name.clone(),
                person.region.clone(),
            ]])
        },
    );

    let store = LocalFsStore::new(|region: &String| Ok(std::path::Path::new("backup").join(region)));

    let options = CaptureOptions::new(
        cli.capture.stream_name.clone(),
        cli.capture.consumer_name.clone(),
        decoder,
        writer_factory,
        store,
    );

    // Flags fill in the binding and tuning (including compression);
    // the format-specific pieces stay in code.
    let options = cli
        .capture
        .apply(options)?
        .with_suffix("csv")
        .with_max_age(Duration::from_secs(3600));

    let shutdown = ShutdownHandle::new();
    shutdown.install_ctrl_c();

    let mut capture = options.build()?;
    capture.run(shutdown.subscribe()).await?;
    Ok(())
}
