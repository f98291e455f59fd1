//! jetvault — capture a JetStream stream into newline-delimited JSON
//! files on the local filesystem.
//!
//! Each captured message is archived verbatim (subject, headers,
//! payload, broker metadata) as one JSON document per line, grouped
//! into time-windowed files. Grouping by subject is optional; by
//! default all subjects share one directory tree.
//!
//! ```bash
//! jetvault --stream ORDERS --consumer archiver --output ./captured \
//!     --compression gzip --group-by-subject
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use jetvault_capture::app::CaptureArgs;
use jetvault_capture::formats::ndjson_writer;
use jetvault_capture::stores::LocalFsStore;
use jetvault_capture::{
    raw_message_decoder, subject_dest_key, CaptureOptions, CapturedMessage, ShutdownHandle,
};

#[derive(Debug, Parser)]
#[command(
    name = "jetvault",
    about = "Capture a JetStream stream into newline-delimited JSON files",
    version
)]
struct Cli {
    #[command(flatten)]
    capture: CaptureArgs,

    /// Local output directory.
    #[arg(long)]
    output: PathBuf,

    /// Group output files by message subject.
    #[arg(long)]
    group_by_subject: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.capture.init_tracing();

    let store = if cli.group_by_subject {
        let output = cli.output.clone();
        LocalFsStore::new(move |subject: &String| Ok(output.join(subject)))
    } else {
        LocalFsStore::single_dir(cli.output.clone())
    };

    let options = CaptureOptions::new(
        cli.capture.stream_name.clone(),
        cli.capture.consumer_name.clone(),
        raw_message_decoder(subject_dest_key),
        ndjson_writer::<CapturedMessage>(),
        store,
    )
    .with_suffix("json");

    let options = cli
        .capture
        .apply(options)
        .context("invalid capture options")?;

    let shutdown = ShutdownHandle::new();
    shutdown.install_ctrl_c();

    let mut capture = options.build()?;
    let result = capture.run(shutdown.subscribe()).await;

    info!(
        fetched = capture.fetched(),
        acked = capture.acked(),
        "capture finished"
    );

    result.context("capture run failed")
}
