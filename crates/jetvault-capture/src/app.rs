//! CLI skeleton for capture applications.
//!
//! Binaries that embed the engine share the same flag surface: the
//! stream/consumer binding, NATS connectivity (flags or `NATS_URL` /
//! `NATS_CREDS` / `NATS_CONTEXT` env vars), buffering and compression
//! tuning, and logging setup. A binary flattens [`CaptureArgs`] into its
//! own parser, adds its app-specific flags, and calls
//! [`CaptureArgs::apply`] to finish the options struct.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use jetvault_core::Compression;

use crate::error::Result;
use crate::nats::{NatsConfig, DEFAULT_NATS_URL};
use crate::options::CaptureOptions;

/// Common flags for capture binaries.
#[derive(Debug, Parser)]
pub struct CaptureArgs {
    /// NATS server URL.
    #[arg(long, env = "NATS_URL", default_value = DEFAULT_NATS_URL)]
    pub nats_url: String,

    /// Path to a NATS user credentials file.
    #[arg(long, env = "NATS_CREDS")]
    pub nats_creds: Option<PathBuf>,

    /// Name of a NATS CLI context to connect with.
    #[arg(long, env = "NATS_CONTEXT")]
    pub nats_context: Option<String>,

    /// Stream to capture from.
    #[arg(short = 's', long = "stream")]
    pub stream_name: String,

    /// Durable pull consumer to bind. Must already exist with the
    /// explicit ack policy.
    #[arg(short = 'c', long = "consumer")]
    pub consumer_name: String,

    /// Block window size in seconds.
    #[arg(long, default_value_t = 900)]
    pub max_age_secs: u64,

    /// Per-block message-count cutoff; 0 means unlimited.
    #[arg(long, default_value_t = 0)]
    pub max_messages: usize,

    /// Buffer block data to disk instead of memory.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    pub buffer_to_disk: bool,

    /// Temporary directory for disk buffers.
    #[arg(long)]
    pub tmp_dir: Option<PathBuf>,

    /// Compression mode: "none", "gzip", or "snappy".
    #[arg(long, default_value = "none")]
    pub compression: String,

    /// Emit logs as JSON.
    #[arg(long)]
    pub log_json: bool,

    /// Log level filter (e.g. "info", "jetvault_capture=debug").
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl CaptureArgs {
    /// Connection settings assembled from the NATS flags.
    pub fn nats_config(&self) -> NatsConfig {
        NatsConfig {
            url: self.nats_url.clone(),
            credentials: self.nats_creds.clone(),
            context: self.nats_context.clone(),
        }
    }

    /// Initialize global tracing per the logging flags.
    pub fn init_tracing(&self) {
        init_tracing(self.log_json, &self.log_level);
    }

    /// Copy binding and tuning flags onto a partially built options
    /// struct (decoder, formatter, and store stay the caller's choice).
    pub fn apply<P, K>(&self, mut options: CaptureOptions<P, K>) -> Result<CaptureOptions<P, K>> {
        options.stream_name = self.stream_name.clone();
        options.consumer_name = self.consumer_name.clone();
        options.nats = self.nats_config();
        options.compression = Compression::from_str_config(&self.compression)?;
        options.buffer_to_disk = self.buffer_to_disk;
        options.max_age = Duration::from_secs(self.max_age_secs);
        options.max_messages = self.max_messages;
        if let Some(tmp_dir) = &self.tmp_dir {
            options.temp_dir = tmp_dir.clone();
        }
        Ok(options)
    }
}

/// Initialize the global tracing subscriber.
pub fn init_tracing(json: bool, level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_args_and_defaults() {
        let args =
            CaptureArgs::try_parse_from(["app", "--stream", "STREAM1", "--consumer", "archiver"])
                .unwrap();
        assert_eq!(args.stream_name, "STREAM1");
        assert_eq!(args.consumer_name, "archiver");
        assert_eq!(args.nats_url, DEFAULT_NATS_URL);
        assert_eq!(args.max_age_secs, 900);
        assert_eq!(args.max_messages, 0);
        assert!(args.buffer_to_disk);
        assert_eq!(args.compression, "none");
        assert!(!args.log_json);
    }

    #[test]
    fn test_short_flags() {
        let args = CaptureArgs::try_parse_from(["app", "-s", "S", "-c", "C"]).unwrap();
        assert_eq!(args.stream_name, "S");
        assert_eq!(args.consumer_name, "C");
    }

    #[test]
    fn test_missing_stream_is_an_error() {
        assert!(CaptureArgs::try_parse_from(["app", "--consumer", "c"]).is_err());
    }

    #[test]
    fn test_buffer_to_disk_takes_a_value() {
        let args =
            CaptureArgs::try_parse_from(["app", "-s", "S", "-c", "C", "--buffer-to-disk", "false"])
                .unwrap();
        assert!(!args.buffer_to_disk);
    }

    #[test]
    fn test_nats_config_mapping() {
        let args = CaptureArgs::try_parse_from([
            "app",
            "-s",
            "S",
            "-c",
            "C",
            "--nats-url",
            "nats://broker:4222",
            "--nats-creds",
            "/etc/nats/user.creds",
        ])
        .unwrap();
        let config = args.nats_config();
        assert_eq!(config.url, "nats://broker:4222");
        assert_eq!(config.credentials, Some(PathBuf::from("/etc/nats/user.creds")));
        assert!(config.context.is_none());
    }
}
