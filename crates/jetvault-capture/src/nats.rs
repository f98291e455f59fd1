//! NATS connection helpers.
//!
//! The engine binds to an already-existing stream and durable consumer;
//! it never creates either. Connections resolve, in order of precedence:
//! a named NATS CLI context (`$XDG_CONFIG_HOME/nats/context/<name>.json`,
//! falling back to `~/.config`), then an explicit server URL plus an
//! optional credentials file.
//!
//! Connections built here install an event callback that logs client
//! errors and connectivity changes. A caller-supplied client keeps
//! whatever callbacks it already has; the engine never replaces them.

use std::path::{Path, PathBuf};

use async_nats::{Client, ConnectOptions, Event};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{CaptureError, Result};

pub const DEFAULT_NATS_URL: &str = "nats://127.0.0.1:4222";

/// Connection settings for the capture engine.
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// Server URL, e.g. `nats://127.0.0.1:4222`.
    pub url: String,
    /// Path to a `.creds` user credentials file.
    pub credentials: Option<PathBuf>,
    /// Name of a NATS CLI context to resolve URL and credentials from.
    pub context: Option<String>,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_NATS_URL.to_string(),
            credentials: None,
            context: None,
        }
    }
}

impl NatsConfig {
    /// Connect to the resolved server, wiring a logging event callback.
    pub async fn connect(&self) -> Result<Client> {
        let mut url = self.url.clone();
        let mut credentials = self.credentials.clone();

        if let Some(name) = &self.context {
            let context = NatsContext::load(name)?;
            if !context.url.is_empty() {
                url = context.url;
            }
            if credentials.is_none() && !context.creds.is_empty() {
                credentials = Some(PathBuf::from(context.creds));
            }
        }

        let mut options = ConnectOptions::new().event_callback(|event| async move {
            match event {
                Event::Disconnected => warn!("NATS connection lost"),
                Event::Connected => info!("NATS connection (re)established"),
                other => info!(event = ?other, "NATS client event"),
            }
        });

        if let Some(path) = credentials {
            let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
                CaptureError::Config(format!(
                    "failed to read credentials {}: {}",
                    path.display(),
                    e
                ))
            })?;
            options = options.credentials(&contents).map_err(|e| {
                CaptureError::Config(format!(
                    "invalid credentials {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }

        Ok(options.connect(url).await?)
    }
}

/// Subset of a NATS CLI context file the engine understands.
#[derive(Debug, Default, Deserialize)]
struct NatsContext {
    #[serde(default)]
    url: String,
    #[serde(default)]
    creds: String,
}

impl NatsContext {
    fn load(name: &str) -> Result<Self> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .ok_or_else(|| {
                CaptureError::Config("cannot locate the NATS context directory".to_string())
            })?;
        let path = base
            .join("nats")
            .join("context")
            .join(format!("{}.json", name));
        Self::load_from(&path)
    }

    fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CaptureError::Config(format!("failed to read NATS context {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            CaptureError::Config(format!("invalid NATS context {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = NatsConfig::default();
        assert_eq!(config.url, DEFAULT_NATS_URL);
        assert!(config.credentials.is_none());
        assert!(config.context.is_none());
    }

    #[test]
    fn test_context_file_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prod.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"url": "nats://broker:4222", "creds": "/etc/nats/user.creds"}}"#
        )
        .unwrap();

        let context = NatsContext::load_from(&path).unwrap();
        assert_eq!(context.url, "nats://broker:4222");
        assert_eq!(context.creds, "/etc/nats/user.creds");
    }

    #[test]
    fn test_context_file_with_extra_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.json");
        std::fs::write(
            &path,
            r#"{"description": "prod", "url": "nats://x:4222", "token": ""}"#,
        )
        .unwrap();

        let context = NatsContext::load_from(&path).unwrap();
        assert_eq!(context.url, "nats://x:4222");
        assert!(context.creds.is_empty());
    }

    #[test]
    fn test_missing_context_file_is_config_error() {
        let err = NatsContext::load_from(Path::new("/nope/missing.json")).unwrap_err();
        assert!(matches!(err, CaptureError::Config(_)));
    }

    #[test]
    fn test_malformed_context_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json at all").unwrap();
        let err = NatsContext::load_from(&path).unwrap_err();
        assert!(matches!(err, CaptureError::Config(_)));
    }
}
