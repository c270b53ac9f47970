//! # hauslink-adapter-storage-json
//!
//! Persistence gateway — overwrites the whole configuration document on
//! every mutation and reads it back once at process start.
//!
//! Writes go through a dedicated writer task so the engine's mutation path
//! never waits on the filesystem. A write failure is logged and dropped;
//! the next mutation rewrites the whole document anyway.
//!
//! ## Dependency rule
//! Depends on `hauslink-app` (for the [`ConfigStore`] port) and
//! `hauslink-domain`. Never imported by either.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use hauslink_app::ports::ConfigStore;
use hauslink_domain::config::ConfigDocument;

/// Errors from loading the configuration document.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// File read failure.
    #[error("failed to read configuration file")]
    Io(#[from] std::io::Error),
    /// JSON parse failure.
    #[error("failed to parse configuration file")]
    Parse(#[from] serde_json::Error),
}

/// Read the whole configuration document.
///
/// # Errors
///
/// Returns [`StorageError`] when the file is unreadable or not valid JSON.
pub async fn load(path: impl AsRef<Path>) -> Result<ConfigDocument, StorageError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// [`ConfigStore`] writing pretty-printed JSON through a writer task.
pub struct JsonConfigStore {
    queue: mpsc::UnboundedSender<ConfigDocument>,
}

impl JsonConfigStore {
    /// Spawn the writer task for `path` and return the store.
    #[must_use]
    pub fn spawn(path: PathBuf) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(path, rx));
        Self { queue }
    }
}

impl ConfigStore for JsonConfigStore {
    fn persist(&self, document: &ConfigDocument) {
        if self.queue.send(document.clone()).is_err() {
            tracing::warn!("configuration writer is gone, dropping write");
        }
    }
}

async fn write_loop(path: PathBuf, mut rx: mpsc::UnboundedReceiver<ConfigDocument>) {
    while let Some(document) = rx.recv().await {
        match serde_json::to_string_pretty(&document) {
            Ok(json) => {
                if let Err(err) = tokio::fs::write(&path, json).await {
                    tracing::error!(path = %path.display(), %err, "failed to save configuration");
                } else {
                    tracing::debug!(path = %path.display(), "configuration saved");
                }
            }
            Err(err) => tracing::error!(%err, "failed to serialize configuration"),
        }
    }
}
