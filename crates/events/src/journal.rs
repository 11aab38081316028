//! Append-only JSON-lines journal of job events.
//!
//! [`EventJournal`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and appends every job lifecycle event to a file, one JSON object per
//! line. `QueueChanged` is a re-render signal and is not journaled. The
//! task shuts down when the bus is dropped.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

use crate::bus::JobEvent;

/// Errors from the event journal.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("Failed to open journal {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write journal entry: {0}")]
    Write(#[from] std::io::Error),

    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Background service that appends job events to a file.
pub struct EventJournal {
    path: PathBuf,
    file: File,
}

impl EventJournal {
    /// Open (or create) the journal file in append mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| JournalError::Open {
                    path: path.clone(),
                    source,
                })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| JournalError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the journal loop.
    ///
    /// Consumes events from `receiver` until the channel is closed (i.e. the
    /// [`EventBus`](crate::bus::EventBus) is dropped). Write failures are
    /// logged and do not stop the loop.
    pub async fn run(mut self, mut receiver: broadcast::Receiver<JobEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = self.append(&event).await {
                        tracing::error!(
                            error = %e,
                            event_type = event.event_type(),
                            path = %self.path.display(),
                            "Failed to journal event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event journal lagged, some events were not recorded");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, journal shutting down");
                    break;
                }
            }
        }
        if let Err(e) = self.file.flush().await {
            tracing::error!(error = %e, "Failed to flush event journal");
        }
    }

    /// Append one event as a JSON line. `QueueChanged` is skipped.
    pub async fn append(&mut self, event: &JobEvent) -> Result<(), JournalError> {
        if event.job().is_none() {
            return Ok(());
        }
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.file.write_all(&line).await?;
        Ok(())
    }
}
