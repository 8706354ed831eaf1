//! Batched audit trail.
//!
//! Services hand entries to an [`ActivityLogger`] after their transaction
//! commits. A background task buffers them and writes a batch once
//! `batch_size` entries are queued or `flush_interval` elapses. Writing is
//! best-effort: a failed batch is logged and dropped, never retried, and
//! never affects the operation that produced it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use bizbooks_core::UserId;

use crate::config::ActivityLogConfig;
use crate::store::{LedgerTx, Store};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub actor: Option<UserId>,
    /// Dotted verb, e.g. `invoice.created`.
    pub action: String,
    pub entity_type: String,
    /// Document number or id of the affected row.
    pub entity_ref: String,
    pub details: JsonValue,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        actor: Option<UserId>,
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_ref: impl Into<String>,
    ) -> Self {
        Self {
            actor,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_ref: entity_ref.into(),
            details: JsonValue::Null,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = details;
        self
    }
}

enum Command {
    Record(ActivityEntry),
    Flush(oneshot::Sender<()>),
}

/// Cheap-to-clone handle onto the background writer.
#[derive(Clone)]
pub struct ActivityLogger {
    sender: Option<mpsc::UnboundedSender<Command>>,
}

impl ActivityLogger {
    /// Logger that discards everything.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Start the background writer. The task ends once every logger clone
    /// has been dropped, after writing whatever is still buffered.
    pub fn spawn<S: Store>(store: Arc<S>, config: ActivityLogConfig) -> (Self, Option<JoinHandle<()>>) {
        if !config.enabled {
            return (Self::disabled(), None);
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(store, config, receiver));
        (
            Self {
                sender: Some(sender),
            },
            Some(handle),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queue an entry. Never blocks and never fails the caller.
    pub fn record(&self, entry: ActivityEntry) {
        if let Some(sender) = &self.sender {
            if sender.send(Command::Record(entry)).is_err() {
                debug!("activity writer stopped; entry dropped");
            }
        }
    }

    /// Write everything queued so far and wait for the batch to finish.
    pub async fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if sender.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

async fn run_writer<S: Store>(
    store: Arc<S>,
    config: ActivityLogConfig,
    mut receiver: mpsc::UnboundedReceiver<Command>,
) {
    let mut buffer: Vec<ActivityEntry> = Vec::with_capacity(config.batch_size);
    let mut ticker = tokio::time::interval(config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = receiver.recv() => match command {
                Some(Command::Record(entry)) => {
                    buffer.push(entry);
                    if buffer.len() >= config.batch_size {
                        write_batch(store.as_ref(), &mut buffer).await;
                    }
                }
                Some(Command::Flush(done)) => {
                    write_batch(store.as_ref(), &mut buffer).await;
                    let _ = done.send(());
                }
                None => {
                    write_batch(store.as_ref(), &mut buffer).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                write_batch(store.as_ref(), &mut buffer).await;
            }
        }
    }
}

async fn write_batch<S: Store>(store: &S, buffer: &mut Vec<ActivityEntry>) {
    if buffer.is_empty() {
        return;
    }
    let batch = std::mem::take(buffer);
    let result = async {
        let mut tx = store.begin().await?;
        tx.insert_activity(&batch).await?;
        tx.commit().await
    }
    .await;

    match result {
        Ok(()) => debug!(entries = batch.len(), "activity batch written"),
        Err(e) => warn!(error = %e, entries = batch.len(), "activity batch dropped"),
    }
}
