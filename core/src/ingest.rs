//! Debounced ingestion of `config-changed` notifications.
//!
//! A [`WatchSession`] owns one background task that runs the
//! `Idle -> Accumulating -> Flushing -> Idle` cycle:
//!
//! ```text
//! notification ─► buffer (deadline reset) ─► quiet for `debounce` ─► flush
//!                                                                  │
//!      remove deleted entries ◄─ invalidate cache domains ◄─ plan ◄┘
//!                 │
//!                 └─► reload active scope (awaited) ─► IngestEvent ─► Idle
//! ```
//!
//! Any number of notifications inside one window collapse into one flush.
//! Stopping or dropping the session cancels a pending window, so nothing
//! fires after teardown. A reload that is already running is not cancelled.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, Result};
use crate::source::{CacheDomains, SourceClassifier};

/// Name of the host event channel that carries [`PendingChange`] payloads.
pub const CONFIG_CHANGED_EVENT: &str = "config-changed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Create,
    Modify,
    Delete,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Create => "create",
            ChangeType::Modify => "modify",
            ChangeType::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw change notification, as emitted on [`CONFIG_CHANGED_EVENT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    pub path: String,
    pub change_type: ChangeType,
}

impl PendingChange {
    pub fn new(path: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            path: path.into(),
            change_type,
        }
    }
}

/// What one flush does, computed from the buffered notifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushPlan {
    /// Cache domains to invalidate.
    pub domains: CacheDomains,
    /// Deleted paths in arrival order, without repeats.
    pub deleted_paths: Vec<String>,
    /// Notifications collapsed into this flush.
    pub change_count: usize,
}

/// Partition a batch of notifications into cache domains and deletions.
pub fn plan_flush(classifier: &SourceClassifier, changes: &[PendingChange]) -> FlushPlan {
    let mut plan = FlushPlan {
        change_count: changes.len(),
        ..FlushPlan::default()
    };
    for change in changes {
        plan.domains = plan.domains.union(classifier.domains_for(&change.path));
        if change.change_type == ChangeType::Delete && !plan.deleted_paths.contains(&change.path)
        {
            plan.deleted_paths.push(change.path.clone());
        }
    }
    plan
}

/// The state a flush is applied to.
///
/// Removal and invalidation are in-memory and synchronous; the reload is the
/// only call that suspends, and the session waits for it before it accepts
/// the next flush. Hosts publish removals together with the reload result so
/// a failed reload leaves nothing half applied.
#[async_trait]
pub trait ChangeHost: Send + Sync {
    /// Mark live entries declared in any of `paths` for removal.
    fn remove_deleted(&self, paths: &[String]);

    /// Drop cached resolution results for `domains`.
    fn invalidate(&self, domains: CacheDomains);

    /// Re-read the currently active scope.
    async fn reload_active_scope(&self) -> Result<()>;
}

/// Outcome of a flush, delivered on the session's event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    Flushed(FlushPlan),
    /// Reload rejected; previously loaded state is left as it was.
    ReloadFailed { plan: FlushPlan, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Accumulating,
    Flushing,
}

/// Cloneable handle for producers of change notifications.
#[derive(Debug, Clone)]
pub struct ChangeSender {
    tx: mpsc::UnboundedSender<PendingChange>,
}

impl ChangeSender {
    pub fn send(&self, change: PendingChange) -> Result<()> {
        self.tx.send(change).map_err(|_| CoreError::SessionClosed)
    }
}

pub struct WatchSession {
    sender: ChangeSender,
    events: Mutex<mpsc::UnboundedReceiver<IngestEvent>>,
    phase: watch::Receiver<SessionPhase>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WatchSession {
    /// Start a session on the current tokio runtime.
    pub fn spawn<H>(host: Arc<H>, classifier: SourceClassifier, debounce: Duration) -> Self
    where
        H: ChangeHost + ?Sized + 'static,
    {
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Idle);
        let cancel = CancellationToken::new();

        let worker = SessionWorker {
            host,
            classifier,
            debounce,
            changes: change_rx,
            events: event_tx,
            phase: phase_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());

        Self {
            sender: ChangeSender { tx: change_tx },
            events: Mutex::new(event_rx),
            phase: phase_rx,
            cancel,
            task: Some(task),
        }
    }

    pub fn notify(&self, change: PendingChange) -> Result<()> {
        self.sender.send(change)
    }

    pub fn sender(&self) -> ChangeSender {
        self.sender.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Next flush outcome. `None` once the session has stopped.
    pub async fn recv_event(&self) -> Option<IngestEvent> {
        self.events.lock().await.recv().await
    }

    /// Cancel any pending window and wait for the worker to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            tracing::error!("change ingestion task failed: {err}");
        }
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct SessionWorker<H: ?Sized> {
    host: Arc<H>,
    classifier: SourceClassifier,
    debounce: Duration,
    changes: mpsc::UnboundedReceiver<PendingChange>,
    events: mpsc::UnboundedSender<IngestEvent>,
    phase: watch::Sender<SessionPhase>,
    cancel: CancellationToken,
}

impl<H: ChangeHost + ?Sized> SessionWorker<H> {
    async fn run(mut self) {
        let mut pending = Vec::new();

        loop {
            let first = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                change = self.changes.recv() => match change {
                    Some(change) => change,
                    None => break,
                },
            };
            pending.push(first);
            self.phase.send_replace(SessionPhase::Accumulating);

            let mut deadline = Instant::now() + self.debounce;
            let mut closed = false;
            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        tracing::debug!(discarded = pending.len(), "change ingestion cancelled");
                        self.phase.send_replace(SessionPhase::Idle);
                        return;
                    }
                    change = self.changes.recv() => match change {
                        Some(change) => {
                            pending.push(change);
                            deadline = Instant::now() + self.debounce;
                        }
                        None => {
                            closed = true;
                            break;
                        }
                    },
                    _ = tokio::time::sleep_until(deadline) => break,
                }
            }

            self.phase.send_replace(SessionPhase::Flushing);
            let plan = plan_flush(&self.classifier, &pending);
            pending.clear();
            let event = flush(&*self.host, plan).await;
            let _ = self.events.send(event);
            self.phase.send_replace(SessionPhase::Idle);

            if closed {
                break;
            }
        }
    }
}

/// Apply one plan to `host`: deletes, then invalidation, then the reload.
async fn flush<H: ChangeHost + ?Sized>(host: &H, plan: FlushPlan) -> IngestEvent {
    if !plan.deleted_paths.is_empty() {
        host.remove_deleted(&plan.deleted_paths);
    }
    if !plan.domains.is_empty() {
        host.invalidate(plan.domains);
    }

    match host.reload_active_scope().await {
        Ok(()) => {
            tracing::info!(
                changes = plan.change_count,
                deleted = plan.deleted_paths.len(),
                user = plan.domains.user,
                project = plan.domains.project,
                "config changes flushed"
            );
            IngestEvent::Flushed(plan)
        }
        Err(err) => {
            tracing::warn!(
                category = err.category().as_str(),
                "reload after config change failed, keeping previous state: {err}"
            );
            IngestEvent::ReloadFailed {
                plan,
                error: err.to_string(),
            }
        }
    }
}
