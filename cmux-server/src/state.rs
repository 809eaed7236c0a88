//! Shared server state and the metadata write queue
//!
//! The registry, metadata store and notification store sit behind one
//! mutex; every command holds it for its whole effect. Metadata writes go
//! through a single FIFO writer task so writes addressed to an explicit
//! workspace never wait on the lock while still landing in submission order.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use cmux_protocol::CommandError;

use crate::config::AppConfig;
use crate::metadata::{MetadataOp, MetadataScope, MetadataStore};
use crate::notifications::NotificationStore;
use crate::registry::Registry;

/// Everything the dispatchers mutate
#[derive(Debug)]
pub struct ServerState {
    pub registry: Registry,
    pub metadata: MetadataStore,
    pub notifications: NotificationStore,
}

impl ServerState {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            registry: Registry::bootstrap(),
            metadata: MetadataStore::new(config.sidebar.max_log_entries),
            notifications: NotificationStore::new(),
        }
    }

    /// Apply a metadata write if its scope still exists
    pub fn apply_metadata(&mut self, scope: MetadataScope, op: MetadataOp) -> Result<(), CommandError> {
        if let MetadataScope::Workspace(id) = scope {
            if !self.registry.contains_workspace(id) {
                return Err(CommandError::not_found(format!("Workspace not found: {}", id)));
            }
        }
        self.metadata.apply(scope, op);
        Ok(())
    }

    /// Forget sidebars and notifications of workspaces that were closed
    pub fn prune_closed_workspaces(&mut self) {
        let registry = &self.registry;
        self.metadata.retain(|scope| match scope {
            MetadataScope::Global => true,
            MetadataScope::Workspace(id) => registry.contains_workspace(*id),
        });
        let dropped = self
            .notifications
            .retain_workspaces(|id| registry.contains_workspace(id));
        if dropped > 0 {
            debug!(dropped, "Dropped notifications of closed workspaces");
        }
    }
}

pub type SharedServerState = Arc<Mutex<ServerState>>;

enum MetadataJob {
    Apply {
        scope: MetadataScope,
        op: MetadataOp,
        ack: Option<oneshot::Sender<Result<(), CommandError>>>,
    },
    Barrier(oneshot::Sender<()>),
}

/// Handle to the metadata writer task
#[derive(Clone)]
pub struct MetadataWriter {
    tx: mpsc::UnboundedSender<MetadataJob>,
}

impl std::fmt::Debug for MetadataWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataWriter")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl MetadataWriter {
    /// Start the writer task; it runs until every handle is dropped
    pub fn spawn(state: SharedServerState) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<MetadataJob>();
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    MetadataJob::Apply { scope, op, ack } => {
                        let name = op.name();
                        let result = state.lock().await.apply_metadata(scope, op);
                        match ack {
                            Some(ack) => {
                                let _ = ack.send(result);
                            }
                            None => {
                                if let Err(e) = result {
                                    warn!(op = name, scope = %scope, "Dropped metadata write: {}", e);
                                }
                            }
                        }
                    }
                    MetadataJob::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Metadata writer stopped");
        });
        (Self { tx }, handle)
    }

    /// Queue a write without waiting for it to land
    pub fn enqueue(&self, scope: MetadataScope, op: MetadataOp) -> Result<(), CommandError> {
        self.tx
            .send(MetadataJob::Apply { scope, op, ack: None })
            .map_err(|_| CommandError::internal("Metadata writer is not running"))
    }

    /// Queue a write and wait until it has been applied
    pub async fn apply(&self, scope: MetadataScope, op: MetadataOp) -> Result<(), CommandError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(MetadataJob::Apply {
                scope,
                op,
                ack: Some(ack),
            })
            .map_err(|_| CommandError::internal("Metadata writer is not running"))?;
        done.await
            .map_err(|_| CommandError::internal("Metadata writer dropped the write"))?
    }

    /// Wait until every write queued before this call has been applied
    pub async fn barrier(&self) -> Result<(), CommandError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(MetadataJob::Barrier(tx))
            .map_err(|_| CommandError::internal("Metadata writer is not running"))?;
        rx.await
            .map_err(|_| CommandError::internal("Metadata writer stopped"))
    }
}
