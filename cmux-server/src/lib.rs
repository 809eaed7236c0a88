//! cmux control socket server
//!
//! Accepts local connections, gates them, and serves the v1 text and v2
//! JSON protocols against a shared entity registry and sidebar store.

pub mod access;
pub mod config;
pub mod connections;
pub mod handlers;
pub mod listener;
pub mod metadata;
pub mod notifications;
pub mod registry;
pub mod session;
pub mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use crate::access::AccessGate;
use crate::config::AppConfig;
use crate::connections::ConnectionRegistry;
use crate::handlers::AliasTable;
use crate::state::{MetadataWriter, ServerState, SharedServerState};

/// Handles shared by the listener and every session task
#[derive(Clone)]
pub struct SharedState {
    pub state: SharedServerState,
    pub metadata: MetadataWriter,
    pub gate: Arc<AccessGate>,
    pub config: Arc<AppConfig>,
    pub connections: Arc<ConnectionRegistry>,
    pub aliases: Arc<AliasTable>,
    pub socket_path: Arc<PathBuf>,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl SharedState {
    /// Build fresh server state and start the metadata writer
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: AppConfig, gate: AccessGate, socket_path: PathBuf) -> Self {
        let state = Arc::new(Mutex::new(ServerState::new(&config)));
        let (metadata, _writer) = MetadataWriter::spawn(Arc::clone(&state));
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            state,
            metadata,
            gate: Arc::new(gate),
            aliases: Arc::new(AliasTable::new(config.protocol.v1_spellings)),
            config: Arc::new(config),
            connections: Arc::new(ConnectionRegistry::new()),
            socket_path: Arc::new(socket_path),
            shutdown_tx,
        }
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn socket_path(&self) -> &Path {
        self.socket_path.as_path()
    }
}
