//! Connection access control
//!
//! Every accepted connection is evaluated once, before any record is read.
//! Decisions are never cached across connections.

mod process;

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::debug;

use crate::config::{SocketConfig, SocketMode};

pub use process::{is_descendant_of, OsProcessTable, ProcessTable, StaticProcessTable};

/// Outcome of evaluating a new connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Commands run immediately
    Admit,
    /// Only the login handshake runs until the session authenticates
    AdmitPendingAuth,
    /// Answer at most one record with access denied, then close
    Reject,
}

/// Process-wide access policy
#[derive(Clone)]
pub struct AccessGate {
    mode: SocketMode,
    password: Option<String>,
    host_pid: u32,
    max_depth: usize,
    processes: Arc<dyn ProcessTable>,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("mode", &self.mode)
            .field("host_pid", &self.host_pid)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl AccessGate {
    /// Build the gate from socket settings, walking the live OS process table
    pub fn from_config(config: &SocketConfig) -> Self {
        Self {
            mode: config.mode,
            password: config.password.clone(),
            host_pid: config.host_pid.unwrap_or_else(std::process::id),
            max_depth: config.max_ancestry_depth,
            processes: Arc::new(OsProcessTable),
        }
    }

    /// Replace the process table used for ancestry walks
    pub fn with_process_table(mut self, processes: Arc<dyn ProcessTable>) -> Self {
        self.processes = processes;
        self
    }

    pub fn with_host_pid(mut self, host_pid: u32) -> Self {
        self.host_pid = host_pid;
        self
    }

    pub fn mode(&self) -> SocketMode {
        self.mode
    }

    /// Decide what a new connection from `peer_pid` may do
    ///
    /// In cmuxOnly mode this walks the process table synchronously; call it
    /// from a blocking context.
    pub fn evaluate(&self, peer_pid: Option<u32>) -> AccessDecision {
        match self.mode {
            SocketMode::AllowAll => AccessDecision::Admit,
            SocketMode::Password => AccessDecision::AdmitPendingAuth,
            SocketMode::CmuxOnly => {
                let Some(pid) = peer_pid else {
                    debug!("peer pid unavailable, rejecting");
                    return AccessDecision::Reject;
                };
                if is_descendant_of(self.processes.as_ref(), pid, self.host_pid, self.max_depth) {
                    AccessDecision::Admit
                } else {
                    AccessDecision::Reject
                }
            }
        }
    }

    /// Check a login attempt against the configured password
    pub fn verify_password(&self, candidate: &str) -> bool {
        match &self.password {
            Some(expected) if !expected.is_empty() => {
                bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(mode: SocketMode) -> AccessGate {
        let config = SocketConfig {
            mode,
            password: Some("hunter2".into()),
            ..SocketConfig::default()
        };
        let table = StaticProcessTable::new()
            .with_parent(30, 20)
            .with_parent(20, 10)
            .with_parent(99, 1);
        AccessGate::from_config(&config)
            .with_process_table(Arc::new(table))
            .with_host_pid(10)
    }

    #[test]
    fn test_cmux_only() {
        let gate = gate(SocketMode::CmuxOnly);
        assert_eq!(gate.evaluate(Some(30)), AccessDecision::Admit);
        assert_eq!(gate.evaluate(Some(10)), AccessDecision::Admit);
        assert_eq!(gate.evaluate(Some(99)), AccessDecision::Reject);
        assert_eq!(gate.evaluate(None), AccessDecision::Reject);
    }

    #[test]
    fn test_repeated_rejections_are_independent() {
        let gate = gate(SocketMode::CmuxOnly);
        for _ in 0..20 {
            assert_eq!(gate.evaluate(Some(99)), AccessDecision::Reject);
        }
        assert_eq!(gate.evaluate(Some(30)), AccessDecision::Admit);
    }

    #[test]
    fn test_other_modes() {
        assert_eq!(gate(SocketMode::AllowAll).evaluate(None), AccessDecision::Admit);
        assert_eq!(
            gate(SocketMode::Password).evaluate(Some(99)),
            AccessDecision::AdmitPendingAuth
        );
    }

    #[test]
    fn test_verify_password() {
        let gate = gate(SocketMode::Password);
        assert!(gate.verify_password("hunter2"));
        assert!(!gate.verify_password("hunter"));
        assert!(!gate.verify_password(""));

        let open = AccessGate::from_config(&SocketConfig::default());
        assert!(!open.verify_password(""));
    }
}
