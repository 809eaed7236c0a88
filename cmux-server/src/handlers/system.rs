//! Login and identity

use serde::Serialize;
use tracing::warn;

use cmux_protocol::CommandError;

use crate::config::SocketMode;
use crate::registry::Focused;

use super::{AuthState, HandlerContext, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    NotRequired,
}

#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub focused: Focused,
    pub socket_path: String,
    pub connection_id: u64,
    pub mode: &'static str,
    pub authenticated: bool,
}

impl HandlerContext {
    pub(super) fn login(&mut self, password: &str) -> Result<AuthOutcome> {
        if self.shared.gate.mode() != SocketMode::Password {
            return Ok(AuthOutcome::NotRequired);
        }
        if self.shared.gate.verify_password(password) {
            if self.auth != AuthState::Authenticated {
                self.mark_authenticated();
            }
            Ok(AuthOutcome::Authenticated)
        } else {
            warn!(conn = %self.connection_id, "Rejected login attempt");
            Err(CommandError::invalid_password())
        }
    }

    pub(super) async fn identify(&self) -> Identity {
        let focused = self.read(|state| state.registry.focused()).await;
        Identity {
            focused,
            socket_path: self.shared.socket_path().display().to_string(),
            connection_id: self.connection_id.value(),
            mode: self.shared.gate.mode().as_str(),
            authenticated: self.auth == AuthState::Authenticated,
        }
    }
}
