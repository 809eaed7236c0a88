//! Command error taxonomy shared by both dispatchers

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error kinds a command can fail with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The connecting process is not allowed to use the socket
    AccessDenied,
    /// Password mode and the session has not logged in yet
    AuthRequired,
    /// Login attempt with the wrong password
    InvalidPassword,
    /// v1 command name not recognised
    UnknownCommand,
    /// v2 method name not recognised
    MethodNotFound,
    /// Ordinal, ref or UUID that does not resolve
    InvalidId,
    /// Malformed options, wrong arity, conflicting targets
    InvalidParams,
    /// Entity resolved syntactically but no longer exists
    NotFound,
    /// v2 record is not valid JSON
    ParseError,
    /// v2 record is JSON but not a request envelope
    InvalidRequest,
    #[serde(rename = "internal_error")]
    Internal,
}

impl ErrorCode {
    /// Stable wire string used in v2 error objects
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AccessDenied => "access_denied",
            ErrorCode::AuthRequired => "auth_required",
            ErrorCode::InvalidPassword => "invalid_password",
            ErrorCode::UnknownCommand => "unknown_command",
            ErrorCode::MethodNotFound => "method_not_found",
            ErrorCode::InvalidId => "invalid_id",
            ErrorCode::InvalidParams => "invalid_params",
            ErrorCode::NotFound => "not_found",
            ErrorCode::ParseError => "parse_error",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed command, rendered as `ERROR: <message>` in v1 and as an
/// error object in v2
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
}

impl CommandError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidId, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// The literal reply clients match on to drive legacy fallback
    pub fn unknown_command(name: &str) -> Self {
        Self::new(ErrorCode::UnknownCommand, format!("Unknown command {}", name))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            format!("Unknown method: {}", method),
        )
    }

    pub fn auth_required() -> Self {
        Self::new(
            ErrorCode::AuthRequired,
            "Authentication required. Send: auth <password>",
        )
    }

    pub fn invalid_password() -> Self {
        Self::new(ErrorCode::InvalidPassword, "Invalid password")
    }

    pub fn access_denied() -> Self {
        Self::new(
            ErrorCode::AccessDenied,
            "Access denied - only processes started inside cmux can connect",
        )
    }

    /// v1 rendering
    pub fn to_v1_line(&self) -> String {
        format!("ERROR: {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_strings_match_serde() {
        for code in [
            ErrorCode::AccessDenied,
            ErrorCode::AuthRequired,
            ErrorCode::InvalidPassword,
            ErrorCode::MethodNotFound,
            ErrorCode::InvalidId,
            ErrorCode::Internal,
        ] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, serde_json::Value::String(code.as_str().to_string()));
        }
    }

    #[test]
    fn test_unknown_command_line_is_literal() {
        let err = CommandError::unknown_command("list_workspaces");
        assert_eq!(err.to_v1_line(), "ERROR: Unknown command list_workspaces");
    }

    #[test]
    fn test_auth_lines() {
        assert_eq!(CommandError::invalid_password().to_v1_line(), "ERROR: Invalid password");
        assert!(CommandError::auth_required()
            .to_v1_line()
            .starts_with("ERROR: Authentication required"));
        assert!(CommandError::access_denied().to_v1_line().contains("Access denied"));
    }
}
