//! Entity addressing
//!
//! A caller may name a window, workspace, pane or surface by ordinal, by
//! ref (`<kind>:<ordinal>`) or by UUID. Ordinals and refs are soft
//! addresses re-resolved against the live listing on every use.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{CommandError, ErrorCode};

lazy_static! {
    static ref REF_REGEX: Regex =
        Regex::new(r"^(?i)(window|workspace|tab|pane|surface|panel):([0-9]+)$").unwrap();
}

/// Addressable entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Window,
    Workspace,
    Pane,
    Surface,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Window => "window",
            EntityKind::Workspace => "workspace",
            EntityKind::Pane => "pane",
            EntityKind::Surface => "surface",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "window" => Ok(EntityKind::Window),
            "workspace" | "tab" => Ok(EntityKind::Workspace),
            "pane" => Ok(EntityKind::Pane),
            "surface" | "panel" => Ok(EntityKind::Surface),
            _ => Err(HandleError::Invalid(s.to_string())),
        }
    }
}

/// Handle resolution error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    #[error("Invalid id: {0}")]
    Invalid(String),

    #[error("Expected a {expected} ref, got {got}")]
    KindMismatch { expected: EntityKind, got: String },
}

impl From<HandleError> for CommandError {
    fn from(err: HandleError) -> Self {
        CommandError::new(ErrorCode::InvalidId, err.to_string())
    }
}

/// A bare ordinal: ASCII digits only, no sign or whitespace
pub fn parse_ordinal(input: &str) -> Option<usize> {
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    input.parse().ok()
}

/// A parsed entity address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    /// Position in the listing of the implied scope
    Ordinal(usize),
    /// Position in the global listing of `kind`
    Ref { kind: EntityKind, ordinal: usize },
    /// Stable identifier
    Id(Uuid),
}

impl Handle {
    /// Parse a caller-supplied address
    ///
    /// Precedence: integer, then `<kind>:<digits>`, then UUID.
    pub fn parse(input: &str) -> Result<Self, HandleError> {
        let trimmed = input.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return parse_ordinal(trimmed)
                .map(Handle::Ordinal)
                .ok_or_else(|| HandleError::Invalid(trimmed.to_string()));
        }
        if let Some(caps) = REF_REGEX.captures(trimmed) {
            let kind = caps[1].parse::<EntityKind>()?;
            let ordinal =
                parse_ordinal(&caps[2]).ok_or_else(|| HandleError::Invalid(trimmed.to_string()))?;
            return Ok(Handle::Ref { kind, ordinal });
        }
        Uuid::parse_str(trimmed)
            .map(Handle::Id)
            .map_err(|_| HandleError::Invalid(trimmed.to_string()))
    }

    /// Parse a JSON parameter value (integer or string)
    pub fn from_json(value: &Value) -> Result<Self, HandleError> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Handle::Ordinal)
                .ok_or_else(|| HandleError::Invalid(n.to_string())),
            Value::String(s) => Handle::parse(s),
            other => Err(HandleError::Invalid(other.to_string())),
        }
    }

    /// Reject refs naming a different kind
    pub fn expect_kind(self, expected: EntityKind) -> Result<Self, HandleError> {
        match self {
            Handle::Ref { kind, ordinal } if kind != expected => Err(HandleError::KindMismatch {
                expected,
                got: format!("{}:{}", kind, ordinal),
            }),
            other => Ok(other),
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Ordinal(n) => write!(f, "{}", n),
            Handle::Ref { kind, ordinal } => write!(f, "{}:{}", kind, ordinal),
            Handle::Id(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for Handle {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Handle::parse(s)
    }
}
