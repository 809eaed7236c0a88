//! Sidebar metadata operations
//!
//! Writes to an explicitly named scope are resolved, then queued without
//! waiting; writes to the current workspace wait for the writer to apply
//! them. Reads first
//! drain the queue so a caller always sees its own earlier writes.

use cmux_protocol::{CommandError, Handle};
use tracing::trace;
use uuid::Uuid;

use crate::metadata::{EntryKind, MetadataOp, MetadataScope};
use crate::state::ServerState;

use super::{HandlerContext, Result};

/// Which sidebar a request addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeTarget {
    /// The selected workspace of the focused window
    Current,
    Global,
    /// A caller-named workspace
    Explicit(Handle),
}

impl ScopeTarget {
    /// From a `--tab=` value; absent means current
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value {
            None => Ok(ScopeTarget::Current),
            Some(v) if v.eq_ignore_ascii_case("global") => Ok(ScopeTarget::Global),
            Some(v) => Ok(ScopeTarget::Explicit(Handle::parse(v)?)),
        }
    }

    fn resolve(&self, state: &ServerState) -> Result<MetadataScope> {
        match self {
            ScopeTarget::Global => Ok(MetadataScope::Global),
            ScopeTarget::Current => state.registry.current_workspace().map(MetadataScope::Workspace),
            ScopeTarget::Explicit(handle) => state
                .registry
                .resolve_workspace(*handle, None)
                .map(MetadataScope::Workspace),
        }
    }
}

impl HandlerContext {
    pub(super) async fn write_metadata(&self, target: ScopeTarget, op: MetadataOp) -> Result<()> {
        let writer = &self.shared.metadata;
        match target {
            ScopeTarget::Global => writer.enqueue(MetadataScope::Global, op),
            ScopeTarget::Explicit(_) => {
                // Checked now so the caller hears about a bad workspace; a
                // close racing the queued write still drops it in the writer
                let scope = self.read(|state| target.resolve(state)).await?;
                trace!(op = op.name(), ?scope, "Queued metadata write");
                writer.enqueue(scope, op)
            }
            ScopeTarget::Current => {
                let scope = self.read(|state| target.resolve(state)).await?;
                writer.apply(scope, op).await
            }
        }
    }

    /// Resolve a `--panel=` surface without taking the lock for plain ids
    pub(super) async fn resolve_panel(&self, panel: Option<Handle>) -> Result<Option<Uuid>> {
        match panel {
            None => Ok(None),
            Some(Handle::Id(id)) => Ok(Some(id)),
            Some(handle) => self
                .read(|state| state.registry.resolve_surface(handle, None))
                .await
                .map(Some),
        }
    }

    pub(super) async fn metadata_rows(&self, target: ScopeTarget, kind: EntryKind) -> Result<Vec<String>> {
        self.shared.metadata.barrier().await?;
        self.read(|state| {
            let scope = target.resolve(state)?;
            Ok(state.metadata.rows(scope, kind))
        })
        .await
    }

    pub(super) async fn sidebar_state(&self, target: ScopeTarget) -> Result<String> {
        self.shared.metadata.barrier().await?;
        self.read(|state| {
            let scope = target.resolve(state)?;
            Ok(state.metadata.render_state(scope))
        })
        .await
    }
}

/// Parse a `--priority=` value
pub(super) fn parse_priority(value: Option<&str>) -> Result<i64> {
    match value {
        None => Ok(0),
        Some(v) => v
            .parse()
            .map_err(|_| CommandError::invalid_params(format!("Invalid priority: {}", v))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::*;
    use crate::metadata::EntryWrite;
    use cmux_protocol::ErrorCode;

    fn report(key: &str, priority: i64) -> MetadataOp {
        MetadataOp::Report(
            EntryKind::Status,
            EntryWrite {
                key: key.into(),
                value: "v".into(),
                priority,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_explicit_writes_visible_to_next_read() {
        let ctx = context();
        let ws = ctx.current_workspace(None).await.unwrap();
        let target = ScopeTarget::Explicit(Handle::Id(ws));

        ctx.write_metadata(target, report("mid", 50)).await.unwrap();
        ctx.write_metadata(target, report("low", 10)).await.unwrap();
        ctx.write_metadata(target, report("high", 80)).await.unwrap();

        let rows = ctx.metadata_rows(ScopeTarget::Current, EntryKind::Status).await.unwrap();
        let keys: Vec<&str> = rows.iter().map(|r| r.split('=').next().unwrap()).collect();
        assert_eq!(keys, vec!["high", "mid", "low"]);
    }

    #[tokio::test]
    async fn test_explicit_write_to_unknown_workspace_fails_like_read() {
        let ctx = context();
        let target = ScopeTarget::Explicit(Handle::Id(Uuid::new_v4()));

        let write = ctx.write_metadata(target, report("a", 0)).await.unwrap_err();
        let read = ctx.sidebar_state(target).await.unwrap_err();
        assert_eq!(write.code, ErrorCode::NotFound);
        assert_eq!(write, read);

        let missing_ordinal = ScopeTarget::Explicit(Handle::Ordinal(7));
        let err = ctx.write_metadata(missing_ordinal, MetadataOp::ClearProgress).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_explicit_write_to_closed_workspace_is_refused() {
        let ctx = context();
        let created = ctx.create_workspace(None).await.unwrap();
        let target = ScopeTarget::Explicit(Handle::Id(created.workspace_id));
        ctx.write_metadata(target, report("a", 0)).await.unwrap();

        ctx.close_workspace(Some(Handle::Id(created.workspace_id))).await.unwrap();
        let err = ctx.write_metadata(target, report("b", 0)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_current_and_global_scopes_are_separate() {
        let ctx = context();
        ctx.write_metadata(ScopeTarget::Current, report("ws", 0)).await.unwrap();
        ctx.write_metadata(ScopeTarget::Global, report("g", 0)).await.unwrap();

        assert_eq!(
            ctx.metadata_rows(ScopeTarget::Global, EntryKind::Status).await.unwrap().len(),
            1
        );
        let state = ctx.sidebar_state(ScopeTarget::Current).await.unwrap();
        assert!(state.lines().any(|l| l == "status_count=1"));
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!(ScopeTarget::parse(None).unwrap(), ScopeTarget::Current);
        assert_eq!(ScopeTarget::parse(Some("global")).unwrap(), ScopeTarget::Global);
        assert_eq!(
            ScopeTarget::parse(Some("workspace:1")).unwrap(),
            ScopeTarget::Explicit(Handle::parse("workspace:1").unwrap())
        );
        assert_eq!(
            ScopeTarget::parse(Some("not a tab")).unwrap_err().code,
            ErrorCode::InvalidId
        );
        assert_eq!(parse_priority(Some("x")).unwrap_err().code, ErrorCode::InvalidParams);
    }
}
