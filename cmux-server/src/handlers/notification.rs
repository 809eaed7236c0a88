//! Notification operations

use cmux_protocol::{CommandError, Handle};
use uuid::Uuid;

use crate::notifications::Notification;

use super::{surface_target, HandlerContext, Result};

impl HandlerContext {
    /// Append an unread notification for `surface` (default: focused surface)
    pub(super) async fn notify(
        &self,
        surface: Option<Handle>,
        title: String,
        subtitle: String,
        body: String,
    ) -> Result<Uuid> {
        self.mutate(|state| {
            let surface = surface_target(&state.registry, surface, None)?;
            let workspace = state
                .registry
                .locate_surface(surface)
                .map(|path| path.workspace)
                .ok_or_else(|| CommandError::not_found("Surface not found"))?;
            Ok(state
                .notifications
                .create(workspace, Some(surface), title, subtitle, body))
        })
        .await
    }

    pub(super) async fn list_notifications(&self) -> Vec<Notification> {
        self.read(|state| state.notifications.list().to_vec()).await
    }

    pub(super) async fn clear_notifications(&self) -> usize {
        let mut state = self.shared.state.lock().await;
        state.notifications.clear()
    }
}

#[cfg(test)]
mod tests {
    use cmux_protocol::Handle;

    use super::super::test_support::context;

    #[tokio::test]
    async fn test_notify_targets_focused_surface() {
        let ctx = context();
        let id = ctx
            .notify(None, "Build".into(), "".into(), "done".into())
            .await
            .unwrap();
        let listed = ctx.list_notifications().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert!(listed[0].surface_id.is_some());
        assert!(!listed[0].is_read);

        assert_eq!(ctx.clear_notifications().await, 1);
        assert!(ctx.list_notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_closing_workspace_drops_its_notifications() {
        let ctx = context();
        let first = ctx
            .notify(None, "Stays".into(), "".into(), "".into())
            .await
            .unwrap();
        let created = ctx.create_workspace(None).await.unwrap();
        ctx.notify(Some(Handle::Id(created.surface_id)), "Goes".into(), "".into(), "".into())
            .await
            .unwrap();
        assert_eq!(ctx.list_notifications().await.len(), 2);

        ctx.close_workspace(Some(Handle::Id(created.workspace_id)))
            .await
            .unwrap();
        let listed = ctx.list_notifications().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, first);
    }
}
