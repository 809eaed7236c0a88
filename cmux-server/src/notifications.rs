//! Notification store
//!
//! Insertion ordered and bulk cleared. Entries for a workspace go away
//! once that workspace is closed.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub surface_id: Option<Uuid>,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub is_read: bool,
}

impl Notification {
    /// `id|workspace|surface|read|title|subtitle|body` (v1 list row, sans index)
    pub fn row(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.id,
            self.workspace_id,
            self.surface_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "none".to_string()),
            if self.is_read { "read" } else { "unread" },
            self.title,
            self.subtitle,
            self.body
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    items: Vec<Notification>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        workspace_id: Uuid,
        surface_id: Option<Uuid>,
        title: impl Into<String>,
        subtitle: impl Into<String>,
        body: impl Into<String>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.items.push(Notification {
            id,
            workspace_id,
            surface_id,
            title: title.into(),
            subtitle: subtitle.into(),
            body: body.into(),
            is_read: false,
        });
        id
    }

    pub fn list(&self) -> &[Notification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keep only notifications whose workspace passes `keep`
    pub fn retain_workspaces(&mut self, mut keep: impl FnMut(Uuid) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|n| keep(n.workspace_id));
        before - self.items.len()
    }

    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        cleared
    }
}

/// Split a v1 `title|subtitle|body` payload; missing parts are empty
pub fn split_payload(payload: &str) -> (String, String, String) {
    let mut parts = payload.splitn(3, '|');
    let title = parts.next().unwrap_or_default().to_string();
    let subtitle = parts.next().unwrap_or_default().to_string();
    let body = parts.next().unwrap_or_default().to_string();
    (title, subtitle, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_list_clear() {
        let mut store = NotificationStore::new();
        let ws = Uuid::new_v4();
        let first = store.create(ws, None, "Build", "", "done");
        let second = store.create(ws, Some(Uuid::new_v4()), "Test", "unit", "failed");

        let ids: Vec<Uuid> = store.list().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![first, second]);
        assert!(store.list().iter().all(|n| !n.is_read));

        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_retain_workspaces_keeps_order() {
        let mut store = NotificationStore::new();
        let kept = Uuid::new_v4();
        let closed = Uuid::new_v4();
        let a = store.create(kept, None, "a", "", "");
        store.create(closed, None, "b", "", "");
        let c = store.create(kept, None, "c", "", "");
        store.create(closed, None, "d", "", "");

        assert_eq!(store.retain_workspaces(|ws| ws != closed), 2);
        let ids: Vec<Uuid> = store.list().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![a, c]);
        assert_eq!(store.retain_workspaces(|_| true), 0);
    }

    #[test]
    fn test_row_format() {
        let mut store = NotificationStore::new();
        let ws = Uuid::new_v4();
        store.create(ws, None, "Title", "Sub", "Body|with pipe");
        let row = store.list()[0].row();
        let parts: Vec<&str> = row.splitn(7, '|').collect();
        assert_eq!(parts.len(), 7);
        assert_eq!(parts[1], ws.to_string());
        assert_eq!(parts[2], "none");
        assert_eq!(parts[3], "unread");
        assert_eq!(parts[6], "Body|with pipe");
    }

    #[test]
    fn test_split_payload() {
        assert_eq!(
            split_payload("a|b|c|d"),
            ("a".to_string(), "b".to_string(), "c|d".to_string())
        );
        assert_eq!(
            split_payload("only"),
            ("only".to_string(), String::new(), String::new())
        );
    }
}
