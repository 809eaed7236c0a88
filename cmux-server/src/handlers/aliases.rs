//! v1 command spellings
//!
//! Each aliased command has a modern and a legacy spelling. The table is
//! built once at startup from the configured policy; a spelling the policy
//! excludes is reported as an unknown command so clients fall back.

use std::collections::{HashMap, HashSet};

use crate::config::V1Spellings;

/// (modern, legacy) pairs
const ALIASES: &[(&str, &str)] = &[
    ("list_workspaces", "list_tabs"),
    ("new_workspace", "new_tab"),
    ("close_workspace", "close_tab"),
    ("select_workspace", "select_tab"),
    ("current_workspace", "current_tab"),
    ("report_meta", "set_status"),
    ("clear_meta", "clear_status"),
];

/// Extra spellings routed to another handler regardless of policy
const ROUTES: &[(&str, &str)] = &[("focus_surface_by_panel", "focus_surface")];

#[derive(Debug, Clone)]
pub struct AliasTable {
    /// accepted spelling -> handler name
    accepted: HashMap<&'static str, &'static str>,
    /// spellings this build refuses
    refused: HashSet<&'static str>,
    policy: V1Spellings,
}

impl AliasTable {
    pub fn new(policy: V1Spellings) -> Self {
        let mut accepted = HashMap::new();
        let mut refused = HashSet::new();
        for &(modern, legacy) in ALIASES {
            match policy {
                V1Spellings::Both => {
                    accepted.insert(modern, modern);
                    accepted.insert(legacy, modern);
                }
                V1Spellings::Modern => {
                    accepted.insert(modern, modern);
                    refused.insert(legacy);
                }
                V1Spellings::Legacy => {
                    accepted.insert(legacy, modern);
                    refused.insert(modern);
                }
            }
        }
        for &(spelling, target) in ROUTES {
            accepted.insert(spelling, target);
        }
        Self {
            accepted,
            refused,
            policy,
        }
    }

    pub fn policy(&self) -> V1Spellings {
        self.policy
    }

    /// Handler name for an incoming command, `None` if this build refuses it
    pub fn canonical<'a>(&self, name: &'a str) -> Option<&'a str> {
        if self.refused.contains(name) {
            return None;
        }
        Some(self.accepted.get(name).copied().unwrap_or(name))
    }

    /// Whether `name` is the legacy spelling of an aliased command
    pub fn is_legacy(name: &str) -> bool {
        ALIASES.iter().any(|&(_, legacy)| legacy == name)
    }

    /// Every spelling this build accepts for aliased commands
    pub fn accepted_spellings(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.accepted.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_accepts_either_spelling() {
        let table = AliasTable::new(V1Spellings::Both);
        assert_eq!(table.canonical("list_tabs"), Some("list_workspaces"));
        assert_eq!(table.canonical("list_workspaces"), Some("list_workspaces"));
        assert_eq!(table.canonical("set_status"), Some("report_meta"));
        assert_eq!(table.canonical("ping"), Some("ping"));
    }

    #[test]
    fn test_legacy_build_refuses_modern_names() {
        let table = AliasTable::new(V1Spellings::Legacy);
        assert_eq!(table.canonical("new_workspace"), None);
        assert_eq!(table.canonical("new_tab"), Some("new_workspace"));
    }

    #[test]
    fn test_modern_build_refuses_legacy_names() {
        let table = AliasTable::new(V1Spellings::Modern);
        assert_eq!(table.canonical("close_tab"), None);
        assert_eq!(table.canonical("close_workspace"), Some("close_workspace"));
    }

    #[test]
    fn test_panel_route() {
        let table = AliasTable::new(V1Spellings::Modern);
        assert_eq!(table.canonical("focus_surface_by_panel"), Some("focus_surface"));
        assert!(AliasTable::is_legacy("current_tab"));
        assert!(!AliasTable::is_legacy("current_workspace"));
    }
}
