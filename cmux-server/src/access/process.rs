//! Process ancestry lookup

use std::collections::HashMap;

/// Read-only view of the OS process table
pub trait ProcessTable: Send + Sync {
    /// Parent of `pid`, or `None` if the process is gone or unreadable
    fn parent_of(&self, pid: u32) -> Option<u32>;
}

/// Process table backed by the running OS
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcessTable;

impl ProcessTable for OsProcessTable {
    fn parent_of(&self, pid: u32) -> Option<u32> {
        read_parent_pid(pid)
    }
}

#[cfg(target_os = "linux")]
fn read_parent_pid(pid: u32) -> Option<u32> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    parse_stat_ppid(&stat)
}

#[cfg(not(target_os = "linux"))]
fn read_parent_pid(pid: u32) -> Option<u32> {
    let output = std::process::Command::new("ps")
        .args(["-p", &pid.to_string(), "-o", "ppid="])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8(output.stdout).ok()?.trim().parse().ok()
}

/// Parse the ppid out of `/proc/<pid>/stat`: "pid (name) state ppid ..."
///
/// The name may contain spaces and parens, so split at the last ')'.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_stat_ppid(stat: &str) -> Option<u32> {
    let name_end = stat.rfind(')')?;
    let rest = stat.get(name_end + 2..)?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

/// Fixed parent map, for tests and tooling
#[derive(Debug, Default, Clone)]
pub struct StaticProcessTable {
    parents: HashMap<u32, u32>,
}

impl StaticProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `parent` as the parent of `pid`
    pub fn with_parent(mut self, pid: u32, parent: u32) -> Self {
        self.parents.insert(pid, parent);
        self
    }
}

impl ProcessTable for StaticProcessTable {
    fn parent_of(&self, pid: u32) -> Option<u32> {
        self.parents.get(&pid).copied()
    }
}

/// Walk from `pid` towards init looking for `ancestor`
///
/// `pid` itself counts as depth 0. The walk stops at pid 0/1, on a
/// self-parented entry, on an unreadable entry, or after `max_depth` hops.
pub fn is_descendant_of(table: &dyn ProcessTable, pid: u32, ancestor: u32, max_depth: usize) -> bool {
    let mut current = pid;
    for _ in 0..=max_depth {
        if current == ancestor {
            return true;
        }
        match table.parent_of(current) {
            Some(parent) if parent != current && parent > 1 => current = parent,
            Some(1) if ancestor == 1 => return true,
            _ => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stat_with_odd_name() {
        let stat = "4242 (my (weird) proc) S 17 4242 4242 0 -1 4194560";
        assert_eq!(parse_stat_ppid(stat), Some(17));
        assert_eq!(parse_stat_ppid("garbage"), None);
    }

    #[test]
    fn test_walk_finds_ancestor() {
        let table = StaticProcessTable::new()
            .with_parent(300, 200)
            .with_parent(200, 100)
            .with_parent(100, 1);
        assert!(is_descendant_of(&table, 300, 100, 8));
        assert!(is_descendant_of(&table, 100, 100, 8));
        assert!(!is_descendant_of(&table, 300, 999, 8));
    }

    #[test]
    fn test_walk_respects_depth() {
        let table = StaticProcessTable::new()
            .with_parent(4, 3)
            .with_parent(3, 2)
            .with_parent(2, 10);
        assert!(is_descendant_of(&table, 4, 10, 3));
        assert!(!is_descendant_of(&table, 4, 10, 2));
    }

    #[test]
    fn test_walk_stops_on_cycle() {
        let table = StaticProcessTable::new().with_parent(5, 5);
        assert!(!is_descendant_of(&table, 5, 6, 64));
    }

    #[test]
    fn test_os_table_sees_own_parent() {
        let me = std::process::id();
        let table = OsProcessTable;
        if let Some(parent) = table.parent_of(me) {
            assert!(is_descendant_of(&table, me, parent, 4));
        }
        assert!(is_descendant_of(&table, me, me, 0));
    }
}
