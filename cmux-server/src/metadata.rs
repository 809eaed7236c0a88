//! Sidebar metadata store
//!
//! Per-scope keyed status entries and markdown blocks plus the single-slot
//! fields (progress, git branch, pull request, ports) and a bounded log.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use cmux_protocol::CommandError;

/// Default provider label for `report_pr`
pub const DEFAULT_PR_LABEL: &str = "PR";
/// Default provider label for `report_review`
pub const DEFAULT_REVIEW_LABEL: &str = "Review";
const NONE: &str = "none";

/// Which sidebar a metadata operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataScope {
    Global,
    Workspace(Uuid),
}

impl MetadataScope {
    pub fn workspace_id(&self) -> Option<Uuid> {
        match self {
            MetadataScope::Global => None,
            MetadataScope::Workspace(id) => Some(*id),
        }
    }
}

impl fmt::Display for MetadataScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataScope::Global => write!(f, "global"),
            MetadataScope::Workspace(id) => write!(f, "{}", id),
        }
    }
}

/// Keyed collection an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Status,
    Block,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryFormat {
    #[default]
    Plain,
    Markdown,
}

impl EntryFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryFormat::Plain => "plain",
            EntryFormat::Markdown => "markdown",
        }
    }
}

impl FromStr for EntryFormat {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(EntryFormat::Plain),
            "markdown" | "md" => Ok(EntryFormat::Markdown),
            other => Err(CommandError::invalid_params(format!(
                "Invalid format: {} (expected plain or markdown)",
                other
            ))),
        }
    }
}

/// Fields supplied by a `report_meta`-style write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryWrite {
    pub key: String,
    pub value: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub url: Option<String>,
    pub priority: i64,
    pub format: EntryFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub url: Option<String>,
    pub priority: i64,
    pub format: EntryFormat,
    /// Store-wide write sequence; larger is newer
    pub updated: u64,
}

impl MetaEntry {
    /// Listing row for `list_meta`
    pub fn status_row(&self) -> String {
        let mut row = format!("{}={}", self.key, single_line(&self.value));
        for (name, value) in [("icon", &self.icon), ("color", &self.color), ("url", &self.url)] {
            if let Some(value) = value {
                row.push_str(&format!(" {}={}", name, value));
            }
        }
        row.push_str(&format!(
            " priority={} format={}",
            self.priority,
            self.format.as_str()
        ));
        row
    }

    /// Listing row for `list_meta_blocks`
    pub fn block_row(&self) -> String {
        format!(
            "{}={} priority={}",
            self.key,
            single_line(&self.value),
            self.priority
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub value: f64,
    pub label: Option<String>,
}

impl Progress {
    pub fn new(value: f64, label: Option<String>) -> Result<Self, CommandError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(CommandError::invalid_params(format!(
                "Progress must be between 0.0 and 1.0, got {}",
                value
            )));
        }
        Ok(Self { value, label })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitBranch {
    pub branch: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
    pub state: String,
    pub label: String,
    pub panel: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: String,
    pub source: Option<String>,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "[{}] {}: {}", self.level, source, single_line(&self.message)),
            None => write!(f, "[{}] {}", self.level, single_line(&self.message)),
        }
    }
}

/// One mutation of a scope's sidebar
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataOp {
    Report(EntryKind, EntryWrite),
    Clear(EntryKind, String),
    SetProgress(Progress),
    ClearProgress,
    SetGitBranch(GitBranch),
    ClearGitBranch,
    SetPullRequest(PullRequest),
    ClearPullRequest,
    SetPorts(Vec<u16>),
    ClearPorts,
    Log(LogEntry),
    Reset,
}

impl MetadataOp {
    pub fn name(&self) -> &'static str {
        match self {
            MetadataOp::Report(EntryKind::Status, _) => "report_meta",
            MetadataOp::Report(EntryKind::Block, _) => "report_meta_block",
            MetadataOp::Clear(EntryKind::Status, _) => "clear_meta",
            MetadataOp::Clear(EntryKind::Block, _) => "clear_meta_block",
            MetadataOp::SetProgress(_) => "set_progress",
            MetadataOp::ClearProgress => "clear_progress",
            MetadataOp::SetGitBranch(_) => "report_git_branch",
            MetadataOp::ClearGitBranch => "clear_git_branch",
            MetadataOp::SetPullRequest(_) => "report_pr",
            MetadataOp::ClearPullRequest => "clear_pr",
            MetadataOp::SetPorts(_) => "report_ports",
            MetadataOp::ClearPorts => "clear_ports",
            MetadataOp::Log(_) => "log",
            MetadataOp::Reset => "reset_sidebar",
        }
    }
}

/// Everything shown in one scope's sidebar
#[derive(Debug, Clone, Default)]
pub struct Sidebar {
    status: HashMap<String, MetaEntry>,
    blocks: HashMap<String, MetaEntry>,
    progress: Option<Progress>,
    git: Option<GitBranch>,
    pull_request: Option<PullRequest>,
    ports: Vec<u16>,
    log: VecDeque<LogEntry>,
}

impl Sidebar {
    fn entries(&self, kind: EntryKind) -> &HashMap<String, MetaEntry> {
        match kind {
            EntryKind::Status => &self.status,
            EntryKind::Block => &self.blocks,
        }
    }

    fn entries_mut(&mut self, kind: EntryKind) -> &mut HashMap<String, MetaEntry> {
        match kind {
            EntryKind::Status => &mut self.status,
            EntryKind::Block => &mut self.blocks,
        }
    }

    /// Entries by descending priority, newest first among equals
    pub fn list(&self, kind: EntryKind) -> Vec<&MetaEntry> {
        let mut entries: Vec<&MetaEntry> = self.entries(kind).values().collect();
        entries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.updated.cmp(&a.updated))
        });
        entries
    }

    pub fn count(&self, kind: EntryKind) -> usize {
        self.entries(kind).len()
    }

    pub fn progress(&self) -> Option<&Progress> {
        self.progress.as_ref()
    }

    pub fn git_branch(&self) -> Option<&GitBranch> {
        self.git.as_ref()
    }

    pub fn pull_request(&self) -> Option<&PullRequest> {
        self.pull_request.as_ref()
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn log(&self) -> impl Iterator<Item = &LogEntry> {
        self.log.iter()
    }

    fn apply(&mut self, op: MetadataOp, seq: u64, max_log_entries: usize) {
        match op {
            MetadataOp::Report(kind, write) => {
                let entry = MetaEntry {
                    key: write.key.clone(),
                    value: write.value,
                    icon: write.icon,
                    color: write.color,
                    url: write.url,
                    priority: write.priority,
                    format: match kind {
                        EntryKind::Block => EntryFormat::Markdown,
                        EntryKind::Status => write.format,
                    },
                    updated: seq,
                };
                self.entries_mut(kind).insert(write.key, entry);
            }
            MetadataOp::Clear(kind, key) => {
                self.entries_mut(kind).remove(&key);
            }
            MetadataOp::SetProgress(progress) => self.progress = Some(progress),
            MetadataOp::ClearProgress => self.progress = None,
            MetadataOp::SetGitBranch(git) => self.git = Some(git),
            MetadataOp::ClearGitBranch => self.git = None,
            MetadataOp::SetPullRequest(pr) => self.pull_request = Some(pr),
            MetadataOp::ClearPullRequest => self.pull_request = None,
            MetadataOp::SetPorts(mut ports) => {
                ports.sort_unstable();
                ports.dedup();
                self.ports = ports;
            }
            MetadataOp::ClearPorts => self.ports.clear(),
            MetadataOp::Log(entry) => {
                self.log.push_back(entry);
                while self.log.len() > max_log_entries {
                    self.log.pop_front();
                }
            }
            MetadataOp::Reset => *self = Sidebar::default(),
        }
    }

    /// `key=value` dump used by `sidebar_state`
    pub fn render_state(&self, scope: MetadataScope) -> String {
        let mut lines = vec![
            format!("tab={}", scope),
            format!("status_count={}", self.status.len()),
        ];
        lines.extend(self.list(EntryKind::Status).iter().map(|e| format!("  {}", e.status_row())));
        lines.push(format!("meta_block_count={}", self.blocks.len()));
        lines.extend(self.list(EntryKind::Block).iter().map(|e| format!("  {}", e.block_row())));

        lines.push(match &self.progress {
            Some(Progress { value, label: Some(label) }) => format!("progress={} {}", value, label),
            Some(Progress { value, label: None }) => format!("progress={}", value),
            None => format!("progress={}", NONE),
        });
        lines.push(match &self.git {
            Some(GitBranch { branch, status: Some(status) }) => {
                format!("git_branch={} {}", branch, status)
            }
            Some(GitBranch { branch, status: None }) => format!("git_branch={}", branch),
            None => format!("git_branch={}", NONE),
        });
        match &self.pull_request {
            Some(pr) => {
                lines.push(format!("pr=#{} {} {}", pr.number, pr.state, pr.url));
                lines.push(format!("pr_label={}", pr.label));
            }
            None => {
                lines.push(format!("pr={}", NONE));
                lines.push(format!("pr_label={}", NONE));
            }
        }
        lines.push(if self.ports.is_empty() {
            format!("ports={}", NONE)
        } else {
            let ports: Vec<String> = self.ports.iter().map(u16::to_string).collect();
            format!("ports={}", ports.join(" "))
        });
        lines.push(format!("log_count={}", self.log.len()));
        lines.extend(self.log.iter().map(|entry| format!("  {}", entry)));
        lines.join("\n")
    }
}

/// Sidebars for every scope that has been written to
#[derive(Debug, Clone)]
pub struct MetadataStore {
    scopes: HashMap<MetadataScope, Sidebar>,
    seq: u64,
    max_log_entries: usize,
}

impl MetadataStore {
    pub fn new(max_log_entries: usize) -> Self {
        Self {
            scopes: HashMap::new(),
            seq: 0,
            max_log_entries,
        }
    }

    pub fn apply(&mut self, scope: MetadataScope, op: MetadataOp) {
        self.seq += 1;
        let seq = self.seq;
        let max_log_entries = self.max_log_entries;
        if matches!(op, MetadataOp::Reset) {
            self.scopes.remove(&scope);
            return;
        }
        self.scopes
            .entry(scope)
            .or_default()
            .apply(op, seq, max_log_entries);
    }

    pub fn sidebar(&self, scope: MetadataScope) -> Option<&Sidebar> {
        self.scopes.get(&scope)
    }

    /// Listing rows for one kind, empty when nothing was reported
    pub fn rows(&self, scope: MetadataScope, kind: EntryKind) -> Vec<String> {
        self.sidebar(scope)
            .map(|sidebar| {
                sidebar
                    .list(kind)
                    .into_iter()
                    .map(|entry| match kind {
                        EntryKind::Status => entry.status_row(),
                        EntryKind::Block => entry.block_row(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn render_state(&self, scope: MetadataScope) -> String {
        match self.sidebar(scope) {
            Some(sidebar) => sidebar.render_state(scope),
            None => Sidebar::default().render_state(scope),
        }
    }

    /// Drop sidebars whose scope no longer passes `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&MetadataScope) -> bool) {
        self.scopes.retain(|scope, _| keep(scope));
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}

fn single_line(value: &str) -> String {
    value.replace('\r', "\\r").replace('\n', "\\n")
}
