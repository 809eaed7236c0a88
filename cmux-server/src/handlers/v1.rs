//! v1 text command dispatcher
//!
//! One line in, one reply out. The command name is first mapped through the
//! alias table; spellings this build refuses come back as
//! `ERROR: Unknown command <name>` so clients can retry the other spelling.

use tracing::debug;
use uuid::Uuid;

use cmux_protocol::{parse_ordinal, unescape_controls, CommandArgs, CommandError, CommandLine, Handle};

use crate::metadata::{
    EntryFormat, EntryKind, EntryWrite, GitBranch, LogEntry, MetadataOp, Progress, PullRequest,
    DEFAULT_PR_LABEL, DEFAULT_REVIEW_LABEL,
};
use crate::notifications::split_payload;
use crate::registry::{Cycle, SplitDirection, SurfaceInput, SurfaceType};

use super::aliases::AliasTable;
use super::sidebar::parse_priority;
use super::surface::MoveTarget;
use super::{AuthOutcome, HandlerContext, Position, Result, ScopeTarget};

/// How a command takes its argument text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grammar {
    /// Tokenized; any option outside the list is rejected before the handler runs
    Options(&'static [&'static str]),
    /// Taken verbatim, so text that looks like an option is still text
    Verbatim,
}

use Grammar::{Options, Verbatim};

const SIDEBAR_SCOPE: &[&str] = &["tab"];
const PULL_REQUEST: &[&str] = &["label", "state", "tab", "panel"];
const POSITION: &[&str] = &["index", "before", "after"];

/// Every command this dispatcher implements, in `help` order
const COMMANDS: &[(&str, Grammar)] = &[
    ("ping", Options(&[])),
    ("help", Options(&[])),
    ("auth", Verbatim),
    ("identify", Options(&[])),
    ("list_windows", Options(&[])),
    ("current_window", Options(&[])),
    ("new_window", Options(&[])),
    ("focus_window", Options(&[])),
    ("close_window", Options(&[])),
    ("list_workspaces", Options(&["window"])),
    ("new_workspace", Options(&["window"])),
    ("close_workspace", Options(&[])),
    ("select_workspace", Options(&["window"])),
    ("current_workspace", Options(&[])),
    ("rename_workspace", Options(&["workspace"])),
    ("next_workspace", Options(&[])),
    ("previous_workspace", Options(&[])),
    ("last_workspace", Options(&[])),
    ("move_workspace_to_window", Options(&["focus"])),
    ("reorder_workspace", Options(&["index", "before", "after", "window"])),
    ("list_panes", Options(&["workspace"])),
    ("focus_pane", Options(&[])),
    ("list_pane_surfaces", Options(&["pane"])),
    ("new_pane", Options(&["direction", "type", "url"])),
    ("swap_pane", Options(&["focus"])),
    ("break_pane", Options(&["pane", "surface", "focus"])),
    ("join_pane", Options(&["pane", "surface", "focus"])),
    ("last_pane", Options(&[])),
    ("list_surfaces", Options(&[])),
    ("focus_surface", Options(&[])),
    ("new_split", Options(&["surface", "type", "url"])),
    ("new_surface", Options(&["type", "pane", "url"])),
    ("close_surface", Options(&[])),
    (
        "move_surface",
        Options(&["pane", "workspace", "window", "before", "after", "index", "focus"]),
    ),
    ("reorder_surface", Options(POSITION)),
    ("send", Verbatim),
    ("send_surface", Verbatim),
    ("send_key", Verbatim),
    ("send_key_surface", Verbatim),
    ("trigger_flash", Options(&[])),
    ("open_browser", Options(&["direction", "surface"])),
    ("navigate", Options(&[])),
    ("browser_back", Options(&[])),
    ("browser_forward", Options(&[])),
    ("get_url", Options(&[])),
    ("notify", Verbatim),
    ("notify_surface", Verbatim),
    ("list_notifications", Options(&[])),
    ("clear_notifications", Options(&[])),
    ("report_meta", Options(&["icon", "color", "url", "priority", "format", "tab"])),
    ("clear_meta", Options(SIDEBAR_SCOPE)),
    ("list_meta", Options(SIDEBAR_SCOPE)),
    ("report_meta_block", Options(&["priority", "tab"])),
    ("clear_meta_block", Options(SIDEBAR_SCOPE)),
    ("list_meta_blocks", Options(SIDEBAR_SCOPE)),
    ("log", Options(&["level", "source", "tab"])),
    ("set_progress", Options(&["label", "tab"])),
    ("clear_progress", Options(SIDEBAR_SCOPE)),
    ("report_git_branch", Options(&["status", "tab"])),
    ("clear_git_branch", Options(SIDEBAR_SCOPE)),
    ("report_pr", Options(PULL_REQUEST)),
    ("report_review", Options(PULL_REQUEST)),
    ("clear_pr", Options(&["tab", "panel"])),
    ("report_ports", Options(SIDEBAR_SCOPE)),
    ("clear_ports", Options(SIDEBAR_SCOPE)),
    ("sidebar_state", Options(SIDEBAR_SCOPE)),
    ("reset_sidebar", Options(SIDEBAR_SCOPE)),
];

/// Present only when debug methods are enabled
const DEBUG_COMMANDS: &[(&str, Grammar)] = &[
    ("flash_count", Options(&[])),
    ("reset_flash_counts", Options(&[])),
    ("surface_input", Options(&[])),
];

fn grammar_of(table: &[(&str, Grammar)], name: &str) -> Option<Grammar> {
    table
        .iter()
        .find(|(command, _)| *command == name)
        .map(|&(_, grammar)| grammar)
}

impl HandlerContext {
    pub(super) async fn handle_v1(&mut self, line: &str) -> String {
        let Some(command) = CommandLine::parse(line) else {
            return CommandError::invalid_params("Empty command").to_v1_line();
        };

        let auth_command = self.shared.aliases.canonical(&command.name) == Some("auth");
        if !self.auth.allows_commands() && !auth_command {
            debug!(conn = %self.connection_id, command = %command.name, "Refused before login");
            return CommandError::auth_required().to_v1_line();
        }

        let Some(canonical) = self.shared.aliases.canonical(&command.name) else {
            debug!(conn = %self.connection_id, command = %command.name, "Refused spelling");
            return CommandError::unknown_command(&command.name).to_v1_line();
        };

        match self.dispatch_v1(canonical, &command).await {
            Ok(reply) => reply,
            Err(err) => {
                debug!(conn = %self.connection_id, command = %command.name, code = %err.code, "Command failed");
                err.to_v1_line()
            }
        }
    }

    async fn dispatch_v1(&mut self, name: &str, command: &CommandLine) -> Result<String> {
        let grammar = match grammar_of(COMMANDS, name) {
            Some(grammar) => Some(grammar),
            None if self.shared.config.protocol.debug_methods => grammar_of(DEBUG_COMMANDS, name),
            None => None,
        };
        let allowed = match grammar {
            Some(Options(allowed)) => allowed,
            Some(Verbatim) => return self.dispatch_raw(name, &command.raw).await,
            None => {
                debug!(conn = %self.connection_id, command = %command.name, "Unknown command");
                return Err(CommandError::unknown_command(&command.name));
            }
        };
        let args = command.args()?;
        args.reject_unknown_options(allowed)?;

        match name {
            "ping" => Ok("PONG".to_string()),
            "help" => Ok(self.help()),
            "identify" => {
                let identity = self.identify().await;
                serde_json::to_string(&identity).map_err(|e| CommandError::internal(e.to_string()))
            }

            // Windows
            "list_windows" => {
                let windows = self.list_windows().await;
                Ok(rows(
                    windows.iter().map(|w| {
                        format!(
                            "{}{}: {} {} workspaces",
                            marker(w.focused),
                            w.index,
                            w.id,
                            w.workspace_count
                        )
                    }),
                    "No windows",
                ))
            }
            "current_window" => Ok(self.current_window().await?.to_string()),
            "new_window" => Ok(ok_id(self.create_window().await?.window_id)),
            "focus_window" => {
                let window = required_handle(&args, 0, "focus_window <window>")?;
                self.focus_window(window).await?;
                Ok(ok())
            }
            "close_window" => {
                self.close_window(handle_at(&args, 0)?).await?;
                Ok(ok())
            }

            // Workspaces
            "list_workspaces" => {
                let (_, workspaces) = self.list_workspaces(handle_option(&args, "window")?).await?;
                let empty = if AliasTable::is_legacy(&command.name) {
                    "No tabs"
                } else {
                    "No workspaces"
                };
                Ok(rows(
                    workspaces.iter().map(|ws| {
                        format!("{}{}: {} {}", marker(ws.selected), ws.index, ws.id, ws.title)
                    }),
                    empty,
                ))
            }
            "new_workspace" => {
                let created = self.create_workspace(handle_option(&args, "window")?).await?;
                Ok(ok_id(created.workspace_id))
            }
            "close_workspace" => {
                self.close_workspace(handle_at(&args, 0)?).await?;
                Ok(ok())
            }
            "select_workspace" => {
                let workspace = required_handle(&args, 0, "select_workspace <workspace>")?;
                self.select_workspace(workspace, handle_option(&args, "window")?)
                    .await?;
                Ok(ok())
            }
            "current_workspace" => Ok(self.current_workspace(None).await?.to_string()),
            "rename_workspace" => {
                let title = args
                    .text_from(0)
                    .ok_or_else(|| CommandError::invalid_params("Usage: rename_workspace <title>"))?;
                self.rename_workspace(handle_option(&args, "workspace")?, &title)
                    .await?;
                Ok(ok())
            }
            "next_workspace" => Ok(ok_id(self.cycle_workspace(Cycle::Next, None).await?)),
            "previous_workspace" => Ok(ok_id(self.cycle_workspace(Cycle::Previous, None).await?)),
            "last_workspace" => Ok(ok_id(self.last_workspace(None).await?)),
            "move_workspace_to_window" => {
                let workspace = required_handle(&args, 0, "move_workspace_to_window <workspace> <window>")?;
                let window = required_handle(&args, 1, "move_workspace_to_window <workspace> <window>")?;
                self.move_workspace_to_window(Some(workspace), window, focus_flag(&args)?)
                    .await?;
                Ok(ok())
            }
            "reorder_workspace" => {
                let workspace = required_handle(&args, 0, "reorder_workspace <workspace> --index=<n>")?;
                let index = self
                    .reorder_workspace(workspace, position(&args)?, handle_option(&args, "window")?)
                    .await?;
                Ok(format!("OK {}", index))
            }

            // Panes
            "list_panes" => {
                let (_, panes) = self.list_panes(handle_option(&args, "workspace")?).await?;
                Ok(rows(
                    panes.iter().map(|p| {
                        format!(
                            "{}{}: {} [{} surfaces]",
                            marker(p.focused),
                            p.index,
                            p.id,
                            p.surface_count
                        )
                    }),
                    "No panes",
                ))
            }
            "focus_pane" => {
                let pane = required_handle(&args, 0, "focus_pane <pane>")?;
                self.focus_pane(pane, None).await?;
                Ok(ok())
            }
            "list_pane_surfaces" => {
                let (_, surfaces) = self
                    .list_pane_surfaces(handle_option(&args, "pane")?, None)
                    .await?;
                Ok(rows(
                    surfaces.iter().map(|s| {
                        format!("{}{}: {} [panel:{}]", marker(s.selected), s.index, s.title, s.id)
                    }),
                    "No surfaces",
                ))
            }
            "new_pane" => {
                let direction = direction_option(&args)?;
                let created = self
                    .create_pane(direction, surface_type(&args)?, url_option(&args)?, None, None)
                    .await?;
                Ok(ok_id(created.surface_id))
            }
            "swap_pane" => {
                let pane = required_handle(&args, 0, "swap_pane <pane> <target>")?;
                let target = required_handle(&args, 1, "swap_pane <pane> <target>")?;
                self.swap_panes(pane, target, focus_flag(&args)?).await?;
                Ok(ok())
            }
            "break_pane" => {
                let created = self
                    .break_pane(
                        handle_option(&args, "pane")?,
                        handle_option(&args, "surface")?,
                        focus_flag(&args)?,
                    )
                    .await?;
                Ok(ok_id(created.workspace_id))
            }
            "join_pane" => {
                let target = required_handle(&args, 0, "join_pane <target pane>")?;
                self.join_pane(
                    target,
                    handle_option(&args, "pane")?,
                    handle_option(&args, "surface")?,
                    focus_flag(&args)?,
                )
                .await?;
                Ok(ok())
            }
            "last_pane" => Ok(ok_id(self.last_pane(None).await?)),

            // Surfaces
            "list_surfaces" => {
                let (_, surfaces) = self.list_surfaces(handle_at(&args, 0)?).await?;
                Ok(rows(
                    surfaces
                        .iter()
                        .map(|s| format!("{}{}: {}", marker(s.focused), s.index, s.id)),
                    "No surfaces",
                ))
            }
            "focus_surface" => {
                let surface = required_handle(&args, 0, "focus_surface <surface>")?;
                self.focus_surface(surface, None).await?;
                Ok(ok())
            }
            "new_split" => {
                let direction: SplitDirection = required(&args, 0, "new_split <left|right|up|down>")?.parse()?;
                let created = self
                    .split_surface(
                        direction,
                        handle_option(&args, "surface")?,
                        surface_type(&args)?,
                        url_option(&args)?,
                    )
                    .await?;
                Ok(ok_id(created.surface_id))
            }
            "new_surface" => {
                let (_, surface) = self
                    .create_surface(
                        handle_option(&args, "pane")?,
                        None,
                        surface_type(&args)?,
                        url_option(&args)?,
                    )
                    .await?;
                Ok(ok_id(surface))
            }
            "close_surface" => {
                self.close_surface(handle_at(&args, 0)?, None).await?;
                Ok(ok())
            }
            "move_surface" => {
                let surface = required_handle(&args, 0, "move_surface <surface> --pane=<pane>")?;
                let target = MoveTarget {
                    pane: handle_option(&args, "pane")?,
                    workspace: handle_option(&args, "workspace")?,
                    window: handle_option(&args, "window")?,
                };
                self.move_surface(surface, target, position(&args)?, focus_flag(&args)?)
                    .await?;
                Ok(ok())
            }
            "reorder_surface" => {
                let surface = required_handle(&args, 0, "reorder_surface <surface> --index=<n>")?;
                let index = self.reorder_surface(surface, position(&args)?).await?;
                Ok(format!("OK {}", index))
            }
            "trigger_flash" => {
                self.trigger_flash(handle_at(&args, 0)?).await?;
                Ok(ok())
            }

            // Browser
            "open_browser" => {
                let created = self
                    .open_browser(
                        args.positional(0).map(str::to_string),
                        handle_option(&args, "surface")?,
                        direction_option(&args)?,
                    )
                    .await?;
                Ok(ok_id(created.surface_id))
            }
            "navigate" => {
                let surface = required_handle(&args, 0, "navigate <surface> <url>")?;
                let url = required(&args, 1, "navigate <surface> <url>")?;
                let location = self.navigate(Some(surface), url).await?;
                Ok(format!("OK {}", location.url))
            }
            "browser_back" => {
                let location = self.browser_back(handle_at(&args, 0)?).await?;
                Ok(format!("OK {}", location.url))
            }
            "browser_forward" => {
                let location = self.browser_forward(handle_at(&args, 0)?).await?;
                Ok(format!("OK {}", location.url))
            }
            "get_url" => Ok(self.browser_url(handle_at(&args, 0)?).await?.url),

            // Notifications
            "list_notifications" => {
                let notifications = self.list_notifications().await;
                Ok(rows(
                    notifications
                        .iter()
                        .enumerate()
                        .map(|(i, n)| format!("{}:{}", i, n.row())),
                    "No notifications",
                ))
            }
            "clear_notifications" => {
                self.clear_notifications().await;
                Ok(ok())
            }

            // Sidebar
            "report_meta" | "report_meta_block" => {
                let kind = if name == "report_meta" {
                    EntryKind::Status
                } else {
                    EntryKind::Block
                };
                self.report_entry(kind, &args).await
            }
            "clear_meta" | "clear_meta_block" => {
                let kind = if name == "clear_meta" {
                    EntryKind::Status
                } else {
                    EntryKind::Block
                };
                let key = required(&args, 0, "clear_meta <key>")?.to_string();
                self.sidebar_write(&args, MetadataOp::Clear(kind, key)).await
            }
            "list_meta" | "list_meta_blocks" => {
                let (kind, empty) = if name == "list_meta" {
                    (EntryKind::Status, "No metadata")
                } else {
                    (EntryKind::Block, "No metadata blocks")
                };
                let lines = self.metadata_rows(scope(&args)?, kind).await?;
                Ok(rows(lines.into_iter(), empty))
            }
            "log" => {
                let message = args
                    .text_from(0)
                    .ok_or_else(|| CommandError::invalid_params("Usage: log [--level=<level>] -- <message>"))?;
                let entry = LogEntry {
                    level: args.option_value("level")?.unwrap_or("info").to_string(),
                    source: args.option_value("source")?.map(str::to_string),
                    message,
                };
                self.sidebar_write(&args, MetadataOp::Log(entry)).await
            }
            "set_progress" => {
                let raw = required(&args, 0, "set_progress <0.0-1.0>")?;
                let value: f64 = raw
                    .parse()
                    .map_err(|_| CommandError::invalid_params(format!("Invalid progress: {}", raw)))?;
                let progress = Progress::new(value, args.option_value("label")?.map(str::to_string))?;
                self.sidebar_write(&args, MetadataOp::SetProgress(progress)).await
            }
            "clear_progress" => self.sidebar_write(&args, MetadataOp::ClearProgress).await,
            "report_git_branch" => {
                let branch = GitBranch {
                    branch: required(&args, 0, "report_git_branch <branch>")?.to_string(),
                    status: args.option_value("status")?.map(str::to_string),
                };
                self.sidebar_write(&args, MetadataOp::SetGitBranch(branch)).await
            }
            "clear_git_branch" => self.sidebar_write(&args, MetadataOp::ClearGitBranch).await,
            "report_pr" | "report_review" => {
                let default_label = if name == "report_pr" {
                    DEFAULT_PR_LABEL
                } else {
                    DEFAULT_REVIEW_LABEL
                };
                self.report_pull_request(&args, default_label).await
            }
            "clear_pr" => {
                self.sidebar_write(&args, MetadataOp::ClearPullRequest).await
            }
            "report_ports" => {
                if args.positional.is_empty() {
                    return Err(CommandError::invalid_params("Usage: report_ports <port>..."));
                }
                let ports = args
                    .positional
                    .iter()
                    .map(|p| {
                        p.parse::<u16>()
                            .map_err(|_| CommandError::invalid_params(format!("Invalid port: {}", p)))
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.sidebar_write(&args, MetadataOp::SetPorts(ports)).await
            }
            "clear_ports" => self.sidebar_write(&args, MetadataOp::ClearPorts).await,
            "sidebar_state" => {
                self.sidebar_state(scope(&args)?).await
            }
            "reset_sidebar" => self.sidebar_write(&args, MetadataOp::Reset).await,

            // Debug
            "flash_count" => {
                let (_, count) = self.flash_count(handle_at(&args, 0)?).await?;
                Ok(format!("OK {}", count))
            }
            "reset_flash_counts" => {
                self.reset_flash_counts().await;
                Ok(ok())
            }
            "surface_input" => {
                let (_, input) = self.drain_input(handle_at(&args, 0)?).await?;
                Ok(rows(
                    input.iter().map(|item| match item {
                        SurfaceInput::Text(text) => format!("text:{}", text.escape_default()),
                        SurfaceInput::Key(key) => format!("key:{}", key),
                    }),
                    "No input",
                ))
            }

            _ => Err(CommandError::unknown_command(&command.name)),
        }
    }

    /// Commands whose argument text is taken verbatim rather than tokenized
    async fn dispatch_raw(&mut self, name: &str, raw: &str) -> Result<String> {
        match name {
            "auth" => {
                let password = raw.trim();
                if password.is_empty() {
                    return Err(CommandError::invalid_params("Usage: auth <password>"));
                }
                match self.login(password)? {
                    AuthOutcome::Authenticated => Ok("OK: Authenticated".to_string()),
                    AuthOutcome::NotRequired => Ok("OK: Authentication not required".to_string()),
                }
            }
            "send" => {
                let text = non_empty(raw, "send <text>")?;
                self.send_input(None, SurfaceInput::Text(unescape_controls(text)))
                    .await?;
                Ok(ok())
            }
            "send_surface" => {
                let (surface, text) = split_target(raw, "send_surface <surface> <text>")?;
                self.send_input(Some(surface), SurfaceInput::Text(unescape_controls(text)))
                    .await?;
                Ok(ok())
            }
            "send_key" => {
                let key = non_empty(raw, "send_key <key>")?;
                self.send_input(None, SurfaceInput::Key(key.to_string()))
                    .await?;
                Ok(ok())
            }
            "send_key_surface" => {
                let (surface, key) = split_target(raw, "send_key_surface <surface> <key>")?;
                self.send_input(Some(surface), SurfaceInput::Key(key.to_string()))
                    .await?;
                Ok(ok())
            }
            "notify" => {
                let (title, subtitle, body) = split_payload(non_empty(raw, "notify <title>|<subtitle>|<body>")?);
                let id = self.notify(None, title, subtitle, body).await?;
                Ok(ok_id(id))
            }
            "notify_surface" => {
                let (surface, payload) =
                    split_target(raw, "notify_surface <surface> <title>|<subtitle>|<body>")?;
                let (title, subtitle, body) = split_payload(payload);
                let id = self.notify(Some(surface), title, subtitle, body).await?;
                Ok(ok_id(id))
            }
            _ => Err(CommandError::unknown_command(name)),
        }
    }

    fn help(&self) -> String {
        let mut names: Vec<&str> = COMMANDS.iter().map(|&(name, _)| name).collect();
        if self.shared.config.protocol.debug_methods {
            names.extend(DEBUG_COMMANDS.iter().map(|&(name, _)| name));
        }
        names.extend(
            self.shared
                .aliases
                .accepted_spellings()
                .into_iter()
                .filter(|spelling| grammar_of(COMMANDS, spelling).is_none()),
        );
        let mut out = String::from("Available commands:");
        for name in names {
            out.push_str("\n  ");
            out.push_str(name);
        }
        out
    }

    /// Sidebar writes share `--tab` handling and always reply `OK`
    async fn sidebar_write(&self, args: &CommandArgs, op: MetadataOp) -> Result<String> {
        self.write_metadata(scope(args)?, op).await?;
        Ok(ok())
    }

    async fn report_entry(&self, kind: EntryKind, args: &CommandArgs) -> Result<String> {
        let key = required(args, 0, "report_meta <key> -- <value>")?.to_string();
        let value = args
            .text_from(1)
            .ok_or_else(|| CommandError::invalid_params(format!("Missing value for {}", key)))?;
        let format = match (kind, args.option_value("format")?) {
            (EntryKind::Block, _) => EntryFormat::Markdown,
            (EntryKind::Status, Some(format)) => format.parse::<EntryFormat>()?,
            (EntryKind::Status, None) => EntryFormat::Plain,
        };
        let write = EntryWrite {
            key,
            value,
            icon: args.option_value("icon")?.map(str::to_string),
            color: args.option_value("color")?.map(str::to_string),
            url: args.option_value("url")?.map(str::to_string),
            priority: parse_priority(args.option_value("priority")?)?,
            format,
        };
        self.sidebar_write(args, MetadataOp::Report(kind, write)).await
    }

    async fn report_pull_request(&self, args: &CommandArgs, default_label: &str) -> Result<String> {
        let usage = "report_pr <number> <url> [--state=<state>]";
        let raw = required(args, 0, usage)?;
        let number = raw
            .trim_start_matches('#')
            .parse::<u64>()
            .map_err(|_| CommandError::invalid_params(format!("Invalid PR number: {}", raw)))?;
        let url = required(args, 1, usage)?.to_string();
        let panel = self.resolve_panel(handle_option(args, "panel")?).await?;
        let pr = PullRequest {
            number,
            url,
            state: args.option_value("state")?.unwrap_or("open").to_string(),
            label: args.option_value("label")?.unwrap_or(default_label).to_string(),
            panel,
        };
        self.sidebar_write(args, MetadataOp::SetPullRequest(pr)).await
    }
}

fn ok() -> String {
    "OK".to_string()
}

fn ok_id(id: Uuid) -> String {
    format!("OK {}", id)
}

fn marker(selected: bool) -> &'static str {
    if selected {
        "* "
    } else {
        "  "
    }
}

fn rows(lines: impl Iterator<Item = String>, empty: &str) -> String {
    let out: Vec<String> = lines.collect();
    if out.is_empty() {
        empty.to_string()
    } else {
        out.join("\n")
    }
}

fn required<'a>(args: &'a CommandArgs, index: usize, usage: &str) -> Result<&'a str> {
    args.positional(index)
        .ok_or_else(|| CommandError::invalid_params(format!("Usage: {}", usage)))
}

fn required_handle(args: &CommandArgs, index: usize, usage: &str) -> Result<Handle> {
    Ok(Handle::parse(required(args, index, usage)?)?)
}

fn handle_at(args: &CommandArgs, index: usize) -> Result<Option<Handle>> {
    Ok(args.positional(index).map(Handle::parse).transpose()?)
}

fn handle_option(args: &CommandArgs, name: &str) -> Result<Option<Handle>> {
    Ok(args.option_value(name)?.map(Handle::parse).transpose()?)
}

fn url_option(args: &CommandArgs) -> Result<Option<String>> {
    Ok(args.option_value("url")?.map(str::to_string))
}

fn surface_type(args: &CommandArgs) -> Result<SurfaceType> {
    args.option_value("type")?
        .map(str::parse::<SurfaceType>)
        .transpose()
        .map(|kind| kind.unwrap_or(SurfaceType::Terminal))
}

fn direction_option(args: &CommandArgs) -> Result<SplitDirection> {
    args.option_value("direction")?
        .map(str::parse::<SplitDirection>)
        .transpose()
        .map(|direction| direction.unwrap_or(SplitDirection::Right))
}

/// `--focus` alone or `--focus=true|false`; focusing is the default
fn focus_flag(args: &CommandArgs) -> Result<bool> {
    if !args.has_option("focus") {
        return Ok(true);
    }
    match args.option("focus") {
        None | Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(CommandError::invalid_params(format!(
            "Invalid value for --focus: {}",
            other
        ))),
    }
}

fn position(args: &CommandArgs) -> Result<Position> {
    let index = args
        .option_value("index")?
        .map(|raw| {
            parse_ordinal(raw)
                .ok_or_else(|| CommandError::invalid_params(format!("Invalid index: {}", raw)))
        })
        .transpose()?;
    Ok(Position {
        index,
        before: handle_option(args, "before")?,
        after: handle_option(args, "after")?,
    })
}

fn scope(args: &CommandArgs) -> Result<ScopeTarget> {
    ScopeTarget::parse(args.option_value("tab")?)
}

fn non_empty<'a>(raw: &'a str, usage: &str) -> Result<&'a str> {
    if raw.trim().is_empty() {
        Err(CommandError::invalid_params(format!("Usage: {}", usage)))
    } else {
        Ok(raw)
    }
}

/// Split `<handle> <rest>` without tokenizing the rest
fn split_target<'a>(raw: &'a str, usage: &str) -> Result<(Handle, &'a str)> {
    let (target, rest) = raw
        .trim_start()
        .split_once(char::is_whitespace)
        .ok_or_else(|| CommandError::invalid_params(format!("Usage: {}", usage)))?;
    let rest = rest.trim_start();
    if rest.is_empty() {
        return Err(CommandError::invalid_params(format!("Usage: {}", usage)));
    }
    Ok((Handle::parse(target)?, rest))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, context_with};
    use super::super::AuthState;
    use super::*;
    use crate::config::{AppConfig, SocketMode, V1Spellings};

    async fn send(ctx: &mut HandlerContext, line: &str) -> String {
        ctx.handle_v1(line).await
    }

    fn ids(listing: &str) -> Vec<String> {
        listing
            .lines()
            .map(|row| row[2..].split_whitespace().nth(1).unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_ping_and_unknown() {
        let mut ctx = context();
        assert_eq!(send(&mut ctx, "ping").await, "PONG");
        assert_eq!(
            send(&mut ctx, "frobnicate --now").await,
            "ERROR: Unknown command frobnicate"
        );
    }

    #[tokio::test]
    async fn test_ordinal_is_resolved_live() {
        let mut ctx = context();
        send(&mut ctx, "new_workspace").await;
        let before = ids(&send(&mut ctx, "list_workspaces").await);
        assert_eq!(before.len(), 2);

        let created = send(&mut ctx, "new_workspace").await;
        let w3 = created.strip_prefix("OK ").unwrap().to_string();

        assert_eq!(send(&mut ctx, "select_workspace 0").await, "OK");
        assert_eq!(send(&mut ctx, "select_workspace 2").await, "OK");
        assert_eq!(send(&mut ctx, "current_workspace").await, w3);
    }

    #[tokio::test]
    async fn test_listing_formats() {
        let mut ctx = context();
        let listing = send(&mut ctx, "list_workspaces").await;
        assert!(listing.starts_with("* 0: "), "{listing}");
        assert!(listing.ends_with(" Workspace 1"), "{listing}");

        let split = send(&mut ctx, "new_split right").await;
        let surface = split.strip_prefix("OK ").unwrap();

        let panes = send(&mut ctx, "list_panes").await;
        assert_eq!(panes.lines().count(), 2);
        assert!(panes.lines().all(|row| row.ends_with("[1 surfaces]")));
        assert!(panes.lines().nth(1).unwrap().starts_with("* 1: "));

        let surfaces = send(&mut ctx, "list_surfaces").await;
        assert_eq!(surfaces.lines().nth(1).unwrap(), format!("* 1: {}", surface));

        let in_pane = send(&mut ctx, "list_pane_surfaces --pane=1").await;
        assert!(in_pane.ends_with(&format!("[panel:{}]", surface)), "{in_pane}");
    }

    #[tokio::test]
    async fn test_legacy_empty_listing_text() {
        let mut ctx = context();
        let window = send(&mut ctx, "current_window").await;
        send(&mut ctx, "close_workspace 0").await;
        assert_eq!(
            send(&mut ctx, &format!("list_tabs --window={}", window)).await,
            "No tabs"
        );
        assert_eq!(
            send(&mut ctx, &format!("list_workspaces --window={}", window)).await,
            "No workspaces"
        );
    }

    #[tokio::test]
    async fn test_refused_spelling_drives_fallback() {
        let mut config = AppConfig::default();
        config.protocol.v1_spellings = V1Spellings::Legacy;
        let mut ctx = context_with(config, AuthState::Open);

        assert_eq!(
            send(&mut ctx, "list_workspaces").await,
            "ERROR: Unknown command list_workspaces"
        );
        assert!(send(&mut ctx, "list_tabs").await.starts_with("* 0: "));
    }

    #[tokio::test]
    async fn test_password_gate() {
        let mut config = AppConfig::default();
        config.socket.mode = SocketMode::Password;
        config.socket.password = Some("hunter2".into());
        let mut ctx = context_with(config, AuthState::Pending);

        assert!(send(&mut ctx, "ping").await.starts_with("ERROR: Authentication required"));
        assert_eq!(send(&mut ctx, "auth wrong").await, "ERROR: Invalid password");
        assert!(send(&mut ctx, "ping").await.starts_with("ERROR: Authentication required"));
        assert_eq!(send(&mut ctx, "auth hunter2").await, "OK: Authenticated");
        assert_eq!(send(&mut ctx, "ping").await, "PONG");
    }

    #[tokio::test]
    async fn test_auth_not_required_outside_password_mode() {
        let mut ctx = context();
        assert_eq!(send(&mut ctx, "auth anything").await, "OK: Authentication not required");
    }

    #[tokio::test]
    async fn test_metadata_priority_listing() {
        let mut ctx = context();
        let ws = send(&mut ctx, "current_workspace").await;
        for (key, priority) in [("fifty", 50), ("ten", 10), ("eighty", 80)] {
            let line = format!("report_meta {} --priority={} --tab={} -- value", key, priority, ws);
            assert_eq!(send(&mut ctx, &line).await, "OK");
        }
        let keys = |listing: String| -> Vec<String> {
            listing
                .lines()
                .map(|row| row.split('=').next().unwrap().to_string())
                .collect()
        };
        assert_eq!(
            keys(send(&mut ctx, "list_meta").await),
            vec!["eighty", "fifty", "ten"]
        );

        assert_eq!(send(&mut ctx, &format!("clear_meta fifty --tab={}", ws)).await, "OK");
        assert_eq!(keys(send(&mut ctx, "list_meta").await), vec!["eighty", "ten"]);
    }

    #[tokio::test]
    async fn test_value_after_separator_may_look_like_option() {
        let mut ctx = context();
        assert_eq!(
            send(&mut ctx, "set_status build --icon=hammer -- --not-an-option").await,
            "OK"
        );
        let listing = send(&mut ctx, "list_meta").await;
        assert_eq!(
            listing,
            "build=--not-an-option icon=hammer priority=0 format=plain"
        );
        assert!(send(&mut ctx, "report_meta build --bogus=1 -- x")
            .await
            .starts_with("ERROR: Unknown option --bogus"));
    }

    #[tokio::test]
    async fn test_every_command_rejects_unknown_options() {
        let mut ctx = context();
        for &(name, grammar) in COMMANDS.iter().chain(DEBUG_COMMANDS) {
            let reply = send(&mut ctx, &format!("{} --bogus", name)).await;
            match grammar {
                Options(_) => assert_eq!(reply, "ERROR: Unknown option --bogus", "{name}"),
                Verbatim => assert!(!reply.contains("Unknown option"), "{name}: {reply}"),
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_option_checked_before_handler_runs() {
        let mut ctx = context();
        assert_eq!(
            send(&mut ctx, "clear_progress --bogus=1").await,
            "ERROR: Unknown option --bogus"
        );
        assert_eq!(
            send(&mut ctx, "focus_pane 0 --bogus").await,
            "ERROR: Unknown option --bogus"
        );
        assert_eq!(
            send(&mut ctx, "current_tab --bogus").await,
            "ERROR: Unknown option --bogus"
        );
        assert_eq!(send(&mut ctx, "clear_ports --tab=0").await, "OK");
        assert_eq!(
            send(&mut ctx, "close_workspace 0 --bogus").await,
            "ERROR: Unknown option --bogus"
        );
        assert_eq!(send(&mut ctx, "list_workspaces").await.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_signed_ordinals_are_invalid() {
        let mut ctx = context();
        assert_eq!(send(&mut ctx, "select_workspace +0").await, "ERROR: Invalid id: +0");
        assert_eq!(
            send(&mut ctx, "focus_pane workspace:+0").await,
            "ERROR: Invalid id: workspace:+0"
        );
        send(&mut ctx, "new_workspace").await;
        assert_eq!(
            send(&mut ctx, "reorder_workspace 1 --index=+0").await,
            "ERROR: Invalid index: +0"
        );
        assert_eq!(send(&mut ctx, "select_workspace 0").await, "OK");
    }

    #[tokio::test]
    async fn test_sidebar_write_to_unknown_workspace_errors() {
        let mut ctx = context();
        let missing = Uuid::new_v4();
        let expected = format!("ERROR: Workspace not found: {}", missing);
        assert_eq!(
            send(&mut ctx, &format!("report_meta k --tab={} -- v", missing)).await,
            expected
        );
        assert_eq!(
            send(&mut ctx, &format!("set_progress 0.5 --tab={}", missing)).await,
            expected
        );
        assert_eq!(
            send(&mut ctx, &format!("list_meta --tab={}", missing)).await,
            expected
        );
    }

    #[tokio::test]
    async fn test_pull_request_round_trip() {
        let mut ctx = context();
        let url = "https://example.com/pr/7";
        send(&mut ctx, &format!("report_pr 7 {} --state=open", url)).await;
        send(&mut ctx, &format!("report_pr 7 {} --state=merged", url)).await;

        let state = send(&mut ctx, "sidebar_state").await;
        let pr: Vec<&str> = state.lines().filter(|l| l.starts_with("pr=")).collect();
        assert_eq!(pr, vec![format!("pr=#7 merged {}", url).as_str()]);
        assert!(state.lines().any(|l| l == "pr_label=PR"));

        send(&mut ctx, "clear_pr").await;
        let state = send(&mut ctx, "sidebar_state").await;
        assert!(state.lines().any(|l| l == "pr=none"));
        assert!(state.lines().any(|l| l == "pr_label=none"));

        send(&mut ctx, &format!("report_review 8 {}", url)).await;
        let state = send(&mut ctx, "sidebar_state").await;
        assert!(state.lines().any(|l| l == "pr_label=Review"));
    }

    #[tokio::test]
    async fn test_notifications() {
        let mut ctx = context();
        assert_eq!(send(&mut ctx, "list_notifications").await, "No notifications");
        assert!(send(&mut ctx, "notify Build|ci|passed").await.starts_with("OK "));

        let listing = send(&mut ctx, "list_notifications").await;
        assert!(listing.starts_with("0:"));
        assert!(listing.ends_with("|unread|Build|ci|passed"), "{listing}");

        assert_eq!(send(&mut ctx, "clear_notifications").await, "OK");
        assert_eq!(send(&mut ctx, "list_notifications").await, "No notifications");
    }

    #[tokio::test]
    async fn test_send_keeps_text_verbatim() {
        let mut ctx = context();
        assert_eq!(send(&mut ctx, r#"send echo "a  b"\n"#).await, "OK");
        assert_eq!(send(&mut ctx, "send_key enter").await, "OK");
        assert_eq!(
            send(&mut ctx, "surface_input").await,
            "text:echo \\\"a  b\\\"\\n\nkey:enter"
        );
    }

    #[tokio::test]
    async fn test_debug_commands_hidden_when_disabled() {
        let mut config = AppConfig::default();
        config.protocol.debug_methods = false;
        let mut ctx = context_with(config, AuthState::Open);
        assert_eq!(
            send(&mut ctx, "flash_count").await,
            "ERROR: Unknown command flash_count"
        );
    }

    #[tokio::test]
    async fn test_flash_count() {
        let mut ctx = context();
        send(&mut ctx, "trigger_flash").await;
        send(&mut ctx, "trigger_flash").await;
        assert_eq!(send(&mut ctx, "flash_count").await, "OK 2");
        send(&mut ctx, "reset_flash_counts").await;
        assert_eq!(send(&mut ctx, "flash_count").await, "OK 0");
    }
}
