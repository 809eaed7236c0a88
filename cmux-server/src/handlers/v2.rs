//! v2 JSON-RPC dispatcher

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use cmux_protocol::{CommandError, Handle, RpcRequest, RpcResponse, PROTOCOL_VERSIONS};

use crate::config::SocketMode;
use crate::notifications::Notification;
use crate::registry::{Cycle, SplitDirection, SurfaceInput, SurfaceType};

use super::surface::{BrowserLocation, MoveTarget};
use super::{AuthOutcome, HandlerContext, Position, Result};

/// Methods every build serves
const METHODS: &[&str] = &[
    "system.ping",
    "system.capabilities",
    "system.identify",
    "auth.login",
    "window.list",
    "window.current",
    "window.create",
    "window.focus",
    "window.close",
    "workspace.list",
    "workspace.create",
    "workspace.select",
    "workspace.current",
    "workspace.rename",
    "workspace.next",
    "workspace.previous",
    "workspace.last",
    "workspace.close",
    "workspace.move_to_window",
    "workspace.reorder",
    "pane.list",
    "pane.focus",
    "pane.surfaces",
    "pane.create",
    "pane.swap",
    "pane.break",
    "pane.join",
    "pane.last",
    "surface.list",
    "surface.focus",
    "surface.split",
    "surface.create",
    "surface.close",
    "surface.move",
    "surface.reorder",
    "surface.send_text",
    "surface.send_key",
    "surface.trigger_flash",
    "browser.open_split",
    "browser.navigate",
    "browser.back",
    "browser.forward",
    "browser.url.get",
    "notification.create",
    "notification.create_for_surface",
    "notification.list",
    "notification.clear",
];

const DEBUG_METHODS: &[&str] = &["debug.flash.count", "debug.flash.reset", "debug.surface.input"];

/// Typed access to a request's `params` object
struct Params<'a>(&'a Value);

impl<'a> Params<'a> {
    fn get(&self, name: &str) -> Option<&'a Value> {
        match self.0.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn handle(&self, name: &str) -> Result<Option<Handle>> {
        Ok(self.get(name).map(Handle::from_json).transpose()?)
    }

    fn required_handle(&self, name: &str) -> Result<Handle> {
        self.handle(name)?.ok_or_else(|| missing(name))
    }

    fn str(&self, name: &str) -> Result<Option<&'a str>> {
        self.get(name)
            .map(|value| {
                value
                    .as_str()
                    .ok_or_else(|| CommandError::invalid_params(format!("{} must be a string", name)))
            })
            .transpose()
    }

    fn required_str(&self, name: &str) -> Result<&'a str> {
        self.str(name)?.ok_or_else(|| missing(name))
    }

    fn string(&self, name: &str) -> Result<String> {
        Ok(self.str(name)?.unwrap_or_default().to_string())
    }

    fn bool(&self, name: &str, default: bool) -> Result<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(CommandError::invalid_params(format!("{} must be a boolean", name))),
        }
    }

    fn usize(&self, name: &str) -> Result<Option<usize>> {
        self.get(name)
            .map(|value| {
                value
                    .as_u64()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| {
                        CommandError::invalid_params(format!("{} must be a non-negative integer", name))
                    })
            })
            .transpose()
    }

    fn direction(&self) -> Result<SplitDirection> {
        self.required_str("direction")?.parse()
    }

    fn surface_type(&self) -> Result<SurfaceType> {
        match self.str("type")? {
            Some(kind) => kind.parse(),
            None => Ok(SurfaceType::Terminal),
        }
    }

    fn url(&self) -> Result<Option<String>> {
        Ok(self.str("url")?.map(str::to_string))
    }

    /// `index`, `before_<kind>_id` or `after_<kind>_id`
    fn position(&self, kind: &str) -> Result<Position> {
        Ok(Position {
            index: self.usize("index")?,
            before: self.handle(&format!("before_{}_id", kind))?,
            after: self.handle(&format!("after_{}_id", kind))?,
        })
    }
}

fn missing(name: &str) -> CommandError {
    CommandError::invalid_params(format!("Missing required parameter: {}", name))
}

fn to_value(value: impl Serialize) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| CommandError::internal(e.to_string()))
}

fn location(location: BrowserLocation) -> Value {
    json!({
        "surface_id": location.surface_id,
        "url": location.url,
        "can_go_back": location.can_go_back,
        "can_go_forward": location.can_go_forward,
    })
}

impl HandlerContext {
    pub(super) async fn handle_v2(&mut self, line: &str) -> String {
        let request = match RpcRequest::parse(line) {
            Ok(request) => request,
            Err(response) => {
                debug!(conn = %self.connection_id, "Malformed v2 request");
                return response.to_line();
            }
        };

        if !self.auth.allows_commands() && request.method != "auth.login" {
            debug!(conn = %self.connection_id, method = %request.method, "Refused before login");
            return RpcResponse::failure(request.id, CommandError::auth_required()).to_line();
        }

        let params = Params(&request.params);
        match self.dispatch_v2(&request.method, &params).await {
            Ok(result) => RpcResponse::success(request.id, result).to_line(),
            Err(err) => {
                debug!(conn = %self.connection_id, method = %request.method, code = %err.code, "Method failed");
                RpcResponse::failure(request.id, err).to_line()
            }
        }
    }

    async fn dispatch_v2(&mut self, method: &str, params: &Params<'_>) -> Result<Value> {
        if method.starts_with("debug.") && !self.shared.config.protocol.debug_methods {
            return Err(CommandError::method_not_found(method));
        }

        match method {
            "system.ping" => Ok(json!({ "pong": true })),
            "system.capabilities" => Ok(self.capabilities()),
            "system.identify" => {
                let mut identity = to_value(self.identify().await)?;
                if let (Some(caller), Value::Object(map)) = (params.get("caller"), &mut identity) {
                    map.insert("caller".to_string(), caller.clone());
                }
                Ok(identity)
            }
            "auth.login" => {
                let outcome = self.login(params.required_str("password")?)?;
                Ok(json!({
                    "authenticated": outcome == AuthOutcome::Authenticated,
                    "required": outcome != AuthOutcome::NotRequired,
                }))
            }

            "window.list" => Ok(json!({ "windows": self.list_windows().await })),
            "window.current" => Ok(json!({ "window_id": self.current_window().await? })),
            "window.create" => {
                let created = self.create_window().await?;
                Ok(json!({
                    "window_id": created.window_id,
                    "workspace_id": created.workspace_id,
                }))
            }
            "window.focus" => {
                let id = self.focus_window(params.required_handle("window_id")?).await?;
                Ok(json!({ "window_id": id }))
            }
            "window.close" => {
                let id = self.close_window(params.handle("window_id")?).await?;
                Ok(json!({ "window_id": id }))
            }

            "workspace.list" => {
                let (window_id, workspaces) = self.list_workspaces(params.handle("window_id")?).await?;
                Ok(json!({ "window_id": window_id, "workspaces": workspaces }))
            }
            "workspace.create" => {
                let created = self.create_workspace(params.handle("window_id")?).await?;
                Ok(json!({
                    "workspace_id": created.workspace_id,
                    "window_id": created.window_id,
                }))
            }
            "workspace.select" => {
                let id = self
                    .select_workspace(
                        params.required_handle("workspace_id")?,
                        params.handle("window_id")?,
                    )
                    .await?;
                Ok(json!({ "workspace_id": id }))
            }
            "workspace.current" => {
                let id = self.current_workspace(params.handle("window_id")?).await?;
                Ok(json!({ "workspace_id": id }))
            }
            "workspace.rename" => {
                let id = self
                    .rename_workspace(params.handle("workspace_id")?, params.required_str("title")?)
                    .await?;
                Ok(json!({ "workspace_id": id }))
            }
            "workspace.next" | "workspace.previous" => {
                let direction = if method == "workspace.next" {
                    Cycle::Next
                } else {
                    Cycle::Previous
                };
                let id = self
                    .cycle_workspace(direction, params.handle("window_id")?)
                    .await?;
                Ok(json!({ "workspace_id": id }))
            }
            "workspace.last" => {
                let id = self.last_workspace(params.handle("window_id")?).await?;
                Ok(json!({ "workspace_id": id }))
            }
            "workspace.close" => {
                let id = self.close_workspace(params.handle("workspace_id")?).await?;
                Ok(json!({ "workspace_id": id }))
            }
            "workspace.move_to_window" => {
                let (workspace_id, window_id) = self
                    .move_workspace_to_window(
                        params.handle("workspace_id")?,
                        params.required_handle("window_id")?,
                        params.bool("focus", true)?,
                    )
                    .await?;
                Ok(json!({ "workspace_id": workspace_id, "window_id": window_id }))
            }
            "workspace.reorder" => {
                let index = self
                    .reorder_workspace(
                        params.required_handle("workspace_id")?,
                        params.position("workspace")?,
                        params.handle("window_id")?,
                    )
                    .await?;
                Ok(json!({ "index": index }))
            }

            "pane.list" => {
                let (workspace_id, panes) = self.list_panes(params.handle("workspace_id")?).await?;
                Ok(json!({ "workspace_id": workspace_id, "panes": panes }))
            }
            "pane.focus" => {
                let id = self
                    .focus_pane(params.required_handle("pane_id")?, params.handle("workspace_id")?)
                    .await?;
                Ok(json!({ "pane_id": id }))
            }
            "pane.surfaces" => {
                let (pane_id, surfaces) = self
                    .list_pane_surfaces(params.handle("pane_id")?, params.handle("workspace_id")?)
                    .await?;
                Ok(json!({ "pane_id": pane_id, "surfaces": surfaces }))
            }
            "pane.create" => {
                let created = self
                    .create_pane(
                        params.direction()?,
                        params.surface_type()?,
                        params.url()?,
                        params.handle("pane_id")?,
                        params.handle("workspace_id")?,
                    )
                    .await?;
                to_value(created)
            }
            "pane.swap" => {
                let (pane_id, target_pane_id) = self
                    .swap_panes(
                        params.required_handle("pane_id")?,
                        params.required_handle("target_pane_id")?,
                        params.bool("focus", true)?,
                    )
                    .await?;
                Ok(json!({ "pane_id": pane_id, "target_pane_id": target_pane_id }))
            }
            "pane.break" => {
                let created = self
                    .break_pane(
                        params.handle("pane_id")?,
                        params.handle("surface_id")?,
                        params.bool("focus", true)?,
                    )
                    .await?;
                to_value(created)
            }
            "pane.join" => {
                let (surface_id, pane_id) = self
                    .join_pane(
                        params.required_handle("target_pane_id")?,
                        params.handle("pane_id")?,
                        params.handle("surface_id")?,
                        params.bool("focus", true)?,
                    )
                    .await?;
                Ok(json!({ "surface_id": surface_id, "pane_id": pane_id }))
            }
            "pane.last" => {
                let id = self.last_pane(params.handle("workspace_id")?).await?;
                Ok(json!({ "pane_id": id }))
            }

            "surface.list" => {
                let (workspace_id, surfaces) =
                    self.list_surfaces(params.handle("workspace_id")?).await?;
                Ok(json!({ "workspace_id": workspace_id, "surfaces": surfaces }))
            }
            "surface.focus" => {
                let id = self
                    .focus_surface(
                        params.required_handle("surface_id")?,
                        params.handle("workspace_id")?,
                    )
                    .await?;
                Ok(json!({ "surface_id": id }))
            }
            "surface.split" => {
                let created = self
                    .split_surface(
                        params.direction()?,
                        params.handle("surface_id")?,
                        params.surface_type()?,
                        params.url()?,
                    )
                    .await?;
                to_value(created)
            }
            "surface.create" => {
                let (pane_id, surface_id) = self
                    .create_surface(
                        params.handle("pane_id")?,
                        params.handle("workspace_id")?,
                        params.surface_type()?,
                        params.url()?,
                    )
                    .await?;
                Ok(json!({ "pane_id": pane_id, "surface_id": surface_id }))
            }
            "surface.close" => {
                let id = self
                    .close_surface(params.handle("surface_id")?, params.handle("workspace_id")?)
                    .await?;
                Ok(json!({ "surface_id": id }))
            }
            "surface.move" => {
                let target = MoveTarget {
                    pane: params.handle("pane_id")?,
                    workspace: params.handle("workspace_id")?,
                    window: params.handle("window_id")?,
                };
                let id = self
                    .move_surface(
                        params.required_handle("surface_id")?,
                        target,
                        params.position("surface")?,
                        params.bool("focus", true)?,
                    )
                    .await?;
                Ok(json!({ "surface_id": id }))
            }
            "surface.reorder" => {
                let index = self
                    .reorder_surface(params.required_handle("surface_id")?, params.position("surface")?)
                    .await?;
                Ok(json!({ "index": index }))
            }
            "surface.send_text" | "surface.send_key" => {
                let input = if method == "surface.send_text" {
                    SurfaceInput::Text(params.required_str("text")?.to_string())
                } else {
                    SurfaceInput::Key(params.required_str("key")?.to_string())
                };
                let id = self.send_input(params.handle("surface_id")?, input).await?;
                Ok(json!({ "surface_id": id }))
            }
            "surface.trigger_flash" => {
                let id = self.trigger_flash(params.handle("surface_id")?).await?;
                Ok(json!({ "surface_id": id }))
            }

            "browser.open_split" => {
                let direction = match params.str("direction")? {
                    Some(direction) => direction.parse()?,
                    None => SplitDirection::Right,
                };
                let created = self
                    .open_browser(params.url()?, params.handle("surface_id")?, direction)
                    .await?;
                to_value(created)
            }
            "browser.navigate" => {
                let result = self
                    .navigate(params.handle("surface_id")?, params.required_str("url")?)
                    .await?;
                Ok(location(result))
            }
            "browser.back" => Ok(location(self.browser_back(params.handle("surface_id")?).await?)),
            "browser.forward" => Ok(location(
                self.browser_forward(params.handle("surface_id")?).await?,
            )),
            "browser.url.get" => Ok(location(self.browser_url(params.handle("surface_id")?).await?)),

            "notification.create" | "notification.create_for_surface" => {
                let surface = if method == "notification.create_for_surface" {
                    Some(params.required_handle("surface_id")?)
                } else {
                    None
                };
                let id = self
                    .notify(
                        surface,
                        params.string("title")?,
                        params.string("subtitle")?,
                        params.string("body")?,
                    )
                    .await?;
                Ok(json!({ "notification_id": id }))
            }
            "notification.list" => {
                let notifications: Vec<Notification> = self.list_notifications().await;
                Ok(json!({ "notifications": notifications }))
            }
            "notification.clear" => Ok(json!({ "cleared": self.clear_notifications().await })),

            "debug.flash.count" => {
                let (surface_id, count) = self.flash_count(params.handle("surface_id")?).await?;
                Ok(json!({ "surface_id": surface_id, "count": count }))
            }
            "debug.flash.reset" => {
                self.reset_flash_counts().await;
                Ok(json!({}))
            }
            "debug.surface.input" => {
                let (surface_id, input) = self.drain_input(params.handle("surface_id")?).await?;
                Ok(json!({ "surface_id": surface_id, "input": input }))
            }

            _ => {
                debug!(conn = %self.connection_id, method, "Unknown method");
                Err(CommandError::method_not_found(method))
            }
        }
    }

    fn capabilities(&self) -> Value {
        let debug = self.shared.config.protocol.debug_methods;
        let mut methods: Vec<&str> = METHODS.to_vec();
        if debug {
            methods.extend_from_slice(DEBUG_METHODS);
        }
        let mode = self.shared.gate.mode();
        json!({
            "protocol_versions": PROTOCOL_VERSIONS,
            "methods": methods,
            "debug": debug,
            "auth": {
                "mode": mode.as_str(),
                "required": mode == SocketMode::Password,
            },
            "v1_spellings": self.shared.aliases.accepted_spellings(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, context_with};
    use super::super::AuthState;
    use super::*;
    use crate::config::AppConfig;

    async fn call(ctx: &mut HandlerContext, line: &str) -> Value {
        serde_json::from_str(&ctx.handle_v2(line).await).unwrap()
    }

    #[tokio::test]
    async fn test_ping_line_is_exact() {
        let mut ctx = context();
        assert_eq!(
            ctx.handle_v2(r#"{"id":1,"method":"system.ping","params":{}}"#).await,
            r#"{"id":1,"ok":true,"result":{"pong":true}}"#
        );
    }

    #[tokio::test]
    async fn test_id_is_echoed_on_error() {
        let mut ctx = context();
        let reply = call(&mut ctx, r#"{"id":"abc","method":"nope.nothing"}"#).await;
        assert_eq!(reply["id"], "abc");
        assert_eq!(reply["ok"], false);
        assert_eq!(reply["error"]["code"], "method_not_found");

        let reply = call(&mut ctx, r#"{"id":7,"method":"surface.focus","params":{"surface_id":"garbage"}}"#).await;
        assert_eq!(reply["id"], 7);
        assert_eq!(reply["error"]["code"], "invalid_id");

        let reply = call(&mut ctx, "{not json").await;
        assert_eq!(reply["error"]["code"], "parse_error");
    }

    #[tokio::test]
    async fn test_auth_login_flow() {
        let mut config = AppConfig::default();
        config.socket.mode = SocketMode::Password;
        config.socket.password = Some("s3cret".into());
        let mut ctx = context_with(config, AuthState::Pending);

        let reply = call(&mut ctx, r#"{"id":1,"method":"workspace.list"}"#).await;
        assert_eq!(reply["error"]["code"], "auth_required");

        let reply = call(&mut ctx, r#"{"id":2,"method":"auth.login","params":{"password":"nope"}}"#).await;
        assert_eq!(reply["error"]["code"], "invalid_password");

        let reply = call(&mut ctx, r#"{"id":3,"method":"auth.login","params":{"password":"s3cret"}}"#).await;
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["result"]["authenticated"], true);

        let reply = call(&mut ctx, r#"{"id":4,"method":"workspace.list"}"#).await;
        assert_eq!(reply["ok"], true);
    }

    #[tokio::test]
    async fn test_debug_methods_are_optional() {
        let mut config = AppConfig::default();
        config.protocol.debug_methods = false;
        let mut ctx = context_with(config, AuthState::Open);

        let reply = call(&mut ctx, r#"{"id":1,"method":"debug.flash.count"}"#).await;
        assert_eq!(reply["error"]["code"], "method_not_found");

        let caps = call(&mut ctx, r#"{"id":2,"method":"system.capabilities"}"#).await;
        let methods = caps["result"]["methods"].as_array().unwrap();
        assert!(methods.iter().all(|m| !m.as_str().unwrap().starts_with("debug.")));
        assert_eq!(caps["result"]["protocol_versions"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_workspace_reorder_targets() {
        let mut ctx = context();
        call(&mut ctx, r#"{"id":1,"method":"workspace.create"}"#).await;
        let listing = call(&mut ctx, r#"{"id":2,"method":"workspace.list"}"#).await;
        let first = listing["result"]["workspaces"][0]["id"].as_str().unwrap().to_string();

        let both = json!({
            "id": 3,
            "method": "workspace.reorder",
            "params": {"workspace_id": first, "index": 1, "after_workspace_id": 1},
        });
        let reply = call(&mut ctx, &both.to_string()).await;
        assert_eq!(reply["error"]["code"], "invalid_params");

        let neither = json!({"id": 4, "method": "workspace.reorder", "params": {"workspace_id": first}});
        let reply = call(&mut ctx, &neither.to_string()).await;
        assert_eq!(reply["error"]["code"], "invalid_params");

        let ok = json!({"id": 5, "method": "workspace.reorder", "params": {"workspace_id": first, "index": 1}});
        let reply = call(&mut ctx, &ok.to_string()).await;
        assert_eq!(reply["result"]["index"], 1);

        let listing = call(&mut ctx, r#"{"id":6,"method":"workspace.list"}"#).await;
        assert_eq!(listing["result"]["workspaces"][1]["id"], first.as_str());
    }

    #[tokio::test]
    async fn test_split_and_identify() {
        let mut ctx = context();
        let split = call(
            &mut ctx,
            r#"{"id":1,"method":"surface.split","params":{"direction":"down"}}"#,
        )
        .await;
        let surface = split["result"]["surface_id"].clone();

        let identity = call(
            &mut ctx,
            r#"{"id":2,"method":"system.identify","params":{"caller":"test"}}"#,
        )
        .await;
        assert_eq!(identity["result"]["focused"]["surface_id"], surface);
        assert_eq!(identity["result"]["caller"], "test");

        let bad = call(
            &mut ctx,
            r#"{"id":3,"method":"surface.split","params":{"direction":"diagonal"}}"#,
        )
        .await;
        assert_eq!(bad["error"]["code"], "invalid_params");
    }

    #[tokio::test]
    async fn test_browser_methods() {
        let mut ctx = context();
        let opened = call(
            &mut ctx,
            r#"{"id":1,"method":"browser.open_split","params":{"url":"https://example.com"}}"#,
        )
        .await;
        let surface = opened["result"]["surface_id"].as_str().unwrap().to_string();

        let nav = json!({"id": 2, "method": "browser.navigate", "params": {"surface_id": surface, "url": "https://example.com/next"}});
        let reply = call(&mut ctx, &nav.to_string()).await;
        assert_eq!(reply["result"]["can_go_back"], true);

        let back = json!({"id": 3, "method": "browser.back", "params": {"surface_id": surface}});
        let reply = call(&mut ctx, &back.to_string()).await;
        assert_eq!(reply["result"]["url"], "https://example.com");
    }

    #[tokio::test]
    async fn test_notifications() {
        let mut ctx = context();
        call(
            &mut ctx,
            r#"{"id":1,"method":"notification.create","params":{"title":"Done","body":"tests passed"}}"#,
        )
        .await;
        let list = call(&mut ctx, r#"{"id":2,"method":"notification.list"}"#).await;
        let first = &list["result"]["notifications"][0];
        assert_eq!(first["title"], "Done");
        assert_eq!(first["subtitle"], "");
        assert_eq!(first["is_read"], false);

        let cleared = call(&mut ctx, r#"{"id":3,"method":"notification.clear"}"#).await;
        assert_eq!(cleared["result"]["cleared"], 1);
    }
}
