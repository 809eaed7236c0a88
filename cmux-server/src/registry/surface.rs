//! Surfaces: terminal and browser views

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cmux_protocol::CommandError;

/// What a surface displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceType {
    Terminal,
    Browser,
}

impl SurfaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceType::Terminal => "terminal",
            SurfaceType::Browser => "browser",
        }
    }
}

impl fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurfaceType {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "terminal" => Ok(SurfaceType::Terminal),
            "browser" => Ok(SurfaceType::Browser),
            other => Err(CommandError::invalid_params(format!(
                "Unknown surface type: {} (expected terminal or browser)",
                other
            ))),
        }
    }
}

/// Input queued for the terminal engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum SurfaceInput {
    Text(String),
    Key(String),
}

/// Back/forward history of a browser surface
#[derive(Debug, Clone)]
pub struct BrowserHistory {
    entries: Vec<String>,
    cursor: usize,
}

impl BrowserHistory {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            entries: vec![url.into()],
            cursor: 0,
        }
    }

    pub fn current(&self) -> &str {
        &self.entries[self.cursor]
    }

    /// Visit `url`, dropping any forward entries
    pub fn navigate(&mut self, url: impl Into<String>) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(url.into());
        self.cursor = self.entries.len() - 1;
    }

    /// Step back; returns false at the oldest entry
    pub fn back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Step forward; returns false at the newest entry
    pub fn forward(&mut self) -> bool {
        if self.cursor + 1 >= self.entries.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }
}

/// Default page for browser surfaces opened without a URL
pub const BLANK_PAGE: &str = "about:blank";

/// A terminal or browser view
#[derive(Debug, Clone)]
pub struct Surface {
    id: Uuid,
    kind: SurfaceType,
    title: String,
    browser: Option<BrowserHistory>,
    input: Vec<SurfaceInput>,
    flash_count: u64,
}

impl Surface {
    pub fn terminal() -> Self {
        Self::new(SurfaceType::Terminal, None)
    }

    pub fn new(kind: SurfaceType, url: Option<String>) -> Self {
        let browser = match kind {
            SurfaceType::Browser => Some(BrowserHistory::new(
                url.unwrap_or_else(|| BLANK_PAGE.to_string()),
            )),
            SurfaceType::Terminal => None,
        };
        let title = match &browser {
            Some(history) => history.current().to_string(),
            None => "Terminal".to_string(),
        };
        Self {
            id: Uuid::new_v4(),
            kind,
            title,
            browser,
            input: Vec::new(),
            flash_count: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> SurfaceType {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> Option<&str> {
        self.browser.as_ref().map(BrowserHistory::current)
    }

    pub fn browser(&self) -> Option<&BrowserHistory> {
        self.browser.as_ref()
    }

    /// Browser history, or an error for terminal surfaces
    pub fn browser_mut(&mut self) -> Result<&mut BrowserHistory, CommandError> {
        let id = self.id;
        self.browser
            .as_mut()
            .ok_or_else(|| CommandError::invalid_params(format!("Surface {} is not a browser", id)))
    }

    /// Keep the title in step with the page shown
    pub fn sync_title(&mut self) {
        if let Some(history) = &self.browser {
            self.title = history.current().to_string();
        }
    }

    /// Queue input for the terminal engine
    pub fn push_input(&mut self, input: SurfaceInput) -> Result<(), CommandError> {
        if self.kind != SurfaceType::Terminal {
            return Err(CommandError::invalid_params(format!(
                "Surface {} is not a terminal",
                self.id
            )));
        }
        self.input.push(input);
        Ok(())
    }

    /// Hand queued input over to the consumer
    pub fn drain_input(&mut self) -> Vec<SurfaceInput> {
        std::mem::take(&mut self.input)
    }

    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    pub fn flash(&mut self) {
        self.flash_count += 1;
    }

    pub fn flash_count(&self) -> u64 {
        self.flash_count
    }

    pub fn reset_flash_count(&mut self) {
        self.flash_count = 0;
    }
}
