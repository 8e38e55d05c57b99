use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::config::LaunchProfile;
use crate::errors::Result;

/// A launchable browser engine owning any number of pages.
#[async_trait]
pub trait BrowserDriver: Send + Sync + 'static {
    type Page: PageDriver + 'static;

    /// Launch the underlying browser process with the given profile.
    async fn launch(&mut self, profile: &LaunchProfile) -> Result<()>;

    /// Open a fresh page/tab.
    async fn new_page(&self) -> Result<Self::Page>;

    fn is_running(&self) -> bool;

    /// Close the browser and every page it owns.
    async fn close(&mut self) -> Result<()>;
}

/// The page primitives the command interpreter composes.
///
/// Implementations must treat selectors as opaque CSS; escaping for any
/// embedded script execution is the implementation's responsibility.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and block until the load condition holds. One attempt;
    /// retry policy lives with the caller.
    async fn navigate(&self, url: &str, wait_until: WaitUntil) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Block until the first match for `selector` is visible, or time out.
    async fn wait_for_visible(&self, selector: &str, timeout_ms: u64) -> Result<()>;

    /// Non-blocking visibility probe.
    async fn is_visible(&self, selector: &str) -> Result<bool>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Click the nth match for `selector`.
    async fn click_nth(&self, selector: &str, index: usize) -> Result<()>;

    async fn hover(&self, selector: &str) -> Result<()>;

    async fn scroll_into_view(&self, selector: &str) -> Result<()>;

    /// Reset the element's value property.
    async fn clear_value(&self, selector: &str) -> Result<()>;

    /// Type text into the element as keystrokes.
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;

    /// Select the option with the given value on a `<select>` element.
    async fn select_value(&self, selector: &str, value: &str) -> Result<()>;

    /// Evaluate a script in page context and return its value.
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Run a script body against every match for `selector`, with the
    /// element bound as `e`. Results keep element order; elements whose
    /// script yields nothing contribute `null`.
    async fn evaluate_on_elements(&self, selector: &str, js_body: &str) -> Result<Vec<Value>>;

    async fn bounding_box(&self, selector: &str) -> Result<PageRect>;

    /// Capture a JPEG screenshot. `clip` bounds the capture to a region;
    /// otherwise `full_page` selects document or viewport extent.
    async fn screenshot_jpeg(&self, full_page: bool, clip: Option<PageRect>) -> Result<Vec<u8>>;
}

/// Load condition for `navigate`. Accepts both the wire spellings and the
/// SDK's Pascal-cased enum names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitUntil {
    #[serde(rename = "load", alias = "Load")]
    Load,
    #[serde(rename = "domcontentloaded", alias = "DOMContentLoaded")]
    DomContentLoaded,
    #[default]
    #[serde(rename = "networkidle", alias = "NetworkIdle")]
    NetworkIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}
