//! Scripted in-memory driver for exercising the registry, interpreter and
//! server without a real browser.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{BrowserDriver, LaunchProfile, PageDriver, PageRect, WaitUntil};
use crate::errors::{Result, ScenaristError};

/// Shared script and call log for a mock browser and all of its pages.
///
/// Pages created by one `MockBrowser` share this handle, so tests configure
/// behavior up front, hand the browser to the registry, and inspect the log
/// through their own clone.
#[derive(Debug, Default)]
pub struct MockBehavior {
    launched: AtomicBool,
    closed: AtomicBool,
    fail_close: AtomicBool,
    pages_created: AtomicUsize,

    nav_failures: AtomicUsize,
    navigations: Mutex<Vec<String>>,
    url: Mutex<Option<String>>,
    url_queries: AtomicUsize,

    visible: Mutex<HashSet<String>>,
    element_results: Mutex<HashMap<String, Vec<Value>>>,
    eval_results: Mutex<VecDeque<Value>>,
    screenshot: Mutex<Option<Vec<u8>>>,

    clicks: Mutex<Vec<String>>,
    nth_clicks: Mutex<Vec<(String, usize)>>,
    hovers: Mutex<Vec<String>>,
    cleared: Mutex<Vec<String>>,
    typed: Mutex<String>,
    selections: Mutex<Vec<(String, String)>>,
    clip_captures: AtomicUsize,
}

impl MockBehavior {
    // -- scripting ---------------------------------------------------------

    pub fn set_visible(&self, selector: &str) {
        self.visible.lock().unwrap().insert(selector.to_string());
    }

    pub fn set_element_results(&self, selector: &str, results: Vec<Value>) {
        self.element_results
            .lock()
            .unwrap()
            .insert(selector.to_string(), results);
    }

    pub fn push_eval_result(&self, value: Value) {
        self.eval_results.lock().unwrap().push_back(value);
    }

    pub fn set_screenshot(&self, bytes: Vec<u8>) {
        *self.screenshot.lock().unwrap() = Some(bytes);
    }

    pub fn set_url(&self, url: &str) {
        *self.url.lock().unwrap() = Some(url.to_string());
    }

    /// Make the next `n` navigation attempts fail.
    pub fn fail_navigations(&self, n: usize) {
        self.nav_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    // -- inspection --------------------------------------------------------

    pub fn launched(&self) -> bool {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pages_created(&self) -> usize {
        self.pages_created.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn url_queries(&self) -> usize {
        self.url_queries.load(Ordering::SeqCst)
    }

    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn nth_clicks(&self) -> Vec<(String, usize)> {
        self.nth_clicks.lock().unwrap().clone()
    }

    pub fn hovers(&self) -> Vec<String> {
        self.hovers.lock().unwrap().clone()
    }

    pub fn cleared(&self) -> Vec<String> {
        self.cleared.lock().unwrap().clone()
    }

    pub fn typed(&self) -> String {
        self.typed.lock().unwrap().clone()
    }

    pub fn selections(&self) -> Vec<(String, String)> {
        self.selections.lock().unwrap().clone()
    }

    pub fn queued_eval_results(&self) -> usize {
        self.eval_results.lock().unwrap().len()
    }

    pub fn clip_captures(&self) -> usize {
        self.clip_captures.load(Ordering::SeqCst)
    }

    fn is_visible(&self, selector: &str) -> bool {
        self.visible.lock().unwrap().contains(selector)
    }

    fn knows(&self, selector: &str) -> bool {
        self.is_visible(selector) || self.element_results.lock().unwrap().contains_key(selector)
    }
}

/// Mock implementation of [`BrowserDriver`]. `Default` yields a browser
/// whose pages succeed at navigation, evaluation and capture, with no
/// selector visible until scripted.
#[derive(Default)]
pub struct MockBrowser {
    pub behavior: Arc<MockBehavior>,
}

impl MockBrowser {
    pub fn with_behavior(behavior: Arc<MockBehavior>) -> Self {
        Self { behavior }
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    type Page = MockPage;

    async fn launch(&mut self, _profile: &LaunchProfile) -> Result<()> {
        self.behavior.launched.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn new_page(&self) -> Result<Self::Page> {
        self.behavior.pages_created.fetch_add(1, Ordering::SeqCst);
        Ok(MockPage::new(self.behavior.clone()))
    }

    fn is_running(&self) -> bool {
        self.behavior.launched() && !self.behavior.closed()
    }

    async fn close(&mut self) -> Result<()> {
        self.behavior.closed.store(true, Ordering::SeqCst);
        if self.behavior.fail_close.load(Ordering::SeqCst) {
            return Err(ScenaristError::Engine("mock close failure".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockPage {
    behavior: Arc<MockBehavior>,
}

impl MockPage {
    pub fn new(behavior: Arc<MockBehavior>) -> Self {
        Self { behavior }
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&self, url: &str, _wait_until: WaitUntil) -> Result<()> {
        self.behavior
            .navigations
            .lock()
            .unwrap()
            .push(url.to_string());

        let remaining = self.behavior.nav_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.behavior
                .nav_failures
                .store(remaining.saturating_sub(1), Ordering::SeqCst);
            return Err(ScenaristError::NavigationFailed(
                "mock navigation refused".to_string(),
            ));
        }

        *self.behavior.url.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.behavior.url_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .behavior
            .url
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn wait_for_visible(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        if self.behavior.is_visible(selector) {
            Ok(())
        } else {
            Err(ScenaristError::Timeout(format!(
                "`{selector}` not visible within {timeout_ms}ms"
            )))
        }
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        Ok(self.behavior.is_visible(selector))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        if !self.behavior.is_visible(selector) {
            return Err(ScenaristError::ElementNotFound(format!("`{selector}`")));
        }
        self.behavior.clicks.lock().unwrap().push(selector.to_string());
        Ok(())
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<()> {
        self.behavior
            .nth_clicks
            .lock()
            .unwrap()
            .push((selector.to_string(), index));
        Ok(())
    }

    async fn hover(&self, selector: &str) -> Result<()> {
        if !self.behavior.is_visible(selector) {
            return Err(ScenaristError::ElementNotFound(format!("`{selector}`")));
        }
        self.behavior.hovers.lock().unwrap().push(selector.to_string());
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        if self.behavior.knows(selector) {
            Ok(())
        } else {
            Err(ScenaristError::ElementNotFound(format!("`{selector}`")))
        }
    }

    async fn clear_value(&self, selector: &str) -> Result<()> {
        self.behavior.cleared.lock().unwrap().push(selector.to_string());
        Ok(())
    }

    async fn type_text(&self, _selector: &str, text: &str) -> Result<()> {
        self.behavior.typed.lock().unwrap().push_str(text);
        Ok(())
    }

    async fn select_value(&self, selector: &str, value: &str) -> Result<()> {
        let known = self
            .behavior
            .element_results
            .lock()
            .unwrap()
            .get(selector)
            .map(|values| values.iter().any(|v| v.as_str() == Some(value)))
            .unwrap_or(false);

        if !known {
            return Err(ScenaristError::InvalidArgument(format!(
                "no option with value `{value}` on `{selector}`"
            )));
        }
        self.behavior
            .selections
            .lock()
            .unwrap()
            .push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> Result<Value> {
        Ok(self
            .behavior
            .eval_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Value::Null))
    }

    async fn evaluate_on_elements(&self, selector: &str, _js_body: &str) -> Result<Vec<Value>> {
        Ok(self
            .behavior
            .element_results
            .lock()
            .unwrap()
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn bounding_box(&self, selector: &str) -> Result<PageRect> {
        if !self.behavior.knows(selector) {
            return Err(ScenaristError::ElementNotFound(format!("`{selector}`")));
        }
        Ok(PageRect {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 50.0,
        })
    }

    async fn screenshot_jpeg(&self, _full_page: bool, clip: Option<PageRect>) -> Result<Vec<u8>> {
        if clip.is_some() {
            self.behavior.clip_captures.fetch_add(1, Ordering::SeqCst);
        }
        Ok(self
            .behavior
            .screenshot
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| b"\xff\xd8mock-jpeg".to_vec()))
    }
}
