use std::ffi::OsStr;
use std::sync::Arc;

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use tracing::{debug, info};

use crate::browser::navigation;
use crate::core::fingerprint::FingerprintGenerator;
use crate::core::{BrowserDriver, LaunchProfile, PageDriver, PageRect, WaitUntil};
use crate::errors::{Result, ScenaristError};

const NETWORK_IDLE_TIMEOUT_MS: u64 = 10_000;
const VISIBILITY_POLL_INTERVAL_MS: u64 = 100;
const JPEG_QUALITY: u32 = 80;

/// Headless chromium implementation of the driver seam.
#[derive(Default)]
pub struct ChromeBrowser {
    browser: Option<Browser>,
}

impl ChromeBrowser {
    pub fn new() -> Self {
        Self { browser: None }
    }
}

#[async_trait]
impl BrowserDriver for ChromeBrowser {
    type Page = ChromePage;

    async fn launch(&mut self, profile: &LaunchProfile) -> Result<()> {
        let fingerprint = profile.fingerprint.clone().unwrap_or_else(|| {
            FingerprintGenerator::new(profile.browser, profile.os, profile.screen).generate()
        });

        let window_size_arg = format!(
            "--window-size={},{}",
            fingerprint.screen.width, fingerprint.screen.height
        );
        let user_agent_arg = format!("--user-agent={}", fingerprint.user_agent);
        let lang_arg = format!("--lang={}", fingerprint.languages.join(","));
        let proxy_arg = profile
            .proxy
            .as_ref()
            .map(|p| format!("--proxy-server={}", p.server));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
            OsStr::new(&user_agent_arg),
            OsStr::new(&lang_arg),
        ];

        if profile.block_images {
            args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
        }
        if profile.block_webgl {
            args.push(OsStr::new("--disable-webgl"));
        }
        if let Some(ref arg) = proxy_arg {
            args.push(OsStr::new(arg));
        }
        if profile.geoip && profile.proxy.is_some() {
            // GeoIP consistency is delegated to the proxy exit node.
            debug!("geoip requested; relying on proxy exit for locale consistency");
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .args(args)
            .build()
            .map_err(|e| ScenaristError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| ScenaristError::LaunchFailed(e.to_string()))?;

        info!(user_agent = %fingerprint.user_agent, "browser launched");
        self.browser = Some(browser);
        Ok(())
    }

    async fn new_page(&self) -> Result<Self::Page> {
        let browser = self
            .browser
            .as_ref()
            .ok_or(ScenaristError::BrowserNotRunning)?;

        let tab = browser
            .new_tab()
            .map_err(|e| ScenaristError::PageCreationFailed(e.to_string()))?;

        Ok(ChromePage { tab })
    }

    fn is_running(&self) -> bool {
        self.browser.is_some()
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the handle tears down the child process and every tab.
        self.browser = None;
        Ok(())
    }
}

pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    async fn document_extent(&self) -> Result<PageRect> {
        let size = self
            .evaluate(
                r#"
                (function() {
                    const body = document.body;
                    const doc = document.documentElement;
                    return {
                        width: Math.max(doc.scrollWidth, body ? body.scrollWidth : 0),
                        height: Math.max(doc.scrollHeight, body ? body.scrollHeight : 0)
                    };
                })()
                "#,
            )
            .await?;

        Ok(PageRect {
            x: 0.0,
            y: 0.0,
            width: size.get("width").and_then(|v| v.as_f64()).unwrap_or(0.0),
            height: size.get("height").and_then(|v| v.as_f64()).unwrap_or(0.0),
        })
    }
}

/// Encode a string as a JS string literal for embedding in page scripts.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(&self, url: &str, wait_until: WaitUntil) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| ScenaristError::NavigationFailed(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| ScenaristError::NavigationFailed(e.to_string()))?;

        if wait_until == WaitUntil::NetworkIdle {
            navigation::wait_for_quiescence(self, NETWORK_IDLE_TIMEOUT_MS).await?;
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn wait_for_visible(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            if self.is_visible(selector).await? {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(ScenaristError::Timeout(format!(
                    "`{selector}` not visible within {timeout_ms}ms"
                )));
            }
            tokio::time::sleep(std::time::Duration::from_millis(VISIBILITY_POLL_INTERVAL_MS))
                .await;
        }
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let script = format!(
            r#"
            (function() {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                if (style.display === 'none' || style.visibility === 'hidden') return false;
                return el.getClientRects().length > 0;
            }})()
            "#,
            sel = js_string(selector)
        );
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.tab
            .find_element(selector)
            .map_err(|e| ScenaristError::ElementNotFound(format!("`{selector}`: {e}")))?
            .click()
            .map_err(|e| ScenaristError::Engine(e.to_string()))?;
        Ok(())
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<()> {
        let script = format!(
            r#"
            (function() {{
                const nodes = document.querySelectorAll({sel});
                if ({index} >= nodes.length) return false;
                nodes[{index}].click();
                return true;
            }})()
            "#,
            sel = js_string(selector),
            index = index
        );
        let clicked = self.evaluate(&script).await?.as_bool().unwrap_or(false);
        if clicked {
            Ok(())
        } else {
            Err(ScenaristError::ElementNotFound(format!(
                "`{selector}` has no match at index {index}"
            )))
        }
    }

    async fn hover(&self, selector: &str) -> Result<()> {
        self.tab
            .find_element(selector)
            .map_err(|e| ScenaristError::ElementNotFound(format!("`{selector}`: {e}")))?
            .move_mouse_over()
            .map_err(|e| ScenaristError::Engine(e.to_string()))?;
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        let script = format!(
            r#"
            (function() {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.scrollIntoView({{ behavior: 'smooth', block: 'center' }});
                return true;
            }})()
            "#,
            sel = js_string(selector)
        );
        let found = self.evaluate(&script).await?.as_bool().unwrap_or(false);
        if found {
            Ok(())
        } else {
            Err(ScenaristError::ElementNotFound(format!("`{selector}`")))
        }
    }

    async fn clear_value(&self, selector: &str) -> Result<()> {
        let script = format!(
            r#"
            (function() {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.value = '';
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                return true;
            }})()
            "#,
            sel = js_string(selector)
        );
        let cleared = self.evaluate(&script).await?.as_bool().unwrap_or(false);
        if cleared {
            Ok(())
        } else {
            Err(ScenaristError::ElementNotFound(format!("`{selector}`")))
        }
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        self.tab
            .find_element(selector)
            .map_err(|e| ScenaristError::ElementNotFound(format!("`{selector}`: {e}")))?
            .type_into(text)
            .map_err(|e| ScenaristError::Engine(e.to_string()))?;
        Ok(())
    }

    async fn select_value(&self, selector: &str, value: &str) -> Result<()> {
        let script = format!(
            r#"
            (function() {{
                const el = document.querySelector({sel});
                if (!el) return 'missing';
                const value = {value};
                const options = Array.from(el.options || []);
                if (!options.some((o) => o.value === value)) return 'invalid';
                el.value = value;
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return 'ok';
            }})()
            "#,
            sel = js_string(selector),
            value = js_string(value)
        );

        match self.evaluate(&script).await?.as_str() {
            Some("ok") => Ok(()),
            Some("invalid") => Err(ScenaristError::InvalidArgument(format!(
                "no option with value `{value}` on `{selector}`"
            ))),
            _ => Err(ScenaristError::ElementNotFound(format!("`{selector}`"))),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .tab
            .evaluate(script, true)
            .map_err(|e| ScenaristError::JavaScriptFailed(e.to_string()))?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    async fn evaluate_on_elements(&self, selector: &str, js_body: &str) -> Result<Vec<Value>> {
        let script = format!(
            r#"
            (function() {{
                const nodes = Array.from(document.querySelectorAll({sel}));
                return nodes.map((e) => {{
                    const result = (function(e) {{ {body} }})(e);
                    return result === undefined ? null : result;
                }});
            }})()
            "#,
            sel = js_string(selector),
            body = js_body
        );
        match self.evaluate(&script).await? {
            Value::Array(values) => Ok(values),
            Value::Null => Ok(Vec::new()),
            other => Err(ScenaristError::JavaScriptFailed(format!(
                "expected an array of per-element results, got {other}"
            ))),
        }
    }

    async fn bounding_box(&self, selector: &str) -> Result<PageRect> {
        let script = format!(
            r#"
            (function() {{
                const el = document.querySelector({sel});
                if (!el) return null;
                const rect = el.getBoundingClientRect();
                return {{ x: rect.x, y: rect.y, width: rect.width, height: rect.height }};
            }})()
            "#,
            sel = js_string(selector)
        );
        let rect = self.evaluate(&script).await?;
        if rect.is_null() {
            return Err(ScenaristError::ElementNotFound(format!("`{selector}`")));
        }
        Ok(serde_json::from_value(rect)?)
    }

    async fn screenshot_jpeg(&self, full_page: bool, clip: Option<PageRect>) -> Result<Vec<u8>> {
        let region = match clip {
            Some(rect) => Some(rect),
            None if full_page => Some(self.document_extent().await?),
            None => None,
        };

        let viewport = region.map(|r| Page::Viewport {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
            scale: 1.0,
        });

        self.tab
            .capture_screenshot(
                Page::CaptureScreenshotFormatOption::Jpeg,
                Some(JPEG_QUALITY),
                viewport,
                true,
            )
            .map_err(|e| ScenaristError::ScreenshotFailed(e.to_string()))
    }
}
