//! Maps one command onto page primitives, collapsing every failure into a
//! step outcome that names the command.

use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::Rng;
use serde_json::Value;
use tokio::time::sleep;
use tracing::debug;

use crate::core::PageDriver;
use crate::errors::{Result, ScenaristError};
use crate::scenario::command::*;
use crate::scenario::outcome::StepOutcome;

/// Wait budget for commands that wait on a selector without an explicit
/// timeout parameter (the engine default the wire contract assumes).
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

const URL_POLL_INTERVAL_MS: u64 = 100;
const PRESENCE_SETTLE_MS: u64 = 1000;
const PRESENCE_PROBE_MS: u64 = 2000;
const TYPING_DELAY_RANGE_MS: (u64, u64) = (90, 200);

/// Execute one command against a page. Never returns a process-level
/// error: failures become `StepOutcome::Error` with the command name as
/// prefix.
pub async fn execute<P: PageDriver + ?Sized>(page: &P, command: &Command) -> StepOutcome {
    let result = match command {
        Command::Navigate(p) => navigate(page, p).await,
        Command::Click(p) => click(page, p).await,
        Command::SelectRadio(p) => select_radio(page, p).await,
        Command::SelectOption(p) => select_option(page, p).await,
        Command::Scroll(p) => scroll(page, p).await,
        Command::Fill(p) => fill(page, p).await,
        Command::WaitForNavigation(p) => wait_for_navigation(page, p).await,
        Command::WaitForSelector(p) => wait_for_selector(page, p).await,
        Command::EvaluateScript(p) => evaluate_script(page, p).await,
        Command::EvaluateScriptOnElements(p) => evaluate_script_on_elements(page, p).await,
        Command::GetScreenshotBase64(p) => get_screenshot_base64(page, p).await,
        Command::IsElementOnPage(p) => is_element_on_page(page, p).await,
        Command::GetCaptchaBase64(p) => get_captcha_base64(page, p).await,
        Command::Wait(ms) => wait(*ms).await,
    };

    match result {
        Ok(outcome) => outcome,
        Err(e) => StepOutcome::Error(format!("{}: {}", command.name(), e)),
    }
}

async fn navigate<P: PageDriver + ?Sized>(page: &P, p: &NavigateParams) -> Result<StepOutcome> {
    url::Url::parse(&p.url)
        .map_err(|e| ScenaristError::InvalidArgument(format!("`{}`: {}", p.url, e)))?;

    let attempts = p.retry_count.max(1);
    let mut last_error = None;
    for attempt in 1..=attempts {
        match page.navigate(&p.url, p.wait_until).await {
            Ok(()) => return Ok(StepOutcome::Empty),
            Err(e) => {
                debug!(url = %p.url, attempt, error = %e, "navigation attempt failed");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or(ScenaristError::NavigationFailed("no attempt made".into())))
}

async fn click<P: PageDriver + ?Sized>(page: &P, p: &ClickParams) -> Result<StepOutcome> {
    page.wait_for_visible(&p.selector, p.timeout).await?;
    page.click(&p.selector).await?;
    sleep(Duration::from_millis(p.delay)).await;
    Ok(StepOutcome::Empty)
}

/// Clicks the first matching element whose value property equals the
/// requested value. No match is a silent success.
async fn select_radio<P: PageDriver + ?Sized>(page: &P, p: &SelectParams) -> Result<StepOutcome> {
    let values = page
        .evaluate_on_elements(&p.selector, "return e.value;")
        .await?;

    for (index, value) in values.iter().enumerate() {
        if value.as_str() == Some(p.value.as_str()) {
            page.click_nth(&p.selector, index).await?;
            break;
        }
    }
    Ok(StepOutcome::Empty)
}

async fn select_option<P: PageDriver + ?Sized>(page: &P, p: &SelectParams) -> Result<StepOutcome> {
    page.wait_for_visible(&p.selector, DEFAULT_WAIT_TIMEOUT_MS)
        .await?;
    page.click(&p.selector).await?;
    page.select_value(&p.selector, &p.value).await?;
    Ok(StepOutcome::Empty)
}

/// Best-effort: only a selector that never resolves is an error; an element
/// that stays out of view after the retries is not.
async fn scroll<P: PageDriver + ?Sized>(page: &P, p: &ScrollParams) -> Result<StepOutcome> {
    page.scroll_into_view(&p.selector).await?;

    for _ in 0..p.retry_count {
        if page.is_visible(&p.selector).await.unwrap_or(false) {
            break;
        }
        sleep(Duration::from_millis(p.delay)).await;
    }
    Ok(StepOutcome::Empty)
}

async fn fill<P: PageDriver + ?Sized>(page: &P, p: &FillParams) -> Result<StepOutcome> {
    page.wait_for_visible(&p.selector, DEFAULT_WAIT_TIMEOUT_MS)
        .await?;
    page.click(&p.selector).await?;
    page.clear_value(&p.selector).await?;

    let mut buf = [0u8; 4];
    for ch in p.value.chars() {
        let pause = {
            let mut rng = rand::thread_rng();
            rng.gen_range(TYPING_DELAY_RANGE_MS.0..=TYPING_DELAY_RANGE_MS.1)
        };
        sleep(Duration::from_millis(pause)).await;
        page.type_text(&p.selector, ch.encode_utf8(&mut buf)).await?;
    }
    Ok(StepOutcome::Empty)
}

async fn wait_for_navigation<P: PageDriver + ?Sized>(
    page: &P,
    p: &WaitForNavigationParams,
) -> Result<StepOutcome> {
    let parts: Vec<&str> = p
        .url_parts
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        return Err(ScenaristError::InvalidArgument(
            "at least one non-blank url_part is required".to_string(),
        ));
    }

    let start = Instant::now();
    let timeout = Duration::from_millis(p.timeout);
    loop {
        let url = page.current_url().await?;
        if parts.iter().any(|part| url.contains(part)) {
            return Ok(StepOutcome::Empty);
        }
        if start.elapsed() >= timeout {
            return Err(ScenaristError::Timeout(format!(
                "url `{url}` did not match any of {parts:?} within {}ms",
                p.timeout
            )));
        }
        sleep(Duration::from_millis(URL_POLL_INTERVAL_MS)).await;
    }
}

async fn wait_for_selector<P: PageDriver + ?Sized>(
    page: &P,
    p: &WaitForSelectorParams,
) -> Result<StepOutcome> {
    page.wait_for_visible(&p.selector, p.timeout).await?;
    Ok(StepOutcome::Empty)
}

async fn evaluate_script<P: PageDriver + ?Sized>(
    page: &P,
    p: &EvaluateScriptParams,
) -> Result<StepOutcome> {
    let value = page.evaluate(&p.script).await?;
    Ok(StepOutcome::Value(value))
}

async fn evaluate_script_on_elements<P: PageDriver + ?Sized>(
    page: &P,
    p: &EvaluateOnElementsParams,
) -> Result<StepOutcome> {
    let results = page
        .evaluate_on_elements(&p.selector, &p.js_command)
        .await?;

    let present: Vec<Value> = results.into_iter().filter(|v| !v.is_null()).collect();
    if present.is_empty() {
        Ok(StepOutcome::Empty)
    } else {
        Ok(StepOutcome::Value(Value::Array(present)))
    }
}

async fn get_screenshot_base64<P: PageDriver + ?Sized>(
    page: &P,
    p: &ScreenshotParams,
) -> Result<StepOutcome> {
    let bytes = tokio::time::timeout(
        Duration::from_millis(p.timeout),
        page.screenshot_jpeg(true, None),
    )
    .await
    .map_err(|_| {
        ScenaristError::Timeout(format!("capture did not finish within {}ms", p.timeout))
    })??;

    Ok(StepOutcome::Value(Value::String(BASE64.encode(bytes))))
}

/// Always succeeds with a boolean payload; an absent selector is `false`,
/// never an error.
async fn is_element_on_page<P: PageDriver + ?Sized>(
    page: &P,
    p: &SelectorParams,
) -> Result<StepOutcome> {
    sleep(Duration::from_millis(PRESENCE_SETTLE_MS)).await;
    let present = page
        .wait_for_visible(&p.selector, PRESENCE_PROBE_MS)
        .await
        .is_ok();
    Ok(StepOutcome::Value(Value::Bool(present)))
}

async fn get_captcha_base64<P: PageDriver + ?Sized>(
    page: &P,
    p: &SelectorParams,
) -> Result<StepOutcome> {
    page.wait_for_visible(&p.selector, DEFAULT_WAIT_TIMEOUT_MS)
        .await?;
    page.hover(&p.selector).await?;
    let rect = page.bounding_box(&p.selector).await?;
    let bytes = page.screenshot_jpeg(false, Some(rect)).await?;
    Ok(StepOutcome::Value(Value::String(BASE64.encode(bytes))))
}

async fn wait(ms: u64) -> Result<StepOutcome> {
    sleep(Duration::from_millis(ms)).await;
    Ok(StepOutcome::Empty)
}
