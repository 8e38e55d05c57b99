use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::WaitUntil;

/// One scenario step as received on the wire: an ordered mapping of command
/// name to parameter value. In practice a step carries a single command;
/// extra entries execute in wire order.
#[derive(Debug, Clone, serde::Serialize, Deserialize)]
pub struct ScenarioStep(pub serde_json::Map<String, Value>);

impl ScenarioStep {
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandParseError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("{command}: invalid argument: {message}")]
    InvalidParams {
        command: &'static str,
        message: String,
    },
}

/// The closed set of scenario commands, each with its typed parameters.
#[derive(Debug, Clone)]
pub enum Command {
    Navigate(NavigateParams),
    Click(ClickParams),
    SelectRadio(SelectParams),
    SelectOption(SelectParams),
    Scroll(ScrollParams),
    Fill(FillParams),
    WaitForNavigation(WaitForNavigationParams),
    WaitForSelector(WaitForSelectorParams),
    EvaluateScript(EvaluateScriptParams),
    EvaluateScriptOnElements(EvaluateOnElementsParams),
    GetScreenshotBase64(ScreenshotParams),
    IsElementOnPage(SelectorParams),
    GetCaptchaBase64(SelectorParams),
    /// Pure delay in milliseconds; the only command whose parameter is a
    /// bare integer rather than an object.
    Wait(u64),
}

impl Command {
    /// Map one wire entry onto a command. Unknown names and malformed
    /// parameters are values, not faults: the executor turns them into
    /// error step outcomes.
    pub fn parse(name: &str, params: &Value) -> Result<Command, CommandParseError> {
        fn typed<T: for<'de> Deserialize<'de>>(
            command: &'static str,
            params: &Value,
        ) -> Result<T, CommandParseError> {
            serde_json::from_value(params.clone()).map_err(|e| CommandParseError::InvalidParams {
                command,
                message: e.to_string(),
            })
        }

        match name {
            "navigate" => typed("navigate", params).map(Command::Navigate),
            "click" => typed("click", params).map(Command::Click),
            "select_radio" => typed("select_radio", params).map(Command::SelectRadio),
            "select_option" => typed("select_option", params).map(Command::SelectOption),
            "scroll" => typed("scroll", params).map(Command::Scroll),
            "fill" => typed("fill", params).map(Command::Fill),
            "wait_for_navigation" => {
                typed("wait_for_navigation", params).map(Command::WaitForNavigation)
            }
            "wait_for_selector" => typed("wait_for_selector", params).map(Command::WaitForSelector),
            "evaluate_script" => typed("evaluate_script", params).map(Command::EvaluateScript),
            "evaluate_script_on_elements" => {
                typed("evaluate_script_on_elements", params).map(Command::EvaluateScriptOnElements)
            }
            "get_screenshot_base64" => {
                typed("get_screenshot_base64", params).map(Command::GetScreenshotBase64)
            }
            "is_element_on_page" => typed("is_element_on_page", params).map(Command::IsElementOnPage),
            "get_captcha_base64" => typed("get_captcha_base64", params).map(Command::GetCaptchaBase64),
            "wait" => params
                .as_u64()
                .map(Command::Wait)
                .ok_or(CommandParseError::InvalidParams {
                    command: "wait",
                    message: "parameter must be an integer number of milliseconds".to_string(),
                }),
            other => Err(CommandParseError::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Navigate(_) => "navigate",
            Command::Click(_) => "click",
            Command::SelectRadio(_) => "select_radio",
            Command::SelectOption(_) => "select_option",
            Command::Scroll(_) => "scroll",
            Command::Fill(_) => "fill",
            Command::WaitForNavigation(_) => "wait_for_navigation",
            Command::WaitForSelector(_) => "wait_for_selector",
            Command::EvaluateScript(_) => "evaluate_script",
            Command::EvaluateScriptOnElements(_) => "evaluate_script_on_elements",
            Command::GetScreenshotBase64(_) => "get_screenshot_base64",
            Command::IsElementOnPage(_) => "is_element_on_page",
            Command::GetCaptchaBase64(_) => "get_captcha_base64",
            Command::Wait(_) => "wait",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavigateParams {
    pub url: String,
    #[serde(default = "default_navigate_retries", alias = "retryCount")]
    pub retry_count: u32,
    #[serde(default, alias = "waitUntil")]
    pub wait_until: WaitUntil,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickParams {
    pub selector: String,
    #[serde(default = "default_click_delay_ms")]
    pub delay: u64,
    #[serde(default = "default_selector_timeout_ms")]
    pub timeout: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectParams {
    pub selector: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrollParams {
    pub selector: String,
    #[serde(default = "default_scroll_retries")]
    pub retry_count: u32,
    #[serde(default = "default_click_delay_ms")]
    pub delay: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FillParams {
    pub selector: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitForNavigationParams {
    pub timeout: u64,
    pub url_parts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitForSelectorParams {
    pub selector: String,
    #[serde(default = "default_selector_timeout_ms")]
    pub timeout: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateScriptParams {
    pub script: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateOnElementsParams {
    pub selector: String,
    pub js_command: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScreenshotParams {
    #[serde(default = "default_selector_timeout_ms")]
    pub timeout: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorParams {
    pub selector: String,
}

fn default_navigate_retries() -> u32 {
    3
}

fn default_click_delay_ms() -> u64 {
    500
}

fn default_selector_timeout_ms() -> u64 {
    3000
}

fn default_scroll_retries() -> u32 {
    10
}
