use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScenaristError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Browser not running")]
    BrowserNotRunning,

    #[error("Page creation failed: {0}")]
    PageCreationFailed(String),

    #[error("A browser with key `{0}` is already running")]
    DuplicateKey(String),

    #[error("No browser is running under key `{0}`")]
    UnknownSession(String),

    #[error("Page index {index} is out of range for {pages} page(s)")]
    InvalidPageIndex { index: usize, pages: usize },

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, ScenaristError>;

// headless_chrome surfaces anyhow::Error from every protocol call
impl From<anyhow::Error> for ScenaristError {
    fn from(err: anyhow::Error) -> Self {
        ScenaristError::Engine(err.to_string())
    }
}
