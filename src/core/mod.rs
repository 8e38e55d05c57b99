pub mod browser;
pub mod config;
pub mod fingerprint;

pub use browser::{BrowserDriver, PageDriver, PageRect, WaitUntil};
pub use config::{EngineTag, LaunchProfile, OsTag, ProxyConfig, ScreenConstraints, ServerConfig};
pub use fingerprint::{Fingerprint, FingerprintGenerator, ScreenSize};
