use serde::{Deserialize, Serialize};

use crate::core::fingerprint::Fingerprint;

/// Launch-time configuration for one browser session.
///
/// Field names and defaults follow the wire contract of the `/start`
/// endpoint; everything is optional for the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchProfile {
    /// Caller-supplied fingerprint; generated from `browser`/`os` when absent.
    pub fingerprint: Option<Fingerprint>,
    pub browser: EngineTag,
    pub os: OsTag,
    pub humanize: bool,
    pub block_images: bool,
    pub block_webgl: bool,
    pub geoip: bool,
    pub proxy: Option<ProxyConfig>,
    #[serde(skip)]
    pub screen: ScreenConstraints,
}

impl Default for LaunchProfile {
    fn default() -> Self {
        Self {
            fingerprint: None,
            browser: EngineTag::Firefox,
            os: OsTag::Linux,
            humanize: true,
            block_images: false,
            block_webgl: false,
            geoip: true,
            proxy: None,
            screen: ScreenConstraints::default(),
        }
    }
}

/// Fingerprint family requested by the caller. The engine underneath is
/// always the bundled headless chromium; the tag steers user-agent and
/// platform generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineTag {
    Firefox,
    Chrome,
    Edge,
    Safari,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsTag {
    Linux,
    Windows,
    Macos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Upper bound for generated screen dimensions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScreenConstraints {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ScreenConstraints {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_defaults_match_wire_contract() {
        let profile: LaunchProfile = serde_json::from_str("{}").unwrap();
        assert_eq!(profile.browser, EngineTag::Firefox);
        assert_eq!(profile.os, OsTag::Linux);
        assert!(profile.humanize);
        assert!(!profile.block_images);
        assert!(!profile.block_webgl);
        assert!(profile.geoip);
        assert!(profile.fingerprint.is_none());
        assert!(profile.proxy.is_none());
    }

    #[test]
    fn profile_accepts_partial_overrides() {
        let profile: LaunchProfile = serde_json::from_str(
            r#"{"browser": "chrome", "os": "windows", "humanize": false,
                "proxy": {"server": "http://127.0.0.1:3128", "username": "u", "password": "p"}}"#,
        )
        .unwrap();
        assert_eq!(profile.browser, EngineTag::Chrome);
        assert_eq!(profile.os, OsTag::Windows);
        assert!(!profile.humanize);
        assert_eq!(profile.proxy.unwrap().server, "http://127.0.0.1:3128");
    }
}
