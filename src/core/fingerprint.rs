use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::{EngineTag, OsTag, ScreenConstraints};

/// The identity a session presents to the pages it visits. Callers may
/// supply one wholesale; otherwise `FingerprintGenerator` fabricates a
/// plausible profile for the requested engine/os pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub user_agent: String,
    pub platform: String,
    pub languages: Vec<String>,
    pub screen: ScreenSize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

pub struct FingerprintGenerator {
    engine: EngineTag,
    os: OsTag,
    constraints: ScreenConstraints,
}

const COMMON_SCREENS: &[(u32, u32)] = &[(1920, 1080), (1600, 900), (1440, 900), (1366, 768)];

impl FingerprintGenerator {
    pub fn new(engine: EngineTag, os: OsTag, constraints: ScreenConstraints) -> Self {
        Self {
            engine,
            os,
            constraints,
        }
    }

    pub fn generate(&self) -> Fingerprint {
        let mut rng = rand::thread_rng();

        let candidates: Vec<(u32, u32)> = COMMON_SCREENS
            .iter()
            .copied()
            .filter(|(w, h)| *w <= self.constraints.max_width && *h <= self.constraints.max_height)
            .collect();
        let (width, height) = candidates.choose(&mut rng).copied().unwrap_or((1366, 768));

        Fingerprint {
            user_agent: self.user_agent(&mut rng),
            platform: platform_of(self.os).to_string(),
            languages: vec!["en-US".to_string(), "en".to_string()],
            screen: ScreenSize { width, height },
        }
    }

    fn user_agent(&self, rng: &mut impl Rng) -> String {
        let os_part = ua_os_part(self.os);
        match self.engine {
            EngineTag::Firefox => {
                let major = rng.gen_range(115..=128);
                format!("Mozilla/5.0 ({os_part}; rv:{major}.0) Gecko/20100101 Firefox/{major}.0")
            }
            EngineTag::Chrome => {
                let major = rng.gen_range(120..=131);
                format!(
                    "Mozilla/5.0 ({os_part}) AppleWebKit/537.36 (KHTML, like Gecko) \
                     Chrome/{major}.0.0.0 Safari/537.36"
                )
            }
            EngineTag::Edge => {
                let major = rng.gen_range(120..=131);
                format!(
                    "Mozilla/5.0 ({os_part}) AppleWebKit/537.36 (KHTML, like Gecko) \
                     Chrome/{major}.0.0.0 Safari/537.36 Edg/{major}.0.0.0"
                )
            }
            EngineTag::Safari => {
                let minor = rng.gen_range(3..=6);
                format!(
                    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.{minor} Safari/605.1.15"
                )
            }
        }
    }
}

fn platform_of(os: OsTag) -> &'static str {
    match os {
        OsTag::Linux => "Linux x86_64",
        OsTag::Windows => "Win32",
        OsTag::Macos => "MacIntel",
    }
}

fn ua_os_part(os: OsTag) -> &'static str {
    match os {
        OsTag::Linux => "X11; Linux x86_64",
        OsTag::Windows => "Windows NT 10.0; Win64; x64",
        OsTag::Macos => "Macintosh; Intel Mac OS X 10.15",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ua_reflects_engine_and_os() {
        let fp = FingerprintGenerator::new(
            EngineTag::Firefox,
            OsTag::Linux,
            ScreenConstraints::default(),
        )
        .generate();
        assert!(fp.user_agent.contains("Firefox/"));
        assert!(fp.user_agent.contains("Linux"));
        assert_eq!(fp.platform, "Linux x86_64");

        let fp = FingerprintGenerator::new(
            EngineTag::Chrome,
            OsTag::Windows,
            ScreenConstraints::default(),
        )
        .generate();
        assert!(fp.user_agent.contains("Chrome/"));
        assert!(fp.user_agent.contains("Windows NT"));
        assert_eq!(fp.platform, "Win32");
    }

    #[test]
    fn generated_screen_honors_constraints() {
        let constraints = ScreenConstraints {
            max_width: 1400,
            max_height: 900,
        };
        for _ in 0..20 {
            let fp =
                FingerprintGenerator::new(EngineTag::Firefox, OsTag::Linux, constraints).generate();
            assert!(fp.screen.width <= 1400);
            assert!(fp.screen.height <= 900);
        }
    }
}
