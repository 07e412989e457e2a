use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::chromedriver::default_chromedriver_path;
use crate::enroll::EnrollSettings;
use crate::timezone::LocalZone;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub search_base_url: Url,
    pub login_url: Url,
    pub webdriver_url: Url,
    pub launch_chromedriver: bool,
    pub chromedriver_path: PathBuf,
    pub profile_dir: PathBuf,
    pub timezone: Option<String>,
    pub debug: bool,
    pub element_timeout_secs: u64,
    pub login_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub enrollment_lead_ms: u64,
    pub click_interval_ms: u64,
    pub max_attempts: Option<u32>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // Load from environment variables with SNIPER_ prefix, e.g. SNIPER_PROFILE_DIR
            .add_source(
                Environment::with_prefix("SNIPER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("search_base_url", "https://asvz.ch")?
            .set_default("login_url", "https://auth.asvz.ch/account/login")?
            .set_default("webdriver_url", "http://localhost:9515")?
            .set_default("launch_chromedriver", true)?
            .set_default(
                "chromedriver_path",
                default_chromedriver_path().display().to_string(),
            )?
            .set_default("profile_dir", "chromeProfile")?
            .set_default("debug", false)?
            .set_default("element_timeout_secs", 5)?
            .set_default("login_timeout_secs", 360)?
            .set_default("poll_interval_ms", 250)?
            .set_default("enrollment_lead_ms", 0)?
            .set_default("click_interval_ms", 0)?
            .build()?;

        config.try_deserialize()
    }

    pub fn zone(&self) -> Result<LocalZone, String> {
        match self.timezone.as_deref() {
            Some(name) if !name.trim().is_empty() => LocalZone::parse(name.trim()),
            _ => Ok(LocalZone::System),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn enroll_settings(&self) -> Result<EnrollSettings, String> {
        Ok(EnrollSettings {
            login_url: self.login_url.to_string(),
            element_timeout: Duration::from_secs(self.element_timeout_secs),
            login_timeout: Duration::from_secs(self.login_timeout_secs),
            lead: Duration::from_millis(self.enrollment_lead_ms),
            click_interval: Duration::from_millis(self.click_interval_ms),
            max_attempts: self.max_attempts,
            zone: self.zone()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const VARS: [&str; 4] = [
        "SNIPER_PROFILE_DIR",
        "SNIPER_LOGIN_TIMEOUT_SECS",
        "SNIPER_TIMEZONE",
        "SNIPER_MAX_ATTEMPTS",
    ];

    fn clear_vars() {
        for var in VARS {
            // SAFETY: tests touching the environment run serially.
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_vars();
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.search_base_url.as_str(), "https://asvz.ch/");
        assert_eq!(settings.webdriver_url.port(), Some(9515));
        assert_eq!(settings.profile_dir, PathBuf::from("chromeProfile"));
        assert_eq!(settings.login_timeout_secs, 360);
        assert_eq!(settings.element_timeout_secs, 5);
        assert_eq!(settings.max_attempts, None);
        assert_eq!(settings.zone(), Ok(LocalZone::System));

        let enroll = settings.enroll_settings().unwrap();
        assert_eq!(enroll.lead, Duration::ZERO);
        assert_eq!(enroll.login_url, "https://auth.asvz.ch/account/login");
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_vars();
        // SAFETY: tests touching the environment run serially.
        unsafe {
            std::env::set_var("SNIPER_PROFILE_DIR", "/tmp/asvz-profile");
            std::env::set_var("SNIPER_LOGIN_TIMEOUT_SECS", "60");
            std::env::set_var("SNIPER_TIMEZONE", "Europe/Zurich");
            std::env::set_var("SNIPER_MAX_ATTEMPTS", "20");
        }
        let settings = Settings::from_env().unwrap();
        clear_vars();

        assert_eq!(settings.profile_dir, PathBuf::from("/tmp/asvz-profile"));
        assert_eq!(settings.login_timeout_secs, 60);
        assert_eq!(settings.max_attempts, Some(20));
        assert_eq!(
            settings.zone(),
            Ok(LocalZone::parse("Europe/Zurich").unwrap())
        );
    }
}
