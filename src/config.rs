use crate::console::Credentials;
use crate::controller::{LifecycleConfig, RowIdentity};
use crate::models::StatusLabels;
use crate::webdriver::{BrowserKind, Capabilities, ConsoleSelectors};
use serde::Deserialize;
use std::time::Duration;

/// Env var that, when set, replaces `credentials.password` from the file.
pub const PASSWORD_ENV: &str = "LEASE_KEEPER_PASSWORD";

/// Upper bound for every configured wait: one day.
pub const MAX_WAIT_SECS: u64 = 86_400;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    pub console: ConsoleConfig,
    #[serde(default)]
    pub lifecycle: LifecycleSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    pub phone: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Address of a running chromedriver / geckodriver.
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default)]
    pub kind: BrowserKind,
    #[serde(default)]
    pub headless: bool,
    /// Browser executable, for builds not installed in the default location.
    #[serde(default)]
    pub binary: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            kind: BrowserKind::default(),
            headless: false,
            binary: None,
        }
    }
}

fn default_webdriver_url() -> String {
    "http://127.0.0.1:9515".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    /// Instance list page.
    pub base_url: String,
    pub login_url: String,
    /// Substring of the URL reached after a successful login.
    #[serde(default = "default_console_url_marker")]
    pub console_url_marker: String,
    /// Generous on purpose: a human may have to solve a captcha.
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
    #[serde(default)]
    pub selectors: ConsoleSelectors,
}

fn default_console_url_marker() -> String {
    "/console/".to_string()
}

fn default_login_timeout_secs() -> u64 {
    60
}

fn default_page_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleSettings {
    #[serde(default = "default_skip_threshold_days")]
    pub skip_threshold_days: u32,
    #[serde(default = "default_boot_timeout_secs")]
    pub boot_timeout_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    #[serde(default = "default_menu_settle_delay_ms")]
    pub menu_settle_delay_ms: u64,
    #[serde(default = "default_action_settle_delay_ms")]
    pub action_settle_delay_ms: u64,
    #[serde(default = "default_boot_label")]
    pub boot_label: String,
    #[serde(default = "default_shutdown_label")]
    pub shutdown_label: String,
    #[serde(default)]
    pub row_identity: RowIdentity,
    #[serde(default)]
    pub status_labels: StatusLabels,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            skip_threshold_days: default_skip_threshold_days(),
            boot_timeout_secs: default_boot_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
            menu_settle_delay_ms: default_menu_settle_delay_ms(),
            action_settle_delay_ms: default_action_settle_delay_ms(),
            boot_label: default_boot_label(),
            shutdown_label: default_shutdown_label(),
            row_identity: RowIdentity::default(),
            status_labels: StatusLabels::default(),
        }
    }
}

fn default_skip_threshold_days() -> u32 {
    14
}

fn default_boot_timeout_secs() -> u64 {
    600
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_confirm_timeout_ms() -> u64 {
    5000
}

fn default_menu_settle_delay_ms() -> u64 {
    1000
}

fn default_action_settle_delay_ms() -> u64 {
    500
}

fn default_boot_label() -> String {
    "无卡模式开机".to_string()
}

fn default_shutdown_label() -> String {
    "关机".to_string()
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        let mut config: AppConfig = toml::from_str(&s)?;
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            config.credentials.password = password;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.credentials.phone.trim().is_empty(),
            "credentials.phone must be non-empty"
        );
        anyhow::ensure!(
            !self.credentials.password.is_empty(),
            "credentials.password must be non-empty (or set {})",
            PASSWORD_ENV
        );
        anyhow::ensure!(
            self.browser.webdriver_url.starts_with("http://")
                || self.browser.webdriver_url.starts_with("https://"),
            "browser.webdriver_url must be an http(s) URL, got {:?}",
            self.browser.webdriver_url
        );
        anyhow::ensure!(
            !self.console.base_url.trim().is_empty(),
            "console.base_url must be non-empty"
        );
        anyhow::ensure!(
            !self.console.login_url.trim().is_empty(),
            "console.login_url must be non-empty"
        );
        anyhow::ensure!(
            self.console.login_timeout_secs > 0,
            "console.login_timeout_secs must be > 0, got {}",
            self.console.login_timeout_secs
        );
        anyhow::ensure!(
            self.console.page_timeout_secs > 0,
            "console.page_timeout_secs must be > 0, got {}",
            self.console.page_timeout_secs
        );
        let l = &self.lifecycle;
        for (key, secs) in [
            ("console.login_timeout_secs", self.console.login_timeout_secs),
            ("console.page_timeout_secs", self.console.page_timeout_secs),
            ("lifecycle.boot_timeout_secs", l.boot_timeout_secs),
            ("lifecycle.confirm_timeout_ms", l.confirm_timeout_ms / 1000),
            ("lifecycle.menu_settle_delay_ms", l.menu_settle_delay_ms / 1000),
            ("lifecycle.action_settle_delay_ms", l.action_settle_delay_ms / 1000),
        ] {
            anyhow::ensure!(
                secs <= MAX_WAIT_SECS,
                "{} must be at most {} seconds",
                key,
                MAX_WAIT_SECS
            );
        }
        anyhow::ensure!(
            l.poll_interval_secs > 0,
            "lifecycle.poll_interval_secs must be > 0, got {}",
            l.poll_interval_secs
        );
        anyhow::ensure!(
            l.boot_timeout_secs > l.poll_interval_secs,
            "lifecycle.boot_timeout_secs ({}) must exceed lifecycle.poll_interval_secs ({})",
            l.boot_timeout_secs,
            l.poll_interval_secs
        );
        anyhow::ensure!(
            l.confirm_timeout_ms > 0,
            "lifecycle.confirm_timeout_ms must be > 0, got {}",
            l.confirm_timeout_ms
        );
        for (key, value) in [
            ("lifecycle.boot_label", &l.boot_label),
            ("lifecycle.shutdown_label", &l.shutdown_label),
            ("lifecycle.status_labels.running", &l.status_labels.running),
            ("lifecycle.status_labels.off", &l.status_labels.off),
            ("lifecycle.status_labels.booting", &l.status_labels.booting),
            (
                "lifecycle.status_labels.shutting_down",
                &l.status_labels.shutting_down,
            ),
        ] {
            anyhow::ensure!(!value.trim().is_empty(), "{} must be non-empty", key);
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            phone: self.credentials.phone.clone(),
            password: self.credentials.password.clone(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            kind: self.browser.kind,
            headless: self.browser.headless,
            binary: self.browser.binary.clone(),
        }
    }

    /// Runtime settings for the lifecycle controller.
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        let l = &self.lifecycle;
        LifecycleConfig {
            skip_threshold_days: l.skip_threshold_days,
            boot_timeout: Duration::from_secs(l.boot_timeout_secs),
            poll_interval: Duration::from_secs(l.poll_interval_secs),
            confirm_timeout: Duration::from_millis(l.confirm_timeout_ms),
            menu_settle_delay: Duration::from_millis(l.menu_settle_delay_ms),
            action_settle_delay: Duration::from_millis(l.action_settle_delay_ms),
            labels: l.status_labels.clone(),
            boot_label: l.boot_label.clone(),
            shutdown_label: l.shutdown_label.clone(),
            row_identity: l.row_identity,
        }
    }
}
