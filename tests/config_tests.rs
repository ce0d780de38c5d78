// Config loading and validation tests

use lease_keeper::config::{AppConfig, PASSWORD_ENV};
use lease_keeper::controller::RowIdentity;
use lease_keeper::webdriver::BrowserKind;
use std::time::Duration;

const VALID_CONFIG: &str = r#"
[credentials]
phone = "13800000000"
password = "secret"

[browser]
webdriver_url = "http://127.0.0.1:9515"
kind = "chromium"
headless = true

[console]
base_url = "https://example.test/console/instance/list"
login_url = "https://example.test/login"

[lifecycle]
skip_threshold_days = 10
boot_timeout_secs = 300
poll_interval_secs = 5
row_identity = "by_name"
"#;

const MINIMAL_CONFIG: &str = r#"
[credentials]
phone = "13800000000"
password = "secret"

[console]
base_url = "https://example.test/console/instance/list"
login_url = "https://example.test/login"
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.credentials.phone, "13800000000");
    assert_eq!(config.browser.kind, BrowserKind::Chromium);
    assert!(config.browser.headless);
    assert_eq!(config.lifecycle.skip_threshold_days, 10);
    assert_eq!(config.lifecycle.row_identity, RowIdentity::ByName);
}

#[test]
fn test_config_defaults() {
    let config = AppConfig::load_from_str(MINIMAL_CONFIG).expect("load_from_str");
    assert_eq!(config.browser.webdriver_url, "http://127.0.0.1:9515");
    assert_eq!(config.browser.kind, BrowserKind::Chrome);
    assert!(!config.browser.headless);
    assert_eq!(config.console.console_url_marker, "/console/");
    assert_eq!(config.console.login_timeout_secs, 60);
    assert_eq!(config.console.selectors.row, ".el-table__row");

    let lifecycle = config.lifecycle_config();
    assert_eq!(lifecycle.skip_threshold_days, 14);
    assert_eq!(lifecycle.poll_interval, Duration::from_secs(5));
    assert_eq!(lifecycle.boot_timeout, Duration::from_secs(600));
    assert_eq!(lifecycle.confirm_timeout, Duration::from_millis(5000));
    assert_eq!(lifecycle.boot_label, "无卡模式开机");
    assert_eq!(lifecycle.shutdown_label, "关机");
    assert_eq!(lifecycle.labels.running, "运行中");
    assert_eq!(lifecycle.labels.off, "已关机");
    assert_eq!(lifecycle.row_identity, RowIdentity::Positional);
}

#[test]
fn test_selector_override_keeps_other_defaults() {
    let s = format!(
        "{MINIMAL_CONFIG}\n[console.selectors]\nrefresh_button = \"button.reload\"\n"
    );
    let config = AppConfig::load_from_str(&s).expect("load_from_str");
    assert_eq!(config.console.selectors.refresh_button, "button.reload");
    assert_eq!(config.console.selectors.status, ".status span");
}

#[test]
fn test_status_label_override() {
    let s = format!("{MINIMAL_CONFIG}\n[lifecycle.status_labels]\nrunning = \"Running\"\n");
    let config = AppConfig::load_from_str(&s).expect("load_from_str");
    let labels = &config.lifecycle_config().labels;
    assert_eq!(labels.running, "Running");
    assert_eq!(labels.off, "已关机");
}

#[test]
fn test_config_validation_rejects_empty_phone() {
    let bad = VALID_CONFIG.replace("phone = \"13800000000\"", "phone = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("credentials.phone"));
}

#[test]
fn test_config_validation_rejects_missing_password() {
    let bad = VALID_CONFIG.replace("password = \"secret\"", "");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("credentials.password"));
}

#[test]
fn test_config_validation_rejects_bad_webdriver_url() {
    let bad = VALID_CONFIG.replace("http://127.0.0.1:9515", "127.0.0.1:9515");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("webdriver_url"));
}

#[test]
fn test_config_validation_rejects_zero_poll_interval() {
    let bad = VALID_CONFIG.replace("poll_interval_secs = 5", "poll_interval_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("poll_interval_secs"));
}

#[test]
fn test_config_validation_rejects_timeout_not_above_interval() {
    let bad = VALID_CONFIG.replace("boot_timeout_secs = 300", "boot_timeout_secs = 5");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("boot_timeout_secs"));
}

#[test]
fn test_config_validation_rejects_empty_label() {
    let s = format!("{MINIMAL_CONFIG}\n[lifecycle]\nboot_label = \" \"\n");
    let err = AppConfig::load_from_str(&s).unwrap_err();
    assert!(err.to_string().contains("lifecycle.boot_label"));
}

#[test]
fn test_config_rejects_unknown_browser() {
    let bad = VALID_CONFIG.replace("kind = \"chromium\"", "kind = \"netscape\"");
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn test_config_requires_console_section() {
    let bad = VALID_CONFIG.replace("[console]", "[elsewhere]");
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn test_config_validation_rejects_invalid_toml() {
    let err = AppConfig::load_from_str("not valid toml [[[").unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_config_load_from_file_via_env() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, VALID_CONFIG).unwrap();
    unsafe {
        std::env::set_var("CONFIG_FILE", path.to_str().unwrap());
        std::env::set_var(PASSWORD_ENV, "from-env");
    }
    let result = AppConfig::load();
    unsafe {
        std::env::remove_var("CONFIG_FILE");
        std::env::remove_var(PASSWORD_ENV);
    }
    let config = result.expect("load from CONFIG_FILE");
    assert_eq!(config.credentials.password, "from-env");
    assert_eq!(config.lifecycle.skip_threshold_days, 10);
}

#[test]
fn test_config_validation_rejects_timeouts_over_a_day() {
    let bad = VALID_CONFIG.replace("boot_timeout_secs = 300", "boot_timeout_secs = 86401");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("lifecycle.boot_timeout_secs"));

    let huge = VALID_CONFIG.replace(
        "boot_timeout_secs = 300",
        "boot_timeout_secs = 18446744073709551615",
    );
    assert!(AppConfig::load_from_str(&huge).is_err());

    let s = format!("{MINIMAL_CONFIG}login_timeout_secs = 9999999\n");
    let err = AppConfig::load_from_str(&s).unwrap_err();
    assert!(err.to_string().contains("console.login_timeout_secs"));

    let s = format!("{MINIMAL_CONFIG}\n[lifecycle]\nconfirm_timeout_ms = 90000000\n");
    let err = AppConfig::load_from_str(&s).unwrap_err();
    assert!(err.to_string().contains("lifecycle.confirm_timeout_ms"));
}

#[test]
fn test_config_accepts_timeout_of_exactly_a_day() {
    let s = VALID_CONFIG.replace("boot_timeout_secs = 300", "boot_timeout_secs = 86400");
    let config = AppConfig::load_from_str(&s).expect("a one-day timeout is allowed");
    assert_eq!(config.lifecycle_config().boot_timeout, Duration::from_secs(86_400));
}
