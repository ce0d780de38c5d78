// Shared test helpers: a scripted in-memory console

#![allow(dead_code)]

use async_trait::async_trait;
use lease_keeper::console::{
    ClickOutcome, ConsoleDriver, ConsoleRow, Credentials, ElementId, MenuItem,
};
use lease_keeper::controller::LifecycleConfig;
use lease_keeper::error::CycleError;
use std::time::Duration;

pub const BOOT: &str = "无卡模式开机";
pub const SHUTDOWN: &str = "关机";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    Off,
    Running,
    /// Refreshes left before reaching Running.
    Booting(u32),
    /// Refreshes left before reaching Off.
    ShuttingDown(u32),
}

#[derive(Debug, Clone)]
pub struct FakeServer {
    pub name: String,
    pub power: Power,
    pub remaining: String,
    /// Countdown shown once a shutdown completes, if it changes.
    pub remaining_after_shutdown: Option<String>,
    pub direct_boot: bool,
    pub direct_shutdown: bool,
    pub boot_in_menu: bool,
    pub shutdown_in_menu: bool,
    pub boot_refreshes: u32,
    pub shutdown_refreshes: u32,
    /// Boots never finish.
    pub stuck_booting: bool,
}

impl FakeServer {
    pub fn off(name: &str, remaining: &str) -> Self {
        Self {
            name: name.to_string(),
            power: Power::Off,
            remaining: remaining.to_string(),
            remaining_after_shutdown: None,
            direct_boot: false,
            direct_shutdown: true,
            boot_in_menu: true,
            shutdown_in_menu: true,
            boot_refreshes: 2,
            shutdown_refreshes: 1,
            stuck_booting: false,
        }
    }

    pub fn running(name: &str, remaining: &str) -> Self {
        Self {
            power: Power::Running,
            ..Self::off(name, remaining)
        }
    }

    pub fn after_shutdown(mut self, remaining: &str) -> Self {
        self.remaining_after_shutdown = Some(remaining.to_string());
        self
    }

    fn status_text(&self) -> &'static str {
        match self.power {
            Power::Off => "已关机",
            Power::Running => "运行中",
            Power::Booting(_) => "开机中",
            Power::ShuttingDown(_) => "关机中",
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeConsole {
    pub servers: Vec<FakeServer>,
    /// Every call that changed something, in order.
    pub log: Vec<String>,
    pub open_menu: Option<usize>,
    pub dialog_appears: bool,
    pub login_fails: bool,
    pub list_fails: bool,
    /// Reverse the row order on every refresh.
    pub reverse_on_refresh: bool,
    pub closed: bool,
}

impl FakeConsole {
    pub fn new(servers: Vec<FakeServer>) -> Self {
        Self {
            servers,
            dialog_appears: true,
            ..Default::default()
        }
    }

    /// Entries of the log that start with `prefix`.
    pub fn events(&self, prefix: &str) -> Vec<&str> {
        self.log
            .iter()
            .filter(|l| l.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    /// Power actions only: "boot:<name>" / "shutdown:<name>".
    pub fn actions(&self) -> Vec<&str> {
        self.log
            .iter()
            .filter(|l| l.starts_with("boot:") || l.starts_with("shutdown:"))
            .map(String::as_str)
            .collect()
    }

    pub fn violations(&self) -> Vec<&str> {
        self.events("invalid:")
    }

    fn perform(&mut self, index: usize, label: &str) {
        let server = &mut self.servers[index];
        match label {
            BOOT => {
                if server.power == Power::Running {
                    self.log.push(format!("invalid:boot-while-running:{}", server.name));
                }
                server.power = Power::Booting(server.boot_refreshes);
                self.log.push(format!("boot:{}", server.name));
            }
            SHUTDOWN => {
                if server.power == Power::Off {
                    self.log.push(format!("invalid:shutdown-while-off:{}", server.name));
                }
                server.power = Power::ShuttingDown(server.shutdown_refreshes);
                self.log.push(format!("shutdown:{}", server.name));
            }
            other => self.log.push(format!("invalid:unknown-action:{other}")),
        }
    }

    fn advance(&mut self) {
        for s in &mut self.servers {
            s.power = match s.power {
                Power::Booting(_) if s.stuck_booting => s.power,
                Power::Booting(0) | Power::Booting(1) => Power::Running,
                Power::Booting(n) => Power::Booting(n - 1),
                Power::ShuttingDown(0) | Power::ShuttingDown(1) => {
                    if let Some(r) = s.remaining_after_shutdown.take() {
                        s.remaining = r;
                    }
                    Power::Off
                }
                Power::ShuttingDown(n) => Power::ShuttingDown(n - 1),
                p => p,
            };
        }
    }
}

#[async_trait]
impl ConsoleDriver for FakeConsole {
    async fn login(&mut self, _credentials: &Credentials) -> Result<(), CycleError> {
        if self.login_fails {
            return Err(CycleError::AuthenticationTimeout {
                timeout: Duration::from_secs(60),
            });
        }
        self.log.push("login".to_string());
        Ok(())
    }

    async fn navigate_to_console(&mut self) -> Result<(), CycleError> {
        self.open_menu = None;
        self.log.push("navigate".to_string());
        Ok(())
    }

    async fn list_rows(&mut self) -> Result<Vec<ConsoleRow>, CycleError> {
        if self.list_fails {
            return Err(CycleError::Driver("instance table never loaded".to_string()));
        }
        Ok(self
            .servers
            .iter()
            .map(|s| ConsoleRow {
                name: s.name.clone(),
                status: s.status_text().to_string(),
                remaining: s.remaining.clone(),
            })
            .collect())
    }

    async fn refresh(&mut self) -> Result<(), CycleError> {
        self.open_menu = None;
        self.advance();
        if self.reverse_on_refresh {
            self.servers.reverse();
        }
        Ok(())
    }

    async fn click_row_action(
        &mut self,
        index: usize,
        label: &str,
    ) -> Result<ClickOutcome, CycleError> {
        let s = &self.servers[index];
        let present = match label {
            BOOT => s.direct_boot,
            SHUTDOWN => s.direct_shutdown,
            _ => false,
        };
        if !present {
            return Ok(ClickOutcome::NotFound);
        }
        self.perform(index, label);
        Ok(ClickOutcome::Clicked)
    }

    async fn open_row_menu(&mut self, index: usize) -> Result<(), CycleError> {
        self.open_menu = Some(index);
        self.log.push(format!("menu:{}", self.servers[index].name));
        Ok(())
    }

    async fn menu_items(&mut self, label: &str) -> Result<Vec<MenuItem>, CycleError> {
        // Every row renders its own copy of the menu; only the opened one is visible.
        Ok(self
            .servers
            .iter()
            .enumerate()
            .filter(|(_, s)| match label {
                BOOT => s.boot_in_menu,
                SHUTDOWN => s.shutdown_in_menu,
                _ => false,
            })
            .map(|(i, _)| MenuItem {
                id: ElementId(format!("{i}:{label}")),
                visible: self.open_menu == Some(i),
            })
            .collect())
    }

    async fn click_element(&mut self, id: &ElementId) -> Result<(), CycleError> {
        let (index, label) = id
            .0
            .split_once(':')
            .ok_or_else(|| CycleError::Driver(format!("bad element id {}", id.0)))?;
        let index: usize = index
            .parse()
            .map_err(|_| CycleError::Driver(format!("bad element id {}", id.0)))?;
        if self.open_menu != Some(index) {
            self.log.push(format!("invalid:hidden-click:{}", id.0));
            return Ok(());
        }
        self.open_menu = None;
        let label = label.to_string();
        self.perform(index, &label);
        Ok(())
    }

    async fn dismiss_confirmation(&mut self, _timeout: Duration) -> Result<bool, CycleError> {
        if self.dialog_appears {
            self.log.push("confirm".to_string());
        }
        Ok(self.dialog_appears)
    }

    async fn close(&mut self) -> Result<(), CycleError> {
        self.closed = true;
        self.log.push("close".to_string());
        Ok(())
    }
}

/// Lifecycle settings with short waits; tests run on paused time anyway.
pub fn test_config() -> LifecycleConfig {
    LifecycleConfig {
        boot_timeout: Duration::from_secs(120),
        poll_interval: Duration::from_secs(5),
        confirm_timeout: Duration::from_secs(1),
        menu_settle_delay: Duration::from_millis(10),
        action_settle_delay: Duration::from_millis(10),
        ..LifecycleConfig::default()
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        phone: "13800000000".to_string(),
        password: "secret".to_string(),
    }
}
