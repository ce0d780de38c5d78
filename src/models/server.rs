// Server power state and discovery snapshot models

use crate::console::ConsoleRow;
use crate::remaining::parse_remain_days;
use serde::Deserialize;
use std::fmt;

/// Power state of a rented server as the console reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Unknown,
    Off,
    Booting,
    Running,
    ShuttingDown,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PowerState::Unknown => "unknown",
            PowerState::Off => "off",
            PowerState::Booting => "booting",
            PowerState::Running => "running",
            PowerState::ShuttingDown => "shutting-down",
        };
        f.write_str(s)
    }
}

/// Console labels mapped onto [`PowerState`]; matched as substrings of the status cell.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusLabels {
    #[serde(default = "default_running_label")]
    pub running: String,
    #[serde(default = "default_off_label")]
    pub off: String,
    #[serde(default = "default_booting_label")]
    pub booting: String,
    #[serde(default = "default_shutting_down_label")]
    pub shutting_down: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            running: default_running_label(),
            off: default_off_label(),
            booting: default_booting_label(),
            shutting_down: default_shutting_down_label(),
        }
    }
}

impl StatusLabels {
    /// Map the status cell text to a state. "Off" is tested first: "已关机" contains "关机".
    pub fn classify(&self, text: &str) -> PowerState {
        let text = text.trim();
        if text.contains(self.off.as_str()) {
            PowerState::Off
        } else if text.contains(self.running.as_str()) {
            PowerState::Running
        } else if text.contains(self.booting.as_str()) {
            PowerState::Booting
        } else if text.contains(self.shutting_down.as_str()) {
            PowerState::ShuttingDown
        } else {
            PowerState::Unknown
        }
    }
}

fn default_running_label() -> String {
    "运行中".to_string()
}

fn default_off_label() -> String {
    "已关机".to_string()
}

fn default_booting_label() -> String {
    "开机中".to_string()
}

fn default_shutting_down_label() -> String {
    "关机中".to_string()
}

/// One server row as seen at discovery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSnapshot {
    /// Row position when the console was first listed.
    pub index: usize,
    pub name: String,
    /// Raw status cell text, kept for logging.
    pub status: String,
    pub state: PowerState,
    pub remain_days: u32,
}

impl ServerSnapshot {
    /// Placeholder for rows whose name cell is missing or blank.
    pub const UNKNOWN_NAME: &'static str = "unknown";

    /// Build the snapshot of row `index` from its raw cell text.
    pub fn from_row(index: usize, row: &ConsoleRow, labels: &StatusLabels) -> Self {
        let status = row.status.trim();
        let status = if status.is_empty() {
            Self::UNKNOWN_NAME.to_string()
        } else {
            status.to_string()
        };
        Self {
            index,
            name: Self::display_name(&row.name),
            state: labels.classify(&status),
            status,
            remain_days: parse_remain_days(&row.remaining),
        }
    }

    /// Re-read status and countdown from a fresh row. Name and index stay as discovered: they
    /// are what later lookups match on.
    pub fn refresh_from(&mut self, row: &ConsoleRow, labels: &StatusLabels) {
        let fresh = Self::from_row(self.index, row, labels);
        self.status = fresh.status;
        self.state = fresh.state;
        self.remain_days = fresh.remain_days;
    }

    /// Name as shown in logs and used for row matching.
    pub fn display_name(raw: &str) -> String {
        let name = raw.trim();
        if name.is_empty() {
            Self::UNKNOWN_NAME.to_string()
        } else {
            name.to_string()
        }
    }
}
