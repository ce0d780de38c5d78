// Lifecycle controller: pre-flight cleanup, eligibility filter and per-server isolation.
// Servers are processed one at a time; the console session is shared and not reentrant.

use crate::console::{ConsoleDriver, ConsoleRow};
use crate::cycle;
use crate::error::CycleError;
use crate::models::{
    BatchReport, PowerState, ServerOutcome, ServerSnapshot, SkipReason, StatusLabels,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info, warn};

/// How a server discovered at one point is found again in a freshly listed console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowIdentity {
    /// Trust the discovery index. Assumes row order is stable for the whole run.
    #[default]
    Positional,
    /// Re-resolve by name after every refresh.
    ByName,
}

/// Policy and timing used by the controller and the power-cycle state machine.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Servers with at least this many days left are skipped.
    pub skip_threshold_days: u32,
    /// Upper bound for every wait on a power state.
    pub boot_timeout: Duration,
    pub poll_interval: Duration,
    pub confirm_timeout: Duration,
    /// Pause after opening a row menu, before looking for its entries.
    pub menu_settle_delay: Duration,
    /// Pause after clicking an action, before looking for its confirmation dialog.
    pub action_settle_delay: Duration,
    pub labels: StatusLabels,
    pub boot_label: String,
    pub shutdown_label: String,
    pub row_identity: RowIdentity,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            skip_threshold_days: 14,
            boot_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(5),
            confirm_timeout: Duration::from_secs(5),
            menu_settle_delay: Duration::from_secs(1),
            action_settle_delay: Duration::from_millis(500),
            labels: StatusLabels::default(),
            boot_label: "无卡模式开机".to_string(),
            shutdown_label: "关机".to_string(),
            row_identity: RowIdentity::Positional,
        }
    }
}

/// A row re-read from the console for one tracked server.
#[derive(Debug, Clone)]
pub struct RowObservation {
    /// Where the row sits in the current listing.
    pub index: usize,
    pub state: PowerState,
    pub row: ConsoleRow,
}

/// Locate `server` in `rows` according to `identity`.
pub fn resolve_row(
    rows: &[ConsoleRow],
    server: &ServerSnapshot,
    identity: RowIdentity,
) -> Result<usize, CycleError> {
    let not_found = || CycleError::RowNotFound {
        name: server.name.clone(),
        index: server.index,
    };
    match identity {
        RowIdentity::Positional => {
            let row = rows.get(server.index).ok_or_else(not_found)?;
            let current = ServerSnapshot::display_name(&row.name);
            if current != server.name {
                warn!(
                    server = %server.name,
                    index = server.index,
                    current = %current,
                    "row at discovered position changed name; row order may have shifted"
                );
            }
            Ok(server.index)
        }
        RowIdentity::ByName => {
            let matches: Vec<usize> = rows
                .iter()
                .enumerate()
                .filter(|(_, r)| ServerSnapshot::display_name(&r.name) == server.name)
                .map(|(i, _)| i)
                .collect();
            match matches.as_slice() {
                [] => Err(not_found()),
                [only] => Ok(*only),
                many if many.contains(&server.index) => Ok(server.index),
                many => Err(CycleError::AmbiguousRow {
                    name: server.name.clone(),
                    count: many.len(),
                }),
            }
        }
    }
}

/// List the console and read the current state of `server`'s row.
pub async fn observe_row<D: ConsoleDriver + ?Sized>(
    driver: &mut D,
    config: &LifecycleConfig,
    server: &ServerSnapshot,
) -> Result<RowObservation, CycleError> {
    let mut rows = driver.list_rows().await?;
    let index = resolve_row(&rows, server, config.row_identity)?;
    let row = rows.swap_remove(index);
    Ok(RowObservation {
        index,
        state: config.labels.classify(&row.status),
        row,
    })
}

pub struct LifecycleController<'a, D: ConsoleDriver + ?Sized> {
    driver: &'a mut D,
    config: LifecycleConfig,
}

impl<'a, D: ConsoleDriver + ?Sized> LifecycleController<'a, D> {
    pub fn new(driver: &'a mut D, config: LifecycleConfig) -> Self {
        Self { driver, config }
    }

    /// Whether a server with `remain_days` left needs a cycle.
    pub fn is_eligible(&self, remain_days: u32) -> bool {
        remain_days < self.config.skip_threshold_days
    }

    /// Cycle every eligible server, in discovery order. Never fails as a whole.
    pub async fn process_batch(&mut self, mut servers: Vec<ServerSnapshot>) -> BatchReport {
        let mut report = BatchReport::default();
        let mut preflight_failures = self.shut_down_running(&mut servers).await;

        for (position, server) in servers.iter().enumerate() {
            let n = position + 1;
            if let Some(err) = preflight_failures.remove(&position) {
                report.push(server.index, &server.name, ServerOutcome::Failed(err));
                continue;
            }

            if !self.is_eligible(server.remain_days) {
                let reason = SkipReason::EnoughDaysLeft {
                    remain_days: server.remain_days,
                    threshold: self.config.skip_threshold_days,
                };
                info!(
                    n,
                    server = %server.name,
                    remain_days = server.remain_days,
                    "skipping: {}",
                    reason
                );
                report.push(server.index, &server.name, ServerOutcome::Skipped(reason));
                continue;
            }

            info!(n, server = %server.name, remain_days = server.remain_days, "processing server");
            match cycle::run(&mut *self.driver, &self.config, server).await {
                Ok(remain_days) => {
                    let outcome = ServerOutcome::Succeeded { remain_days };
                    report.push(server.index, &server.name, outcome);
                }
                Err(e) => {
                    error!(
                        server = %server.name,
                        error = %e,
                        "server failed; continuing with the next one"
                    );
                    report.push(server.index, &server.name, ServerOutcome::Failed(e));
                }
            }
        }

        report
    }

    /// Shut down every server found running, before any eligibility decision, and refresh its
    /// snapshot. Returns the positions that could not be shut down.
    async fn shut_down_running(
        &mut self,
        servers: &mut [ServerSnapshot],
    ) -> HashMap<usize, CycleError> {
        let mut failures = HashMap::new();
        for (position, server) in servers.iter_mut().enumerate() {
            if server.state != PowerState::Running {
                continue;
            }
            info!(server = %server.name, "server is running; shutting it down first");
            match self.shut_down_and_refresh(server).await {
                Ok(()) => {
                    info!(server = %server.name, remain_days = server.remain_days, "server is off");
                }
                Err(e) => {
                    error!(server = %server.name, error = %e, "pre-flight shutdown failed");
                    failures.insert(position, e);
                }
            }
        }
        failures
    }

    async fn shut_down_and_refresh(
        &mut self,
        server: &mut ServerSnapshot,
    ) -> Result<(), CycleError> {
        cycle::shut_down(&mut *self.driver, &self.config, server).await?;
        self.driver.refresh().await?;
        let observed = observe_row(&mut *self.driver, &self.config, server).await?;
        server.refresh_from(&observed.row, &self.config.labels);
        Ok(())
    }
}
