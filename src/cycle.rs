// Power-cycle state machine: (shutdown if running) -> no-card boot -> running -> shutdown -> off.
// Every action re-reads the row first; the console is the only source of truth.

use crate::console::{ClickOutcome, ConsoleDriver, MenuItem};
use crate::controller::{LifecycleConfig, observe_row};
use crate::error::CycleError;
use crate::models::{PowerState, ServerSnapshot};
use crate::remaining::parse_remain_days;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument};

/// Stand-in deadline for timeouts too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStep {
    Discover,
    ShutdownIfRunning,
    Boot,
    AwaitRunning,
    Shutdown,
    AwaitOff,
    Done,
}

/// Drive `server` through one full no-card boot cycle.
///
/// Returns the remaining days read from the console once the server is off again.
#[instrument(skip(driver, config, server), fields(server = %server.name, index = server.index))]
pub async fn run<D: ConsoleDriver + ?Sized>(
    driver: &mut D,
    config: &LifecycleConfig,
    server: &ServerSnapshot,
) -> Result<u32, CycleError> {
    let mut step = CycleStep::Discover;
    let mut observed = PowerState::Unknown;
    let mut pre_shutdown_done = false;

    loop {
        debug!(?step, "cycle step");
        step = match step {
            CycleStep::Discover => {
                driver.navigate_to_console().await?;
                observed = observe_row(driver, config, server).await?.state;
                debug!(state = %observed, "discovered");
                CycleStep::ShutdownIfRunning
            }
            CycleStep::ShutdownIfRunning => match observed {
                PowerState::Running if pre_shutdown_done => {
                    return Err(CycleError::UnexpectedStatus {
                        expected: PowerState::Off.to_string(),
                        observed,
                    });
                }
                PowerState::Running => {
                    info!("already running; shutting down before the no-card boot");
                    shut_down(driver, config, server).await?;
                    pre_shutdown_done = true;
                    CycleStep::Discover
                }
                _ => CycleStep::Boot,
            },
            CycleStep::Boot => {
                let current = observe_row(driver, config, server).await?;
                if current.state == PowerState::Running {
                    return Err(CycleError::UnexpectedStatus {
                        expected: "not running".to_string(),
                        observed: current.state,
                    });
                }
                trigger_action(driver, config, current.index, &config.boot_label).await?;
                info!("no-card boot requested; waiting for the server to start");
                CycleStep::AwaitRunning
            }
            CycleStep::AwaitRunning => {
                await_state(driver, config, server, PowerState::Running).await?;
                info!("server is running; shutting it down");
                CycleStep::Shutdown
            }
            CycleStep::Shutdown => {
                if request_shutdown(driver, config, server).await? {
                    CycleStep::AwaitOff
                } else {
                    CycleStep::Done
                }
            }
            CycleStep::AwaitOff => {
                await_state(driver, config, server, PowerState::Off).await?;
                CycleStep::Done
            }
            CycleStep::Done => {
                let current = observe_row(driver, config, server).await?;
                let remain_days = parse_remain_days(&current.row.remaining);
                info!(remain_days, "server cycled");
                return Ok(remain_days);
            }
        };
    }
}

/// Shut `server` down and wait until the console reports it off.
pub async fn shut_down<D: ConsoleDriver + ?Sized>(
    driver: &mut D,
    config: &LifecycleConfig,
    server: &ServerSnapshot,
) -> Result<(), CycleError> {
    if request_shutdown(driver, config, server).await? {
        await_state(driver, config, server, PowerState::Off).await?;
    }
    info!(server = %server.name, "server is off");
    Ok(())
}

/// Refresh, then trigger the shutdown action unless the row already reads off.
/// Returns whether a shutdown was actually issued.
async fn request_shutdown<D: ConsoleDriver + ?Sized>(
    driver: &mut D,
    config: &LifecycleConfig,
    server: &ServerSnapshot,
) -> Result<bool, CycleError> {
    driver.refresh().await?;
    let current = observe_row(driver, config, server).await?;
    if current.state == PowerState::Off {
        info!(server = %server.name, "already off; no shutdown needed");
        return Ok(false);
    }
    trigger_action(driver, config, current.index, &config.shutdown_label).await?;
    info!(server = %server.name, "shutdown requested; waiting for the server to stop");
    Ok(true)
}

/// Click `label` on row `index`: the direct row control when present, otherwise the entry in
/// the row's secondary menu. Then confirm the dialog if one appears.
pub async fn trigger_action<D: ConsoleDriver + ?Sized>(
    driver: &mut D,
    config: &LifecycleConfig,
    index: usize,
    label: &str,
) -> Result<(), CycleError> {
    match driver.click_row_action(index, label).await? {
        ClickOutcome::Clicked => debug!(index, label, "clicked direct row control"),
        ClickOutcome::NotFound => {
            driver.open_row_menu(index).await?;
            sleep(config.menu_settle_delay).await;
            let items = driver.menu_items(label).await?;
            let item = select_visible(&items).ok_or_else(|| CycleError::ActionNotFound {
                label: label.to_string(),
            })?;
            driver.click_element(&item.id).await?;
            debug!(index, label, candidates = items.len(), "clicked visible menu entry");
        }
    }
    sleep(config.action_settle_delay).await;
    let confirmed = driver.dismiss_confirmation(config.confirm_timeout).await?;
    debug!(label, confirmed, "confirmation handled");
    Ok(())
}

/// First visible element among those sharing a label. Every row renders its own hidden copy of
/// the menu, so only the one currently shown belongs to the row that was opened.
pub fn select_visible(items: &[MenuItem]) -> Option<&MenuItem> {
    items.iter().find(|item| item.visible)
}

/// Poll the row of `server` until it reaches `target` or `boot_timeout` runs out.
///
/// Each round sleeps `poll_interval`, refreshes the console and re-reads the row.
pub async fn await_state<D: ConsoleDriver + ?Sized>(
    driver: &mut D,
    config: &LifecycleConfig,
    server: &ServerSnapshot,
    target: PowerState,
) -> Result<(), CycleError> {
    let deadline = deadline_after(config.boot_timeout);
    while Instant::now() < deadline {
        sleep(config.poll_interval).await;
        driver.refresh().await?;
        let current = observe_row(driver, config, server).await?;
        info!(
            server = %server.name,
            state = %current.state,
            status = %current.row.status.trim(),
            target = %target,
            "polled status"
        );
        if current.state == target {
            return Ok(());
        }
    }
    Err(CycleError::StateTimeout {
        target,
        timeout: config.boot_timeout,
    })
}

/// `timeout` from now, saturating instead of overflowing the clock.
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or(now + FAR_FUTURE)
}
