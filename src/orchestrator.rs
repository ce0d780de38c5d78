// One run: login, discover once, cycle the batch, close the session on every path.

use crate::console::{ConsoleDriver, Credentials};
use crate::controller::{LifecycleConfig, LifecycleController};
use crate::error::CycleError;
use crate::models::{BatchReport, ServerSnapshot, StatusLabels};
use tracing::{info, warn};

/// List the console once and turn every row into a snapshot.
pub async fn discover<D: ConsoleDriver + ?Sized>(
    driver: &mut D,
    labels: &StatusLabels,
) -> Result<Vec<ServerSnapshot>, CycleError> {
    let rows = driver.list_rows().await?;
    let servers: Vec<ServerSnapshot> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| ServerSnapshot::from_row(index, row, labels))
        .collect();
    for s in &servers {
        info!(
            index = s.index,
            server = %s.name,
            status = %s.status,
            remain_days = s.remain_days,
            "found server"
        );
    }
    info!(count = servers.len(), "discovery complete");
    Ok(servers)
}

/// Run one batch against an open driver session, then close it.
///
/// Login and discovery failures end the run; per-server failures land in the report.
pub async fn run<D: ConsoleDriver + ?Sized>(
    driver: &mut D,
    credentials: &Credentials,
    config: LifecycleConfig,
) -> Result<BatchReport, CycleError> {
    let result = run_session(driver, credentials, config).await;
    if let Err(e) = driver.close().await {
        warn!(error = %e, operation = "close_session", "failed to close console session");
    }
    result
}

async fn run_session<D: ConsoleDriver + ?Sized>(
    driver: &mut D,
    credentials: &Credentials,
    config: LifecycleConfig,
) -> Result<BatchReport, CycleError> {
    info!("logging in");
    driver.login(credentials).await?;
    info!("logged in");

    driver.navigate_to_console().await?;
    let servers = discover(driver, &config.labels).await?;

    let report = LifecycleController::new(driver, config)
        .process_batch(servers)
        .await;
    info!(
        succeeded = report.succeeded(),
        skipped = report.skipped(),
        failed = report.failed(),
        "all servers processed"
    );
    Ok(report)
}
