use anyhow::Result;
use lease_keeper::models::ServerOutcome;
use lease_keeper::webdriver::client::WebDriverClient;
use lease_keeper::webdriver::{ConsoleSettings, WebDriverConsole};
use lease_keeper::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        webdriver = %app_config.browser.webdriver_url,
        browser = ?app_config.browser.kind,
        headless = app_config.browser.headless,
        "starting lease-keeper"
    );

    let client =
        WebDriverClient::connect(&app_config.browser.webdriver_url, &app_config.capabilities())
            .await?;
    let mut console = WebDriverConsole::new(client, ConsoleSettings::from_config(&app_config));

    let report = orchestrator::run(
        &mut console,
        &app_config.credentials(),
        app_config.lifecycle_config(),
    )
    .await?;

    for s in &report.servers {
        match &s.outcome {
            ServerOutcome::Skipped(reason) => {
                tracing::info!(server = %s.name, "skipped: {}", reason)
            }
            ServerOutcome::Succeeded { remain_days } => {
                tracing::info!(server = %s.name, remain_days, "cycled")
            }
            ServerOutcome::Failed(e) => tracing::warn!(server = %s.name, error = %e, "failed"),
        }
    }

    Ok(())
}
