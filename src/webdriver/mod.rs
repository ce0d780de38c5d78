// ConsoleDriver backed by a real browser through WebDriver

pub mod client;

use crate::console::{ClickOutcome, ConsoleDriver, ConsoleRow, Credentials, ElementId, MenuItem};
use crate::cycle::deadline_after;
use crate::error::CycleError;
use async_trait::async_trait;
use client::{Locator, WebDriverClient};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument};

/// How often element waits re-query the page.
const ELEMENT_POLL: Duration = Duration::from_millis(250);
/// Pause after confirming a dialog so the page can react.
const AFTER_CONFIRM: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    /// Installed Google Chrome.
    #[default]
    Chrome,
    /// Chromium, `/usr/bin/chromium` unless `binary` says otherwise.
    Chromium,
    Firefox,
}

/// What to ask the driver for when opening a session.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub kind: BrowserKind,
    pub headless: bool,
    pub binary: Option<String>,
}

impl Capabilities {
    /// New-session request body.
    pub fn to_json(&self) -> Value {
        let always_match = match self.kind {
            BrowserKind::Chrome | BrowserKind::Chromium => {
                let mut args = vec!["--disable-gpu"];
                if self.headless {
                    args.push("--headless=new");
                }
                let mut options = json!({ "args": args });
                let binary = match (&self.binary, self.kind) {
                    (Some(b), _) => Some(b.as_str()),
                    (None, BrowserKind::Chromium) => Some("/usr/bin/chromium"),
                    (None, _) => None,
                };
                if let Some(b) = binary {
                    options["binary"] = json!(b);
                }
                json!({ "browserName": "chrome", "goog:chromeOptions": options })
            }
            BrowserKind::Firefox => {
                let args: Vec<&str> = if self.headless { vec!["-headless"] } else { vec![] };
                let mut options = json!({ "args": args });
                if let Some(b) = &self.binary {
                    options["binary"] = json!(b);
                }
                json!({ "browserName": "firefox", "moz:firefoxOptions": options })
            }
        };
        json!({ "capabilities": { "alwaysMatch": always_match } })
    }
}

/// CSS selectors for the rental console pages. Defaults match its element-ui markup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleSelectors {
    pub row: String,
    pub name: String,
    pub status: String,
    pub remaining: String,
    /// Hover target that opens a row's "more" menu.
    pub more_menu: String,
    /// Buttons rendered directly on a row.
    pub row_button: String,
    pub refresh_button: String,
    pub dialog: String,
    pub dialog_confirm: String,
    pub phone_input: String,
    pub password_input: String,
    pub login_button: String,
    pub login_button_text: String,
}

impl Default for ConsoleSelectors {
    fn default() -> Self {
        Self {
            row: ".el-table__row".to_string(),
            name: "[data-v-7af0f7ca] span".to_string(),
            status: ".status span".to_string(),
            remaining: ".date span".to_string(),
            more_menu: ".el-dropdown .el-dropdown-selfdefine".to_string(),
            row_button: "button.thirteenSize".to_string(),
            refresh_button: "button.refresh-btn".to_string(),
            dialog: ".el-message-box".to_string(),
            dialog_confirm: "button.el-button--primary".to_string(),
            phone_input: "input[name='phone']".to_string(),
            password_input: "input[name='password']".to_string(),
            login_button: "button.el-button--primary".to_string(),
            login_button_text: "登录".to_string(),
        }
    }
}

/// Where the console lives and how long page loads may take.
#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    pub base_url: String,
    pub login_url: String,
    pub console_url_marker: String,
    pub login_timeout: Duration,
    pub page_timeout: Duration,
    pub selectors: ConsoleSelectors,
}

impl ConsoleSettings {
    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        let c = &config.console;
        Self {
            base_url: c.base_url.clone(),
            login_url: c.login_url.clone(),
            console_url_marker: c.console_url_marker.clone(),
            login_timeout: Duration::from_secs(c.login_timeout_secs),
            page_timeout: Duration::from_secs(c.page_timeout_secs),
            selectors: c.selectors.clone(),
        }
    }
}

pub struct WebDriverConsole {
    client: WebDriverClient,
    settings: ConsoleSettings,
}

impl WebDriverConsole {
    pub fn new(client: WebDriverClient, settings: ConsoleSettings) -> Self {
        Self { client, settings }
    }

    /// Poll until `locator` matches at least one element, or give up after `timeout`.
    async fn wait_for(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Vec<ElementId>, CycleError> {
        let deadline = deadline_after(timeout);
        loop {
            let found = self.client.find_elements(locator).await?;
            if !found.is_empty() {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                return Err(CycleError::Driver(format!(
                    "timed out after {timeout:?} waiting for {locator:?}"
                )));
            }
            sleep(ELEMENT_POLL).await;
        }
    }

    async fn wait_for_rows(&self) -> Result<Vec<ElementId>, CycleError> {
        let locator = Locator::css(&self.settings.selectors.row);
        self.wait_for(&locator, self.settings.page_timeout).await
    }

    async fn row(&self, index: usize) -> Result<ElementId, CycleError> {
        let rows = self
            .client
            .find_elements(&Locator::css(&self.settings.selectors.row))
            .await?;
        let count = rows.len();
        rows.into_iter().nth(index).ok_or_else(|| {
            CycleError::Driver(format!("row #{index} not on the page ({count} rows)"))
        })
    }

    /// Trimmed text of the first `css` match inside `row`; empty when there is none.
    async fn cell_text(&self, row: &ElementId, css: &str) -> Result<String, CycleError> {
        let cells = self.client.find_elements_from(row, &Locator::css(css)).await?;
        match cells.first() {
            Some(cell) => Ok(self.client.element_text(cell).await?.trim().to_string()),
            None => Ok(String::new()),
        }
    }

    async fn fill(&self, css: &str, text: &str) -> Result<(), CycleError> {
        let input = self
            .wait_for(&Locator::css(css), self.settings.page_timeout)
            .await?;
        let input = &input[0];
        self.client.clear(input).await?;
        self.client.send_keys(input, text).await?;
        Ok(())
    }

    /// First displayed element matching `css`, if any.
    async fn first_displayed(&self, css: &str) -> Result<Option<ElementId>, CycleError> {
        for el in self.client.find_elements(&Locator::css(css)).await? {
            if self.client.element_displayed(&el).await? {
                return Ok(Some(el));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl ConsoleDriver for WebDriverConsole {
    #[instrument(skip_all, fields(operation = "login"))]
    async fn login(&mut self, credentials: &Credentials) -> Result<(), CycleError> {
        let s = &self.settings;
        self.client.navigate(&s.login_url).await?;
        self.fill(&s.selectors.phone_input, &credentials.phone).await?;
        self.fill(&s.selectors.password_input, &credentials.password)
            .await?;

        let mut clicked = false;
        for button in self
            .client
            .find_elements(&Locator::css(&s.selectors.login_button))
            .await?
        {
            if self.client.element_text(&button).await?.contains(&s.selectors.login_button_text) {
                self.client.click(&button).await?;
                clicked = true;
                break;
            }
        }
        if !clicked {
            return Err(CycleError::ActionNotFound {
                label: s.selectors.login_button_text.clone(),
            });
        }

        info!(
            timeout = ?s.login_timeout,
            "waiting for the console; solve a captcha if one appears"
        );
        let deadline = deadline_after(s.login_timeout);
        loop {
            let url = self.client.current_url().await?;
            if url.contains(&s.console_url_marker) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CycleError::AuthenticationTimeout {
                    timeout: s.login_timeout,
                });
            }
            sleep(ELEMENT_POLL).await;
        }
    }

    async fn navigate_to_console(&mut self) -> Result<(), CycleError> {
        self.client.navigate(&self.settings.base_url).await?;
        self.wait_for_rows().await?;
        debug!("instance list loaded");
        Ok(())
    }

    async fn list_rows(&mut self) -> Result<Vec<ConsoleRow>, CycleError> {
        let sel = &self.settings.selectors;
        let rows = self.client.find_elements(&Locator::css(&sel.row)).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(ConsoleRow {
                name: self.cell_text(row, &sel.name).await?,
                status: self.cell_text(row, &sel.status).await?,
                remaining: self.cell_text(row, &sel.remaining).await?,
            });
        }
        Ok(out)
    }

    async fn refresh(&mut self) -> Result<(), CycleError> {
        let locator = Locator::css(&self.settings.selectors.refresh_button);
        let button = self.wait_for(&locator, self.settings.page_timeout).await?;
        self.client.click(&button[0]).await?;
        self.wait_for_rows().await?;
        Ok(())
    }

    async fn click_row_action(
        &mut self,
        index: usize,
        label: &str,
    ) -> Result<ClickOutcome, CycleError> {
        let row = self.row(index).await?;
        let buttons = self
            .client
            .find_elements_from(&row, &Locator::css(&self.settings.selectors.row_button))
            .await?;
        for button in buttons {
            if self.client.element_text(&button).await?.contains(label) {
                self.client.click(&button).await?;
                return Ok(ClickOutcome::Clicked);
            }
        }
        Ok(ClickOutcome::NotFound)
    }

    async fn open_row_menu(&mut self, index: usize) -> Result<(), CycleError> {
        let row = self.row(index).await?;
        let more = &self.settings.selectors.more_menu;
        let triggers = self
            .client
            .find_elements_from(&row, &Locator::css(more))
            .await?;
        let trigger = triggers.first().ok_or_else(|| CycleError::ActionNotFound {
            label: more.clone(),
        })?;
        self.client.hover(trigger).await?;
        Ok(())
    }

    async fn menu_items(&mut self, label: &str) -> Result<Vec<MenuItem>, CycleError> {
        let ids = self.client.find_elements(&Locator::text(label)).await?;
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let visible = self.client.element_displayed(&id).await?;
            items.push(MenuItem { id, visible });
        }
        Ok(items)
    }

    async fn click_element(&mut self, id: &ElementId) -> Result<(), CycleError> {
        self.client.click(id).await?;
        Ok(())
    }

    async fn dismiss_confirmation(&mut self, timeout: Duration) -> Result<bool, CycleError> {
        let sel = &self.settings.selectors;
        let deadline = deadline_after(timeout);
        let dialog = loop {
            if let Some(dialog) = self.first_displayed(&sel.dialog).await? {
                break dialog;
            }
            if Instant::now() >= deadline {
                debug!("no confirmation dialog");
                return Ok(false);
            }
            sleep(ELEMENT_POLL).await;
        };
        let confirm = self
            .client
            .find_elements_from(&dialog, &Locator::css(&sel.dialog_confirm))
            .await?;
        if let Some(button) = confirm.first() {
            self.client.click(button).await?;
            sleep(AFTER_CONFIRM).await;
        }
        Ok(true)
    }

    async fn close(&mut self) -> Result<(), CycleError> {
        self.client.delete_session().await?;
        Ok(())
    }
}
