// Minimal W3C WebDriver client over reqwest (chromedriver / geckodriver)

use super::Capabilities;
use crate::console::ElementId;
use crate::error::CycleError;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Key under which W3C drivers serialize element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a6c6-ae46a4e43a2b";

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("webdriver http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webdriver {error}: {message}")]
    Protocol { error: String, message: String },

    #[error("unexpected webdriver response: {0}")]
    Malformed(String),

    #[error("no webdriver session")]
    NoSession,
}

impl From<WebDriverError> for CycleError {
    fn from(e: WebDriverError) -> Self {
        CycleError::Driver(e.to_string())
    }
}

/// Element lookup strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(s: impl Into<String>) -> Self {
        Locator::Css(s.into())
    }

    /// Elements owning a text node equal to `text` (whitespace-normalized).
    pub fn text(text: &str) -> Self {
        Locator::XPath(format!(
            "//*[text()[normalize-space(.)={}]]",
            xpath_literal(text.trim())
        ))
    }

    fn to_json(&self) -> Value {
        match self {
            Locator::Css(v) => json!({ "using": "css selector", "value": v }),
            Locator::XPath(v) => json!({ "using": "xpath", "value": v }),
        }
    }
}

/// Quote `s` as an XPath 1.0 string literal. XPath has no escapes, so a string holding both
/// quote kinds becomes a `concat()` of pieces.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{s}'");
    }
    if !s.contains('"') {
        return format!("\"{s}\"");
    }
    let parts: Vec<String> = s
        .split('\'')
        .map(|p| format!("'{p}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Pull element ids out of a `find elements` result.
pub fn parse_element_ids(value: &Value) -> Result<Vec<ElementId>, WebDriverError> {
    let list = value
        .as_array()
        .ok_or_else(|| WebDriverError::Malformed(format!("expected element list, got {value}")))?;
    list.iter()
        .map(|v| {
            v.get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| ElementId(id.to_string()))
                .ok_or_else(|| WebDriverError::Malformed(format!("not an element reference: {v}")))
        })
        .collect()
}

pub struct WebDriverClient {
    http: Client,
    base_url: String,
    session_id: Option<String>,
}

impl WebDriverClient {
    pub fn new(base_url: &str) -> Result<Self, WebDriverError> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_id: None,
        })
    }

    /// Connect to the driver at `base_url` and start a browser session.
    pub async fn connect(base_url: &str, caps: &Capabilities) -> Result<Self, WebDriverError> {
        let mut client = Self::new(base_url)?;
        client.new_session(caps).await?;
        Ok(client)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub async fn new_session(&mut self, caps: &Capabilities) -> Result<(), WebDriverError> {
        let url = format!("{}/session", self.base_url);
        let value = self.send(Method::POST, url, Some(caps.to_json())).await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| WebDriverError::Malformed(format!("no sessionId in {value}")))?;
        debug!(session_id = id, browser = ?caps.kind, "webdriver session started");
        self.session_id = Some(id.to_string());
        Ok(())
    }

    pub async fn delete_session(&mut self) -> Result<(), WebDriverError> {
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };
        let url = format!("{}/session/{}", self.base_url, id);
        self.send(Method::DELETE, url, None).await?;
        debug!(session_id = %id, "webdriver session closed");
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<(), WebDriverError> {
        let path = self.session_path("url")?;
        self.send(Method::POST, path, Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String, WebDriverError> {
        let path = self.session_path("url")?;
        let value = self.send(Method::GET, path, None).await?;
        as_string(value)
    }

    pub async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementId>, WebDriverError> {
        let path = self.session_path("elements")?;
        let value = self.send(Method::POST, path, Some(locator.to_json())).await?;
        parse_element_ids(&value)
    }

    /// Find elements below `parent`.
    pub async fn find_elements_from(
        &self,
        parent: &ElementId,
        locator: &Locator,
    ) -> Result<Vec<ElementId>, WebDriverError> {
        let path = self.element_path(parent, "elements")?;
        let value = self.send(Method::POST, path, Some(locator.to_json())).await?;
        parse_element_ids(&value)
    }

    pub async fn element_text(&self, id: &ElementId) -> Result<String, WebDriverError> {
        let path = self.element_path(id, "text")?;
        let value = self.send(Method::GET, path, None).await?;
        as_string(value)
    }

    pub async fn element_displayed(&self, id: &ElementId) -> Result<bool, WebDriverError> {
        let path = self.element_path(id, "displayed")?;
        let value = self.send(Method::GET, path, None).await?;
        value
            .as_bool()
            .ok_or_else(|| WebDriverError::Malformed(format!("expected bool, got {value}")))
    }

    pub async fn click(&self, id: &ElementId) -> Result<(), WebDriverError> {
        let path = self.element_path(id, "click")?;
        self.send(Method::POST, path, Some(json!({}))).await?;
        Ok(())
    }

    pub async fn clear(&self, id: &ElementId) -> Result<(), WebDriverError> {
        let path = self.element_path(id, "clear")?;
        self.send(Method::POST, path, Some(json!({}))).await?;
        Ok(())
    }

    pub async fn send_keys(&self, id: &ElementId, text: &str) -> Result<(), WebDriverError> {
        let path = self.element_path(id, "value")?;
        self.send(Method::POST, path, Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    /// Move the pointer over `id`, for menus that open on hover.
    pub async fn hover(&self, id: &ElementId) -> Result<(), WebDriverError> {
        let path = self.session_path("actions")?;
        let body = json!({
            "actions": [{
                "type": "pointer",
                "id": "mouse",
                "parameters": { "pointerType": "mouse" },
                "actions": [{
                    "type": "pointerMove",
                    "duration": 100,
                    "origin": { ELEMENT_KEY: id.0 },
                    "x": 0,
                    "y": 0
                }]
            }]
        });
        self.send(Method::POST, path, Some(body)).await?;
        Ok(())
    }

    fn session_path(&self, tail: &str) -> Result<String, WebDriverError> {
        let id = self.session_id.as_deref().ok_or(WebDriverError::NoSession)?;
        Ok(format!("{}/session/{}/{}", self.base_url, id, tail))
    }

    fn element_path(&self, element: &ElementId, tail: &str) -> Result<String, WebDriverError> {
        self.session_path(&format!("element/{}/{}", element.0, tail))
    }

    /// Issue one command and unwrap the `value` member of the reply.
    async fn send(
        &self,
        method: Method,
        url: String,
        body: Option<Value>,
    ) -> Result<Value, WebDriverError> {
        let mut req = self.http.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let mut payload: Value = resp.json().await?;
        let mut value = payload
            .get_mut("value")
            .map(Value::take)
            .unwrap_or(Value::Null);

        if let Some(error) = value.get("error").and_then(Value::as_str) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(WebDriverError::Protocol {
                error: error.to_string(),
                message,
            });
        }
        if !status.is_success() {
            return Err(WebDriverError::Malformed(format!(
                "HTTP {status} from {url}: {}",
                value.take()
            )));
        }
        Ok(value)
    }
}

fn as_string(value: Value) -> Result<String, WebDriverError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(WebDriverError::Malformed(format!("expected string, got {other}"))),
    }
}
