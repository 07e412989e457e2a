//! Minimal W3C WebDriver client.
//!
//! Speaks the JSON-over-HTTP protocol served by chromedriver. Every response is
//! wrapped in a `{"value": ...}` envelope; failures carry
//! `{"value": {"error": "...", "message": "..."}}` with a non-2xx status.

use std::path::Path;
use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

/// Key under which the protocol returns element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("stale element reference: {0}")]
    StaleElement(String),
    #[error("webdriver error {error}: {message}")]
    Protocol { error: String, message: String },
    #[error("unexpected webdriver response: {0}")]
    Decode(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid WebDriver URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator<'a> {
    Css(&'a str),
    XPath(&'a str),
    Id(&'a str),
}

impl Locator<'_> {
    fn strategy(&self) -> (&'static str, String) {
        match self {
            Locator::Css(selector) => ("css selector", selector.to_string()),
            Locator::XPath(path) => ("xpath", path.to_string()),
            Locator::Id(id) => ("css selector", format!("[id=\"{id}\"]")),
        }
    }
}

impl std::fmt::Display for Locator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css {selector}"),
            Locator::XPath(path) => write!(f, "xpath {path}"),
            Locator::Id(id) => write!(f, "id {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementId(pub String);

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
struct ErrorValue {
    error: String,
    #[serde(default)]
    message: String,
}

fn decode_error(value: Value) -> WebDriverError {
    match serde_json::from_value::<ErrorValue>(value.clone()) {
        Ok(err) => match err.error.as_str() {
            "no such element" => WebDriverError::NoSuchElement(err.message),
            "stale element reference" => WebDriverError::StaleElement(err.message),
            _ => WebDriverError::Protocol {
                error: err.error,
                message: err.message,
            },
        },
        Err(_) => WebDriverError::Decode(value.to_string()),
    }
}

/// Capabilities for a Chrome session that keeps cookies in `profile_dir`.
pub fn chrome_capabilities(profile_dir: &Path) -> Value {
    json!({
        "alwaysMatch": {
            "browserName": "chrome",
            "goog:chromeOptions": {
                "args": [format!("--user-data-dir={}", profile_dir.display())]
            }
        }
    })
}

#[derive(Clone)]
pub struct WebDriverClient {
    client: reqwest::Client,
    base_url: Arc<Url>,
}

impl WebDriverClient {
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::new(base_url),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, WebDriverError> {
        let url = self.base_url.join(path)?;
        let mut request = self.client.request(method, url.as_str());
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        let envelope: Envelope = response.json().await?;
        if status.is_success() {
            Ok(envelope.value)
        } else {
            Err(decode_error(envelope.value))
        }
    }

    /// Whether the remote end accepts new sessions.
    pub async fn status(&self) -> Result<bool, WebDriverError> {
        let value = self.call(Method::GET, "status", None).await?;
        Ok(value.get("ready").and_then(Value::as_bool).unwrap_or(false))
    }

    pub async fn new_session(&self, capabilities: Value) -> Result<SessionId, WebDriverError> {
        let value = self
            .call(
                Method::POST,
                "session",
                Some(json!({ "capabilities": capabilities })),
            )
            .await?;
        value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(|id| SessionId(id.to_string()))
            .ok_or_else(|| WebDriverError::Decode(value.to_string()))
    }

    pub async fn navigate(&self, session: &SessionId, url: &str) -> Result<(), WebDriverError> {
        self.call(
            Method::POST,
            &format!("session/{}/url", session.0),
            Some(json!({ "url": url })),
        )
        .await?;
        Ok(())
    }

    pub async fn find_element(
        &self,
        session: &SessionId,
        locator: Locator<'_>,
    ) -> Result<ElementId, WebDriverError> {
        let (using, value) = locator.strategy();
        let found = self
            .call(
                Method::POST,
                &format!("session/{}/element", session.0),
                Some(json!({ "using": using, "value": value })),
            )
            .await?;
        found
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementId(id.to_string()))
            .ok_or_else(|| WebDriverError::Decode(found.to_string()))
    }

    pub async fn attribute(
        &self,
        session: &SessionId,
        element: &ElementId,
        name: &str,
    ) -> Result<Option<String>, WebDriverError> {
        let value = self
            .call(
                Method::GET,
                &format!("session/{}/element/{}/attribute/{name}", session.0, element.0),
                None,
            )
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn property(
        &self,
        session: &SessionId,
        element: &ElementId,
        name: &str,
    ) -> Result<Option<String>, WebDriverError> {
        let value = self
            .call(
                Method::GET,
                &format!("session/{}/element/{}/property/{name}", session.0, element.0),
                None,
            )
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn click(&self, session: &SessionId, element: &ElementId) -> Result<(), WebDriverError> {
        self.call(
            Method::POST,
            &format!("session/{}/element/{}/click", session.0, element.0),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_session(&self, session: &SessionId) -> Result<(), WebDriverError> {
        self.call(Method::DELETE, &format!("session/{}", session.0), None)
            .await?;
        Ok(())
    }
}
