use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::webdriver::{
    ElementId, Locator, SessionId, WebDriverClient, WebDriverError, chrome_capabilities,
};

/// Enrollment-action control on a lesson detail page; titled "Login" for anonymous visitors.
pub const LESSON_BUTTON_XPATH: &str =
    "/html/body/app-root/div/div[2]/app-lesson-details/div/div/app-lessons-enrollment-button/button";
pub const REGISTER_BUTTON_ID: &str = "btnRegister";
pub const LOGGED_IN_SELECTOR: &str = "#LoggedInUser";
pub const LOGIN_TITLE: &str = "Login";

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("timeout after {ms}ms waiting for: {condition}")]
    Timeout { ms: u64, condition: String },
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error(transparent)]
    WebDriver(#[from] WebDriverError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Authenticated,
    RequiresLogin,
    /// The enrollment control never showed up, so the page gave no answer.
    Indeterminate,
}

/// What the registration button looked like when it was last read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ButtonSnapshot {
    pub inner_html: String,
    pub class: String,
}

/// One open browser window driven on the user's behalf.
#[async_trait]
pub trait Browser: Send {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;
    async fn login_state(&mut self, timeout: Duration) -> Result<LoginState, BrowserError>;
    async fn wait_for_login(&mut self, timeout: Duration) -> Result<(), BrowserError>;
    async fn register_button(&mut self, timeout: Duration) -> Result<ButtonSnapshot, BrowserError>;
    async fn click_register(&mut self, timeout: Duration) -> Result<(), BrowserError>;
    async fn close(&mut self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Browser>, BrowserError>;
}

/// Starts Chrome sessions that share one persistent profile directory.
#[derive(Clone)]
pub struct ChromeLauncher {
    client: WebDriverClient,
    profile_dir: PathBuf,
    poll_interval: Duration,
}

impl ChromeLauncher {
    pub fn new(client: WebDriverClient, profile_dir: PathBuf, poll_interval: Duration) -> Self {
        Self {
            client,
            profile_dir,
            poll_interval,
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn Browser>, BrowserError> {
        let session = self
            .client
            .new_session(chrome_capabilities(&self.profile_dir))
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;
        debug!(session = %session.0, profile = %self.profile_dir.display(), "browser session started");
        Ok(Box::new(ChromeSession {
            client: self.client.clone(),
            session,
            poll_interval: self.poll_interval,
            closed: false,
        }))
    }
}

pub struct ChromeSession {
    client: WebDriverClient,
    session: SessionId,
    poll_interval: Duration,
    closed: bool,
}

impl ChromeSession {
    async fn wait_for_element(
        &self,
        locator: Locator<'_>,
        timeout: Duration,
    ) -> Result<ElementId, BrowserError> {
        let started = Instant::now();
        loop {
            match self.client.find_element(&self.session, locator).await {
                Ok(element) => return Ok(element),
                Err(WebDriverError::NoSuchElement(_)) => {}
                Err(err) => return Err(err.into()),
            }
            if started.elapsed() >= timeout {
                return Err(BrowserError::Timeout {
                    ms: timeout.as_millis() as u64,
                    condition: locator.to_string(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn find_register_button(&self, timeout: Duration) -> Result<ElementId, BrowserError> {
        self.wait_for_element(Locator::Id(REGISTER_BUTTON_ID), timeout)
            .await
            .map_err(|err| match err {
                BrowserError::Timeout { .. } => {
                    BrowserError::ElementNotFound(Locator::Id(REGISTER_BUTTON_ID).to_string())
                }
                other => other,
            })
    }

    async fn read_button(&self, element: &ElementId) -> Result<ButtonSnapshot, WebDriverError> {
        let inner_html = self
            .client
            .property(&self.session, element, "innerHTML")
            .await?
            .unwrap_or_default();
        let class = self
            .client
            .attribute(&self.session, element, "class")
            .await?
            .unwrap_or_default();
        Ok(ButtonSnapshot { inner_html, class })
    }
}

#[async_trait]
impl Browser for ChromeSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        debug!(%url, "navigating");
        self.client.navigate(&self.session, url).await?;
        Ok(())
    }

    async fn login_state(&mut self, timeout: Duration) -> Result<LoginState, BrowserError> {
        let element = match self
            .wait_for_element(Locator::XPath(LESSON_BUTTON_XPATH), timeout)
            .await
        {
            Ok(element) => element,
            Err(BrowserError::Timeout { .. }) => return Ok(LoginState::Indeterminate),
            Err(err) => return Err(err),
        };
        let title = self.client.attribute(&self.session, &element, "title").await?;
        Ok(match title.as_deref() {
            Some(LOGIN_TITLE) => LoginState::RequiresLogin,
            _ => LoginState::Authenticated,
        })
    }

    async fn wait_for_login(&mut self, timeout: Duration) -> Result<(), BrowserError> {
        self.wait_for_element(Locator::Css(LOGGED_IN_SELECTOR), timeout)
            .await?;
        Ok(())
    }

    async fn register_button(&mut self, timeout: Duration) -> Result<ButtonSnapshot, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            let element = self.find_register_button(timeout).await?;
            match self.read_button(&element).await {
                Ok(snapshot) => return Ok(snapshot),
                // Angular re-rendered the button between lookup and read.
                Err(WebDriverError::StaleElement(_)) if Instant::now() < deadline => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn click_register(&mut self, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            let element = self.find_register_button(timeout).await?;
            match self.client.click(&self.session, &element).await {
                Ok(()) => return Ok(()),
                Err(WebDriverError::StaleElement(_)) if Instant::now() < deadline => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        if self.closed {
            return Ok(());
        }
        self.client.delete_session(&self.session).await?;
        self.closed = true;
        debug!(session = %self.session.0, "browser session closed");
        Ok(())
    }
}
