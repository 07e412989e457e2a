use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::{Browser, BrowserError, BrowserLauncher, ButtonSnapshot, LoginState};
use crate::clock::{Clock, MAX_WAIT_STEP, wait_until};
use crate::models::EnrollmentTarget;
use crate::timezone::LocalZone;

/// Present in the button markup once the user holds a place.
pub const ENROLLED_MARKER: &str = "ng-star-inserted";
pub const DISABLED_CLASS: &str = "disabled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Enrolled,
    Disabled,
    Unrecognized,
}

pub fn classify(snapshot: &ButtonSnapshot) -> ButtonState {
    if snapshot.inner_html.contains(ENROLLED_MARKER) {
        ButtonState::Enrolled
    } else if snapshot
        .class
        .split_whitespace()
        .any(|token| token == DISABLED_CLASS)
    {
        ButtonState::Disabled
    } else {
        ButtonState::Unrecognized
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    AlreadyEnrolled,
    Enrolled { attempts: u32 },
    /// The button ended up neither enrolled nor disabled; `markup` is its inner HTML.
    Unrecognized { attempts: u32, markup: String },
}

#[derive(Debug, Error)]
pub enum EnrollError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("enrollment cancelled")]
    Cancelled,
    #[error("gave up after {0} attempts while the register button stayed disabled")]
    AttemptsExhausted(u32),
}

#[derive(Debug, Clone)]
pub struct EnrollSettings {
    pub login_url: String,
    pub element_timeout: Duration,
    pub login_timeout: Duration,
    /// How long before the open time the registration loop starts.
    pub lead: Duration,
    pub click_interval: Duration,
    pub max_attempts: Option<u32>,
    pub zone: LocalZone,
}

impl Default for EnrollSettings {
    fn default() -> Self {
        Self {
            login_url: "https://auth.asvz.ch/account/login".to_string(),
            element_timeout: Duration::from_secs(5),
            login_timeout: Duration::from_secs(360),
            lead: Duration::ZERO,
            click_interval: Duration::ZERO,
            max_attempts: None,
            zone: LocalZone::System,
        }
    }
}

/// Drives the login check, the wait for the open time and the registration clicks.
pub struct Enroller<L, C> {
    launcher: L,
    clock: C,
    settings: EnrollSettings,
    cancel: CancellationToken,
}

impl<L: BrowserLauncher, C: Clock> Enroller<L, C> {
    pub fn new(launcher: L, clock: C, settings: EnrollSettings, cancel: CancellationToken) -> Self {
        Self {
            launcher,
            clock,
            settings,
            cancel,
        }
    }

    pub async fn run(&self, target: &EnrollmentTarget) -> Result<EnrollmentOutcome, EnrollError> {
        let url = target.entry.url.as_str();
        self.ensure_logged_in(url).await?;
        self.wait_for_open(target.entry.oe_from_date).await?;
        self.register(url).await
    }

    pub fn threshold(&self, opens_at: DateTime<Utc>) -> DateTime<Utc> {
        match chrono::Duration::from_std(self.settings.lead) {
            Ok(lead) => opens_at - lead,
            Err(_) => opens_at,
        }
    }

    pub async fn ensure_logged_in(&self, url: &str) -> Result<LoginState, EnrollError> {
        if self.cancel.is_cancelled() {
            return Err(EnrollError::Cancelled);
        }
        let mut browser = self.guarded(self.launcher.launch()).await?;
        let result = self.check_login(&mut *browser, url).await;
        finish(result, browser.close().await)
    }

    async fn check_login(
        &self,
        browser: &mut dyn Browser,
        url: &str,
    ) -> Result<LoginState, EnrollError> {
        self.guarded(browser.goto(url)).await?;
        let state = self
            .guarded(browser.login_state(self.settings.element_timeout))
            .await?;
        match state {
            LoginState::RequiresLogin => {
                info!(
                    timeout_secs = self.settings.login_timeout.as_secs(),
                    "Login required, complete it in the browser window"
                );
                self.guarded(browser.goto(&self.settings.login_url)).await?;
                self.guarded(browser.wait_for_login(self.settings.login_timeout))
                    .await?;
                info!("Logged in!");
            }
            LoginState::Authenticated => debug!("already logged in"),
            LoginState::Indeterminate => {
                warn!("enrollment control not found, assuming an existing login")
            }
        }
        Ok(state)
    }

    pub async fn wait_for_open(&self, opens_at: DateTime<Utc>) -> Result<(), EnrollError> {
        let threshold = self.threshold(opens_at);
        info!(
            opens_at = %self.settings.zone.to_local(opens_at),
            start_at = %self.settings.zone.to_local(threshold),
            "Waiting for enrollment timeslot"
        );
        wait_until(&self.clock, threshold, MAX_WAIT_STEP, &self.cancel)
            .await
            .map_err(|_| EnrollError::Cancelled)
    }

    pub async fn register(&self, url: &str) -> Result<EnrollmentOutcome, EnrollError> {
        if self.cancel.is_cancelled() {
            return Err(EnrollError::Cancelled);
        }
        let mut browser = self.guarded(self.launcher.launch()).await?;
        let result = self.register_loop(&mut *browser, url).await;
        finish(result, browser.close().await)
    }

    async fn register_loop(
        &self,
        browser: &mut dyn Browser,
        url: &str,
    ) -> Result<EnrollmentOutcome, EnrollError> {
        let timeout = self.settings.element_timeout;
        self.guarded(browser.goto(url)).await?;
        let snapshot = self.guarded(browser.register_button(timeout)).await?;
        if classify(&snapshot) == ButtonState::Enrolled {
            info!("Already enrolled");
            return Ok(EnrollmentOutcome::AlreadyEnrolled);
        }

        let mut attempts = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(EnrollError::Cancelled);
            }
            if let Some(max) = self.settings.max_attempts
                && attempts >= max
            {
                return Err(EnrollError::AttemptsExhausted(attempts));
            }

            self.guarded(browser.click_register(timeout)).await?;
            attempts += 1;
            let snapshot = self.guarded(browser.register_button(timeout)).await?;

            match classify(&snapshot) {
                ButtonState::Enrolled => {
                    info!(attempts, "Successfully enrolled");
                    return Ok(EnrollmentOutcome::Enrolled { attempts });
                }
                ButtonState::Disabled => {
                    debug!(attempts, "register button still disabled");
                    self.pause().await?;
                }
                ButtonState::Unrecognized => {
                    warn!(
                        attempts,
                        class = %snapshot.class,
                        markup = %snapshot.inner_html,
                        "Oops, something went wrong"
                    );
                    return Ok(EnrollmentOutcome::Unrecognized {
                        attempts,
                        markup: snapshot.inner_html,
                    });
                }
            }
        }
    }

    /// Runs one browser step, abandoning it as soon as the run is cancelled.
    async fn guarded<T>(
        &self,
        step: impl Future<Output = Result<T, BrowserError>>,
    ) -> Result<T, EnrollError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EnrollError::Cancelled),
            result = step => Ok(result?),
        }
    }

    async fn pause(&self) -> Result<(), EnrollError> {
        if self.settings.click_interval.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EnrollError::Cancelled),
            _ = self.clock.sleep(self.settings.click_interval) => Ok(()),
        }
    }
}

/// Keeps the first failure; a close error only surfaces when the work itself succeeded.
fn finish<T>(
    result: Result<T, EnrollError>,
    closed: Result<(), BrowserError>,
) -> Result<T, EnrollError> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(error = %close_err, "failed to close browser");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(inner_html: &str, class: &str) -> ButtonSnapshot {
        ButtonSnapshot {
            inner_html: inner_html.to_string(),
            class: class.to_string(),
        }
    }

    #[test]
    fn test_classify_enrolled_wins_over_disabled() {
        let enrolled = r#"<span class="ng-star-inserted">Abmelden</span>"#;
        assert_eq!(classify(&snapshot(enrolled, "btn")), ButtonState::Enrolled);
        assert_eq!(
            classify(&snapshot(enrolled, "btn disabled")),
            ButtonState::Enrolled
        );
    }

    #[test]
    fn test_classify_disabled_token() {
        assert_eq!(
            classify(&snapshot("Einschreiben", "btn btn-primary disabled")),
            ButtonState::Disabled
        );
        assert_eq!(
            classify(&snapshot("Einschreiben", "btn-disabled")),
            ButtonState::Unrecognized
        );
    }

    #[test]
    fn test_classify_every_input_lands_in_one_bucket() {
        let enrolled = r#"<span class="ng-star-inserted"></span>"#;
        let cases = [
            ("", "", ButtonState::Unrecognized),
            ("", "btn", ButtonState::Unrecognized),
            ("", "disabled", ButtonState::Disabled),
            ("", "btn disabled", ButtonState::Disabled),
            ("", "btn-disabled", ButtonState::Unrecognized),
            ("Einschreiben", "", ButtonState::Unrecognized),
            ("Einschreiben", "btn", ButtonState::Unrecognized),
            ("Einschreiben", "disabled", ButtonState::Disabled),
            ("Einschreiben", "btn disabled", ButtonState::Disabled),
            ("Einschreiben", "btn-disabled", ButtonState::Unrecognized),
            ("Einschreiben", "Disabled", ButtonState::Unrecognized),
            (enrolled, "", ButtonState::Enrolled),
            (enrolled, "btn", ButtonState::Enrolled),
            (enrolled, "disabled", ButtonState::Enrolled),
            (enrolled, "btn disabled", ButtonState::Enrolled),
            (enrolled, "btn-disabled", ButtonState::Enrolled),
        ];
        for (html, class, expected) in cases {
            assert_eq!(
                classify(&snapshot(html, class)),
                expected,
                "html={html:?} class={class:?}"
            );
        }
    }

    #[test]
    fn test_finish_prefers_work_error() {
        let result: Result<(), _> = finish(
            Err(EnrollError::Cancelled),
            Err(BrowserError::Launch("gone".into())),
        );
        assert!(matches!(result, Err(EnrollError::Cancelled)));

        let result = finish(Ok(1), Err(BrowserError::Launch("gone".into())));
        assert!(matches!(result, Err(EnrollError::Browser(_))));
    }
}
