use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::BrowserError;
use crate::webdriver::WebDriverClient;

const READY_POLL: Duration = Duration::from_millis(200);

pub fn default_chromedriver_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("chromedriver.exe")
    } else {
        PathBuf::from("chromedriver")
    }
}

/// A WebDriver endpoint, optionally backed by a chromedriver we started ourselves.
pub struct ChromeDriver {
    url: Url,
    child: Option<Child>,
}

impl ChromeDriver {
    /// Uses an already running WebDriver server.
    pub fn external(url: Url) -> Self {
        Self { url, child: None }
    }

    /// Starts `path --port=<port of url>` and waits until `/status` reports ready.
    pub async fn spawn(path: &Path, url: Url, ready_timeout: Duration) -> Result<Self, BrowserError> {
        let port = url
            .port_or_known_default()
            .ok_or_else(|| BrowserError::Launch(format!("no port in WebDriver URL {url}")))?;

        let mut cmd = Command::new(path);
        cmd.arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            BrowserError::Launch(format!("failed to start {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), port, "chromedriver spawned");

        let client = WebDriverClient::new(url.clone());
        let started = Instant::now();
        let mut last_error = "endpoint not reachable".to_string();
        loop {
            tokio::time::sleep(READY_POLL).await;

            if let Ok(Some(status)) = child.try_wait() {
                return Err(BrowserError::Launch(format!(
                    "chromedriver exited before becoming ready (status: {status})"
                )));
            }

            match client.status().await {
                Ok(true) => {
                    info!(%url, "chromedriver ready");
                    return Ok(Self {
                        url,
                        child: Some(child),
                    });
                }
                Ok(false) => last_error = "not ready".to_string(),
                Err(err) => last_error = err.to_string(),
            }

            if started.elapsed() >= ready_timeout {
                return Err(BrowserError::Launch(format!(
                    "chromedriver on port {port} not ready after {}ms: {last_error}",
                    ready_timeout.as_millis()
                )));
            }
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Some(mut child) = self.child.take()
            && let Err(err) = child.kill().await
        {
            warn!(error = %err, "failed to stop chromedriver");
        }
    }
}
