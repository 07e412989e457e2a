use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Longest single sleep while waiting for a deadline, so clock adjustments are noticed.
pub const MAX_WAIT_STEP: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("wait cancelled")]
pub struct Cancelled;

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub fn is_due(now: DateTime<Utc>, threshold: DateTime<Utc>) -> bool {
    now >= threshold
}

/// Sleeps until `clock` reads at least `deadline`, or until `cancel` fires.
pub async fn wait_until<C: Clock + ?Sized>(
    clock: &C,
    deadline: DateTime<Utc>,
    max_step: Duration,
    cancel: &CancellationToken,
) -> Result<(), Cancelled> {
    loop {
        let now = clock.now();
        if is_due(now, deadline) {
            return Ok(());
        }
        let remaining = (deadline - now).to_std().unwrap_or(Duration::ZERO);
        let step = remaining.min(max_step);
        debug!(remaining_ms = remaining.as_millis() as u64, "waiting for deadline");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled),
            _ = clock.sleep(step) => {}
        }
    }
}
