pub mod browser;
pub mod chromedriver;
pub mod cli;
pub mod clock;
pub mod enroll;
pub mod error;
pub mod facilities;
pub mod lookup;
pub mod models;
pub mod settings;
pub mod timezone;
pub mod validation;
pub mod webdriver;

use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::browser::ChromeLauncher;
use crate::chromedriver::ChromeDriver;
use crate::cli::Cli;
use crate::clock::SystemClock;
use crate::enroll::{EnrollmentOutcome, Enroller};
use crate::error::AppError;
use crate::facilities::default_catalog;
use crate::lookup::SlotFinder;
use crate::settings::Settings;
use crate::validation::SLOT_FORMAT;
use crate::webdriver::WebDriverClient;

const DRIVER_READY_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;
    if let Some(lead) = cli.lead_ms {
        settings.enrollment_lead_ms = lead;
    }

    init_logging(settings.debug, cli.verbose);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupted, stopping (press Ctrl-C again to exit immediately)");
        interrupt.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(AppError::Cancelled.exit_code());
        }
    });

    execute(cli, settings, cancel).await
}

/// Default directives when `RUST_LOG` is unset: `SNIPER_DEBUG` or `-v` turn on
/// debug output for this crate only, `-vv` for every crate.
fn log_filter(debug: bool, verbosity: u8) -> &'static str {
    match verbosity {
        0 if !debug => "info",
        0 | 1 => "info,asvz_sniper=debug",
        _ => "debug",
    }
}

fn init_logging(debug: bool, verbosity: u8) {
    let filter = log_filter(debug, verbosity);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

/// Looks up the session and, unless `--dry-run`, drives the browser through enrollment.
pub async fn execute(
    cli: Cli,
    settings: Settings,
    cancel: CancellationToken,
) -> Result<(), AppError> {
    let zone = settings.zone().map_err(AppError::Config)?;
    let enroll_settings = settings.enroll_settings().map_err(AppError::Config)?;

    let finder = SlotFinder::new(
        settings.search_base_url.clone(),
        default_catalog().clone(),
        zone,
    );
    let target = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AppError::Cancelled),
        found = finder.find_slot(&cli.facility, cli.slot) => found?,
    };

    if cli.dry_run {
        info!(
            facility = %target.facility,
            starts_at = %zone.to_local(target.entry.from_date).format(SLOT_FORMAT),
            opens_at = %zone.to_local(target.entry.oe_from_date).format(SLOT_FORMAT),
            places_free = target.entry.places_free,
            url = %target.entry.url,
            "dry run, not enrolling"
        );
        return Ok(());
    }

    let driver = if settings.launch_chromedriver {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            spawned = ChromeDriver::spawn(
                &settings.chromedriver_path,
                settings.webdriver_url.clone(),
                DRIVER_READY_TIMEOUT,
            ) => spawned?,
        }
    } else {
        ChromeDriver::external(settings.webdriver_url.clone())
    };

    let launcher = ChromeLauncher::new(
        WebDriverClient::new(driver.url().clone()),
        settings.profile_dir.clone(),
        settings.poll_interval(),
    );
    let enroller = Enroller::new(launcher, SystemClock, enroll_settings, cancel);
    let outcome = enroller.run(&target).await;
    driver.shutdown().await;

    match outcome? {
        EnrollmentOutcome::AlreadyEnrolled | EnrollmentOutcome::Enrolled { .. } => Ok(()),
        EnrollmentOutcome::Unrecognized { attempts, markup } => {
            Err(AppError::UnrecognizedState { attempts, markup })
        }
    }
}
