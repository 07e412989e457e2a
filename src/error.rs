use thiserror::Error;
use tracing::error;

use crate::browser::BrowserError;
use crate::enroll::EnrollError;
use crate::lookup::LookupError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    SlotFull(String),
    #[error("{0}")]
    ElementNotFound(String),
    #[error("{0}")]
    Timeout(String),
    #[error("registration ended in an unrecognized state after {attempts} attempts")]
    UnrecognizedState { attempts: u32, markup: String },
    #[error("cancelled")]
    Cancelled,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Cancelled => 130,
            _ => 1,
        }
    }
}

impl From<LookupError> for AppError {
    fn from(value: LookupError) -> Self {
        match value {
            LookupError::InvalidArgument(msg) => AppError::InvalidArgument(msg),
            LookupError::NotFound(_) => AppError::NotFound(value.to_string()),
            LookupError::SlotFull(_) => AppError::SlotFull(value.to_string()),
            LookupError::Http(err) => {
                error!("HTTP error: {err}");
                AppError::Internal("Failed to fetch the session list".into())
            }
            LookupError::Url(err) => AppError::Config(err.to_string()),
        }
    }
}

impl From<BrowserError> for AppError {
    fn from(value: BrowserError) -> Self {
        match value {
            BrowserError::ElementNotFound(_) => AppError::ElementNotFound(value.to_string()),
            BrowserError::Timeout { .. } => AppError::Timeout(value.to_string()),
            BrowserError::Launch(_) | BrowserError::WebDriver(_) => {
                AppError::Internal(value.to_string())
            }
        }
    }
}

impl From<EnrollError> for AppError {
    fn from(value: EnrollError) -> Self {
        match value {
            EnrollError::Browser(err) => err.into(),
            EnrollError::Cancelled => AppError::Cancelled,
            EnrollError::AttemptsExhausted(_) => AppError::Timeout(value.to_string()),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(value: config::ConfigError) -> Self {
        AppError::Config(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_errors_map_to_taxonomy() {
        let err: AppError = LookupError::InvalidArgument("Facility X".into()).into();
        assert!(matches!(err, AppError::InvalidArgument(_)));

        let err: AppError = LookupError::NotFound("2021.05.03-09:00".into()).into();
        assert_eq!(err.to_string(), "Could not find any slots at 2021.05.03-09:00");

        let err: AppError = LookupError::SlotFull("2021.05.03-09:00".into()).into();
        assert!(matches!(err, AppError::SlotFull(_)));
    }

    #[test]
    fn test_enroll_errors_map_to_taxonomy() {
        let err: AppError = EnrollError::Cancelled.into();
        assert_eq!(err.exit_code(), 130);

        let err: AppError = EnrollError::Browser(BrowserError::Timeout {
            ms: 1000,
            condition: "css #LoggedInUser".into(),
        })
        .into();
        assert!(matches!(err, AppError::Timeout(_)));
        assert_eq!(err.exit_code(), 1);

        let err: AppError =
            EnrollError::Browser(BrowserError::ElementNotFound("id btnRegister".into())).into();
        assert!(matches!(err, AppError::ElementNotFound(_)));
    }
}
