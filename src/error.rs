//! Error handling and custom error types
//!
//! Provides unified error handling across the crate using thiserror. Every
//! terminal job fault maps onto a [`FaultKind`] reported to observers.

use crate::keys::KeyParseError;
use crate::models::{FaultKind, JobFault};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Invalid job parameters: {0}")]
    Validation(String),

    #[error("Upload not authorized: {0}")]
    Authorization(String),

    #[error("Upload location unavailable: {0}")]
    Transient(String),

    #[error("Results store unavailable: {0}")]
    ResultStore(String),

    #[error("Upload failed: {0}")]
    Transfer(String),

    #[error(transparent)]
    KeyParse(#[from] KeyParseError),

    #[error(
        "Resized image did not appear after {attempts} checks; it may still finish processing later"
    )]
    Timeout { attempts: u32 },

    #[error("Cannot {action} while job is {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },

    #[error("Job failed: {}", .0.message)]
    JobFailed(JobFault),

    #[error("Job was cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),
}

impl Error {
    /// Classify this error for presentation. Anything that is not one of the
    /// protocol faults is reported as transient.
    pub fn fault_kind(&self) -> FaultKind {
        match self {
            Error::Validation(_) => FaultKind::Validation,
            Error::Authorization(_) => FaultKind::Authorization,
            Error::Transfer(_) => FaultKind::Transfer,
            Error::KeyParse(_) => FaultKind::Parse,
            Error::Timeout { .. } => FaultKind::Timeout,
            Error::JobFailed(fault) => fault.kind,
            _ => FaultKind::Transient,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_kind_mapping() {
        assert_eq!(
            Error::Authorization("denied".to_string()).fault_kind(),
            FaultKind::Authorization
        );
        assert_eq!(
            Error::KeyParse(KeyParseError {
                key: "garbage".to_string()
            })
            .fault_kind(),
            FaultKind::Parse
        );
        assert_eq!(
            Error::Timeout { attempts: 3 }.fault_kind(),
            FaultKind::Timeout
        );
        assert_eq!(
            Error::S3("boom".to_string()).fault_kind(),
            FaultKind::Transient
        );
    }

    #[test]
    fn test_result_store_failures_name_the_results_stage() {
        let err = Error::ResultStore("answered status 503 on check 1".to_string());
        assert_eq!(err.fault_kind(), FaultKind::Transient);
        assert_eq!(
            err.to_string(),
            "Results store unavailable: answered status 503 on check 1"
        );
        assert!(!err.to_string().contains("Upload"));
    }

    #[test]
    fn test_timeout_message_mentions_late_completion() {
        let message = Error::Timeout { attempts: 30 }.to_string();
        assert!(message.contains("30 checks"));
        assert!(message.contains("may still finish"));
    }
}
