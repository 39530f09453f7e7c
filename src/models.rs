//! Data models and structures
//!
//! Defines job parameters and state, the broker wire types, and the
//! environment-driven configuration.

use crate::keys::{ObjectKey, OutputLocation, DEFAULT_OUTPUT_EXTENSION};
use crate::poller::PollPolicy;
use crate::{Error, Result};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_QUALITY: u8 = 85;
pub const DEFAULT_DIMENSION: u32 = 128;
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Job input as typed by a user, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub file_name: String,
    pub quality: String,
    pub max_width: String,
    pub max_height: String,
    pub content_type: String,
}

impl JobRequest {
    pub fn new(
        file_name: impl Into<String>,
        quality: impl Into<String>,
        max_width: impl Into<String>,
        max_height: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            quality: quality.into(),
            max_width: max_width.into(),
            max_height: max_height.into(),
            content_type: content_type.into(),
        }
    }

    /// Clamp the numeric fields into range and reject an empty file name.
    ///
    /// Quality is clamped to `[1, 100]` and falls back to [`DEFAULT_QUALITY`]
    /// when it is not a number. Dimensions are clamped to at least 1 and fall
    /// back to [`DEFAULT_DIMENSION`] when they are zero or not a number.
    pub fn validate(&self) -> Result<JobParameters> {
        let file_name = self.file_name.trim();
        if file_name.is_empty() {
            return Err(Error::Validation("file name must not be empty".to_string()));
        }

        let content_type = match self.content_type.trim() {
            "" => DEFAULT_CONTENT_TYPE,
            other => other,
        };

        Ok(JobParameters {
            file_name: file_name.to_string(),
            quality: parse_quality(&self.quality),
            max_width: parse_dimension(&self.max_width),
            max_height: parse_dimension(&self.max_height),
            content_type: content_type.to_string(),
        })
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(f64::trunc)
}

fn parse_quality(raw: &str) -> u8 {
    match parse_number(raw) {
        Some(value) => value.clamp(1.0, 100.0) as u8,
        None => DEFAULT_QUALITY,
    }
}

fn parse_dimension(raw: &str) -> u32 {
    match parse_number(raw) {
        Some(value) if value != 0.0 => value.clamp(1.0, u32::MAX as f64) as u32,
        _ => DEFAULT_DIMENSION,
    }
}

/// Validated, immutable parameters of one resize job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParameters {
    pub file_name: String,
    pub quality: u8,
    pub max_width: u32,
    pub max_height: u32,
    pub content_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultKind {
    Validation,
    Authorization,
    Transient,
    Transfer,
    Parse,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFault {
    pub kind: FaultKind,
    pub message: String,
}

impl From<&Error> for JobFault {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.fault_kind(),
            message: error.to_string(),
        }
    }
}

/// Readable reference to a finished artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputReference {
    pub location: OutputLocation,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    RequestingLocation,
    Uploading,
    AwaitingResult,
    Succeeded(OutputReference),
    Failed(JobFault),
    Cancelled,
}

impl JobState {
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::RequestingLocation => "requesting location",
            JobState::Uploading => "uploading",
            JobState::AwaitingResult => "awaiting result",
            JobState::Succeeded(_) => "succeeded",
            JobState::Failed(_) => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded(_) | JobState::Failed(_) | JobState::Cancelled
        )
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            JobState::RequestingLocation | JobState::Uploading | JobState::AwaitingResult
        )
    }
}

/// One user-initiated resize request, tracked from submission to outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub parameters: JobParameters,
    pub input_key: Option<ObjectKey>,
    pub output_location: Option<OutputLocation>,
    pub state: JobState,
    pub attempts: u32,
}

impl Job {
    pub fn new(parameters: JobParameters) -> Self {
        Self {
            id: Uuid::new_v4(),
            parameters,
            input_key: None,
            output_location: None,
            state: JobState::RequestingLocation,
            attempts: 0,
        }
    }
}

// Upload broker API models
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadUrlResponse {
    #[serde(rename = "uploadUrl")]
    pub upload_url: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct BrokerErrorResponse {
    pub error: String,
}

// Configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeBackend {
    Http,
    S3,
}

#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub broker_url: String,
    pub results_base_url: Option<String>,
    pub output_extension: String,
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
    pub poll_fail_fast: bool,
    pub http_timeout_secs: u64,
    pub probe_backend: ProbeBackend,
    pub s3: Option<S3Settings>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        check_dotenv(dotenvy::dotenv())?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let broker_url = var("UPLOAD_BROKER_URL")
            .ok_or_else(|| Error::Config("UPLOAD_BROKER_URL not set".to_string()))?;
        let results_base_url =
            var("RESULTS_BASE_URL").map(|url| url.trim_end_matches('/').to_string());

        let output_extension = var("OUTPUT_FORMAT")
            .unwrap_or_else(|| DEFAULT_OUTPUT_EXTENSION.to_string())
            .trim()
            .trim_start_matches('.')
            .to_ascii_lowercase();
        if ImageFormat::from_extension(&output_extension).is_none() {
            return Err(Error::Config(format!(
                "OUTPUT_FORMAT '{}' is not a known image extension",
                output_extension
            )));
        }

        let poll_max_attempts: u32 = parse_var(&var, "POLL_MAX_ATTEMPTS", 30)?;
        if poll_max_attempts == 0 {
            return Err(Error::Config(
                "POLL_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let probe_backend = match var("PROBE_BACKEND").as_deref().map(str::trim) {
            None | Some("http") => ProbeBackend::Http,
            Some("s3") => ProbeBackend::S3,
            Some(other) => {
                return Err(Error::Config(format!(
                    "PROBE_BACKEND must be 'http' or 's3', got '{}'",
                    other
                )))
            }
        };

        let s3 = var("RESULTS_BUCKET").map(|bucket| S3Settings {
            bucket,
            endpoint: var("S3_ENDPOINT"),
            region: var("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            access_key_id: var("S3_ACCESS_KEY_ID"),
            secret_access_key: var("S3_SECRET_ACCESS_KEY"),
        });

        match probe_backend {
            ProbeBackend::Http if results_base_url.is_none() => {
                return Err(Error::Config(
                    "RESULTS_BASE_URL is required for the http probe backend".to_string(),
                ))
            }
            ProbeBackend::S3 if s3.is_none() => {
                return Err(Error::Config(
                    "RESULTS_BUCKET is required for the s3 probe backend".to_string(),
                ))
            }
            _ => {}
        }

        Ok(Self {
            broker_url,
            results_base_url,
            output_extension,
            poll_interval_ms: parse_var(&var, "POLL_INTERVAL_MS", 2000)?,
            poll_max_attempts,
            poll_fail_fast: parse_var(&var, "POLL_FAIL_FAST", false)?,
            http_timeout_secs: parse_var(&var, "HTTP_TIMEOUT_SECS", 30)?,
            probe_backend,
            s3,
        })
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.poll_max_attempts,
            fail_fast_on_server_error: self.poll_fail_fast,
        }
    }
}

/// A missing `.env` file is fine; an unreadable or malformed one is not.
fn check_dotenv(loaded: std::result::Result<PathBuf, dotenvy::Error>) -> Result<()> {
    match loaded {
        Err(e) if !e.not_found() => Err(e.into()),
        _ => Ok(()),
    }
}

fn parse_var<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: '{}'", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_validate_keeps_valid_values() {
        let params = JobRequest::new("a.png", "85", "128", "64", "image/png")
            .validate()
            .unwrap();
        assert_eq!(params.file_name, "a.png");
        assert_eq!(params.quality, 85);
        assert_eq!(params.max_width, 128);
        assert_eq!(params.max_height, 64);
        assert_eq!(params.content_type, "image/png");
    }

    #[test]
    fn test_validate_clamps_quality() {
        let high = JobRequest::new("a.png", "250", "1", "1", "image/png")
            .validate()
            .unwrap();
        assert_eq!(high.quality, 100);

        let low = JobRequest::new("a.png", "-4", "1", "1", "image/png")
            .validate()
            .unwrap();
        assert_eq!(low.quality, 1);

        let junk = JobRequest::new("a.png", "best", "1", "1", "image/png")
            .validate()
            .unwrap();
        assert_eq!(junk.quality, DEFAULT_QUALITY);
    }

    #[test]
    fn test_validate_dimension_fallbacks() {
        let params = JobRequest::new("a.png", "50", "0", "NaN", "image/png")
            .validate()
            .unwrap();
        assert_eq!(params.max_width, DEFAULT_DIMENSION);
        assert_eq!(params.max_height, DEFAULT_DIMENSION);

        let params = JobRequest::new("a.png", "50", "-20", "300.9", "image/png")
            .validate()
            .unwrap();
        assert_eq!(params.max_width, 1);
        assert_eq!(params.max_height, 300);

        let params = JobRequest::new("a.png", "50", "", "abc", "")
            .validate()
            .unwrap();
        assert_eq!(params.max_width, DEFAULT_DIMENSION);
        assert_eq!(params.max_height, DEFAULT_DIMENSION);
        assert_eq!(params.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_validate_rejects_empty_file_name() {
        let err = JobRequest::new("   ", "85", "128", "128", "image/png")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_job_state_classification() {
        assert!(JobState::AwaitingResult.is_in_flight());
        assert!(!JobState::Idle.is_in_flight());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Uploading.is_terminal());
    }

    #[test]
    fn test_upload_url_response_deserialization() {
        let json = r#"{"uploadUrl": "https://bucket.test/put?sig=1", "key": "q85_w128_h128/a.png"}"#;
        let response: UploadUrlResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.upload_url, "https://bucket.test/put?sig=1");
        assert_eq!(response.key, "q85_w128_h128/a.png");
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("UPLOAD_BROKER_URL", "https://api.test/upload-url"),
            ("RESULTS_BASE_URL", "https://results.test/"),
        ]))
        .unwrap();

        assert_eq!(config.results_base_url.as_deref(), Some("https://results.test"));
        assert_eq!(config.output_extension, "jpeg");
        assert_eq!(config.probe_backend, ProbeBackend::Http);

        let policy = config.poll_policy();
        assert_eq!(policy.interval, Duration::from_millis(2000));
        assert_eq!(policy.max_attempts, 30);
        assert!(!policy.fail_fast_on_server_error);
    }

    #[test]
    fn test_config_requires_broker_url() {
        let err = Config::from_lookup(lookup(&[("RESULTS_BASE_URL", "https://r.test")]))
            .unwrap_err();
        assert!(err.to_string().contains("UPLOAD_BROKER_URL"));
    }

    #[test]
    fn test_config_rejects_unknown_output_format() {
        let err = Config::from_lookup(lookup(&[
            ("UPLOAD_BROKER_URL", "https://api.test"),
            ("RESULTS_BASE_URL", "https://r.test"),
            ("OUTPUT_FORMAT", "docx"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_s3_backend_requires_bucket() {
        let err = Config::from_lookup(lookup(&[
            ("UPLOAD_BROKER_URL", "https://api.test"),
            ("PROBE_BACKEND", "s3"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("RESULTS_BUCKET"));

        let config = Config::from_lookup(lookup(&[
            ("UPLOAD_BROKER_URL", "https://api.test"),
            ("PROBE_BACKEND", "s3"),
            ("RESULTS_BUCKET", "resized"),
            ("OUTPUT_FORMAT", ".WEBP"),
            ("POLL_FAIL_FAST", "true"),
        ]))
        .unwrap();
        assert_eq!(config.probe_backend, ProbeBackend::S3);
        assert_eq!(config.output_extension, "webp");
        assert!(config.poll_fail_fast);
        let s3 = config.s3.unwrap();
        assert_eq!(s3.bucket, "resized");
        assert_eq!(s3.region, "us-east-1");
        assert!(s3.endpoint.is_none());
    }

    #[test]
    fn test_config_rejects_bad_numbers() {
        let err = Config::from_lookup(lookup(&[
            ("UPLOAD_BROKER_URL", "https://api.test"),
            ("RESULTS_BASE_URL", "https://r.test"),
            ("POLL_INTERVAL_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("POLL_INTERVAL_MS"));

        let err = Config::from_lookup(lookup(&[
            ("UPLOAD_BROKER_URL", "https://api.test"),
            ("RESULTS_BASE_URL", "https://r.test"),
            ("POLL_MAX_ATTEMPTS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_dotenv_file_is_ignored() {
        let missing = dotenvy::Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(check_dotenv(Err(missing)).is_ok());
        assert!(check_dotenv(Ok(PathBuf::from(".env"))).is_ok());
    }

    #[test]
    fn test_malformed_dotenv_file_is_reported() {
        let malformed = dotenvy::Error::LineParse("BROKEN LINE".to_string(), 7);
        assert!(matches!(
            check_dotenv(Err(malformed)),
            Err(Error::EnvVar(_))
        ));
    }
}
