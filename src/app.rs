//! Application wiring: builds the concrete clients from [`Config`] and runs
//! jobs for files on disk.

use crate::broker::HttpLocationBroker;
use crate::controller::{ControllerServices, JobController, JobObserver};
use crate::keys::extract_display_name;
use crate::mime::detect_content_type;
use crate::models::{Config, JobRequest, JobState, ProbeBackend};
use crate::poller::PollPolicy;
use crate::storage::{HttpResultStore, ResultStore, S3ResultStore};
use crate::transfer::HttpTransfer;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Per-run options, as given on the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub quality: String,
    pub max_width: String,
    pub max_height: String,
    pub content_type: Option<String>,
    pub download: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            quality: "85".to_string(),
            max_width: "128".to_string(),
            max_height: "128".to_string(),
            content_type: None,
            download: true,
        }
    }
}

pub struct App {
    controller: Arc<JobController>,
    output_dir: PathBuf,
}

impl App {
    /// Build an app from concrete service dependencies.
    ///
    /// This is primarily useful for integration tests and local harnesses that
    /// need to inject mocks.
    pub fn with_services(
        services: ControllerServices,
        output_extension: String,
        poll_policy: PollPolicy,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            controller: Arc::new(JobController::new(
                services,
                output_extension,
                poll_policy,
            )),
            output_dir,
        }
    }

    pub async fn new(
        config: &Config,
        observer: Box<dyn JobObserver>,
        output_dir: PathBuf,
    ) -> Result<Self> {
        // Reuse one HTTP connection pool across the broker, upload and probe clients.
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        let results: Box<dyn ResultStore> = match config.probe_backend {
            ProbeBackend::Http => {
                let base_url = config.results_base_url.clone().ok_or_else(|| {
                    Error::Config("RESULTS_BASE_URL is required for http probing".to_string())
                })?;
                info!("Probing results over HTTP at {}", base_url);
                Box::new(HttpResultStore::new_with_client(
                    &base_url,
                    http_client.clone(),
                )?)
            }
            ProbeBackend::S3 => {
                let settings = config.s3.as_ref().ok_or_else(|| {
                    Error::Config("RESULTS_BUCKET is required for s3 probing".to_string())
                })?;
                info!("Probing results in S3 bucket {}", settings.bucket);
                Box::new(S3ResultStore::new(settings, config.results_base_url.as_deref()).await?)
            }
        };

        Ok(Self::with_services(
            ControllerServices {
                broker: Box::new(HttpLocationBroker::new_with_client(
                    config.broker_url.clone(),
                    http_client.clone(),
                )),
                transfer: Box::new(HttpTransfer::new_with_client(http_client)),
                results,
                observer,
            },
            config.output_extension.clone(),
            config.poll_policy(),
            output_dir,
        ))
    }

    pub fn controller(&self) -> Arc<JobController> {
        self.controller.clone()
    }

    /// Submit one file and wait for its resized copy.
    ///
    /// Returns the path the result was saved to, or `None` when downloading
    /// was disabled. The controller is reset afterwards whatever the outcome.
    pub async fn run(&self, input: &Path, options: &RunOptions) -> Result<Option<PathBuf>> {
        let file_name = input
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::Validation(format!("Invalid input path: {}", input.display()))
            })?
            .to_string();
        let payload = tokio::fs::read(input).await?;

        let content_type = match &options.content_type {
            Some(content_type) => content_type.clone(),
            None => detect_content_type(&payload, input).to_string(),
        };
        let request = JobRequest::new(
            file_name,
            options.quality.clone(),
            options.max_width.clone(),
            options.max_height.clone(),
            content_type,
        );

        let outcome = self.finish(&request, &payload, options.download).await;
        self.controller.reset();
        outcome
    }

    async fn finish(
        &self,
        request: &JobRequest,
        payload: &[u8],
        download: bool,
    ) -> Result<Option<PathBuf>> {
        match self.controller.submit(request, payload).await? {
            JobState::Succeeded(reference) if download => {
                let bytes = self.controller.download().await?;
                tokio::fs::create_dir_all(&self.output_dir).await?;

                let path = self
                    .output_dir
                    .join(extract_display_name(reference.location.as_str()));
                tokio::fs::write(&path, &bytes).await?;
                info!("Saved {} bytes to {}", bytes.len(), path.display());
                Ok(Some(path))
            }
            JobState::Succeeded(_) => Ok(None),
            JobState::Failed(fault) => Err(Error::JobFailed(fault)),
            _ => Err(Error::Cancelled),
        }
    }
}
