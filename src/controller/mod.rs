//! Job orchestration
//!
//! [`JobController`] runs one resize job at a time through
//! broker request → upload → completion polling, and reports every step to a
//! [`JobObserver`]. The job record is only ever mutated here; the services it
//! calls receive borrowed inputs and return outcomes.
//!
//! ```text
//! Idle → RequestingLocation → Uploading → AwaitingResult → Succeeded
//!              │                  │            │    └────→ Cancelled
//!              └──────────────────┴────────────┴─────────→ Failed
//! ```
//!
//! `cancel` and `reset` trigger the job's cancellation token before touching
//! the record, so an abandoned flow can never write a terminal state or emit a
//! callback afterwards.

pub mod mock;
pub mod observer;

pub use mock::{ObservedEvent, RecordingObserver};
pub use observer::{JobObserver, TracingObserver};

use crate::broker::LocationBroker;
use crate::keys::{build_input_key, derive_output_location, OutputLocation};
use crate::models::{Job, JobFault, JobParameters, JobRequest, JobState, OutputReference};
use crate::poller::{CompletionPoll, PollEvent, PollPolicy};
use crate::storage::ResultStore;
use crate::transfer::ArtifactTransfer;
use crate::{Error, Result};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Service bundle used to construct a [`JobController`].
pub struct ControllerServices {
    pub broker: Box<dyn LocationBroker>,
    pub transfer: Box<dyn ArtifactTransfer>,
    pub results: Box<dyn ResultStore>,
    pub observer: Box<dyn JobObserver>,
}

#[derive(Default)]
struct ControllerInner {
    job: Option<Job>,
    cancel: Option<CancellationToken>,
}

impl ControllerInner {
    fn state(&self) -> JobState {
        self.job
            .as_ref()
            .map(|job| job.state.clone())
            .unwrap_or(JobState::Idle)
    }

    /// The job with `job_id`, provided it is still current and in `expected`.
    fn job_in(&mut self, job_id: Uuid, expected: &JobState) -> Option<&mut Job> {
        self.job
            .as_mut()
            .filter(|job| job.id == job_id && job.state.name() == expected.name())
    }
}

pub struct JobController {
    broker: Box<dyn LocationBroker>,
    transfer: Box<dyn ArtifactTransfer>,
    results: Box<dyn ResultStore>,
    observer: Box<dyn JobObserver>,
    output_extension: String,
    poll_policy: PollPolicy,
    inner: Mutex<ControllerInner>,
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

impl JobController {
    pub fn new(
        services: ControllerServices,
        output_extension: impl Into<String>,
        poll_policy: PollPolicy,
    ) -> Self {
        Self {
            broker: services.broker,
            transfer: services.transfer,
            results: services.results,
            observer: services.observer,
            output_extension: output_extension.into(),
            poll_policy,
            inner: Mutex::new(ControllerInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> JobState {
        self.lock().state()
    }

    /// Snapshot of the current job, if any.
    pub fn job(&self) -> Option<Job> {
        self.lock().job.clone()
    }

    /// Run one job to completion.
    ///
    /// Returns the job's final state: `Succeeded`, `Failed` or `Cancelled`
    /// (the latter also when the job was reset while in flight). Errors are
    /// reserved for requests the controller refuses outright: invalid
    /// parameters, or a submit while another job is not yet reset.
    pub async fn submit(&self, request: &JobRequest, payload: &[u8]) -> Result<JobState> {
        let params = match request.validate() {
            Ok(params) => params,
            Err(e) => {
                warn!("Rejected job request: {}", e);
                self.observer.on_error(e.fault_kind(), &e.to_string());
                return Err(e);
            }
        };

        let (job_id, cancel) = self.begin(params.clone())?;
        let tag = short_id(job_id);
        info!(
            "[{}] Submitting {} (q{} {}x{})",
            tag, params.file_name, params.quality, params.max_width, params.max_height
        );

        let location = match self.broker.request_location(&params).await {
            Ok(location) => location,
            Err(e) => {
                error!("[{}] Upload location request failed: {}", tag, e);
                return Ok(self.fail(job_id, &e));
            }
        };
        if location.canonical_key != build_input_key(&params) {
            debug!(
                "[{}] Broker key {} differs from locally built key; using broker key",
                tag, location.canonical_key
            );
        }

        let input_key = location.canonical_key.clone();
        if !self.advance(job_id, &JobState::RequestingLocation, JobState::Uploading, |job| {
            job.input_key = Some(input_key)
        }) {
            return Ok(JobState::Cancelled);
        }
        self.progress(
            job_id,
            format!("Uploading {} ({} bytes)", params.file_name, payload.len()),
        );

        if let Err(e) = self
            .transfer
            .send(&location.write_url, payload, &params.content_type)
            .await
        {
            error!("[{}] Upload failed: {}", tag, e);
            return Ok(self.fail(job_id, &e));
        }

        let output_location =
            match derive_output_location(&location.canonical_key, &self.output_extension) {
                Ok(output_location) => output_location,
                Err(e) => {
                    error!(
                        "[{}] Broker returned a key this client cannot read ({}); \
                         broker and client disagree on the key layout",
                        tag, e.key
                    );
                    return Ok(self.fail(job_id, &Error::from(e)));
                }
            };

        let recorded = output_location.clone();
        if !self.advance(job_id, &JobState::Uploading, JobState::AwaitingResult, |job| {
            job.output_location = Some(recorded)
        }) {
            return Ok(JobState::Cancelled);
        }
        info!("[{}] Uploaded; waiting for {}", tag, output_location);
        self.progress(job_id, "Upload complete, waiting for resized image".to_string());

        Ok(self.await_result(job_id, output_location, cancel).await)
    }

    async fn await_result(
        &self,
        job_id: Uuid,
        output_location: OutputLocation,
        cancel: CancellationToken,
    ) -> JobState {
        let max_attempts = self.poll_policy.max_attempts;
        let mut poll = CompletionPoll::new(
            self.results.as_ref(),
            output_location.clone(),
            &self.poll_policy,
            cancel,
        );

        while let Some(event) = poll.next().await {
            match event {
                PollEvent::Pending { attempt, .. } => {
                    self.record_attempt(
                        job_id,
                        attempt,
                        format!(
                            "Waiting for resized image (check {}/{})",
                            attempt, max_attempts
                        ),
                    );
                }
                PollEvent::Found { attempt } => {
                    self.record_attempt(job_id, attempt, "Resized image found".to_string());
                    let reference = OutputReference {
                        url: self.results.reference_url(&output_location),
                        location: output_location,
                    };
                    return self.succeed(job_id, reference);
                }
                PollEvent::Exhausted { attempts } => {
                    return self.fail(job_id, &Error::Timeout { attempts });
                }
                PollEvent::Rejected { attempt, status } => {
                    let e = Error::ResultStore(format!(
                        "answered status {} on check {}",
                        status, attempt
                    ));
                    return self.fail(job_id, &e);
                }
            }
        }

        debug!("[{}] Poll stopped by cancellation", short_id(job_id));
        JobState::Cancelled
    }

    /// Stop waiting for the current job's result.
    pub fn cancel(&self) -> Result<()> {
        let mut inner = self.lock();
        let state = inner.state();
        if state != JobState::AwaitingResult {
            return Err(Error::InvalidTransition {
                state: state.name(),
                action: "cancel",
            });
        }

        if let Some(token) = inner.cancel.take() {
            token.cancel();
        }
        if let Some(job) = inner.job.as_mut() {
            info!(
                "[{}] Cancelled after {} checks",
                short_id(job.id),
                job.attempts
            );
            job.state = JobState::Cancelled;
        }
        self.observer.on_state_change(&JobState::Cancelled);
        Ok(())
    }

    /// Discard the current job and return to `Idle`. An in-flight job is
    /// cancelled first.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if let Some(token) = inner.cancel.take() {
            token.cancel();
        }
        if let Some(job) = inner.job.take() {
            if job.state.is_in_flight() {
                warn!(
                    "[{}] Discarding job while {}",
                    short_id(job.id),
                    job.state.name()
                );
            }
            self.observer.on_state_change(&JobState::Idle);
        }
    }

    /// Fetch the finished artifact of a succeeded job.
    pub async fn download(&self) -> Result<Vec<u8>> {
        let reference = match self.state() {
            JobState::Succeeded(reference) => reference,
            other => {
                return Err(Error::InvalidTransition {
                    state: other.name(),
                    action: "download",
                })
            }
        };
        self.results.download(&reference.location).await
    }

    fn begin(&self, params: JobParameters) -> Result<(Uuid, CancellationToken)> {
        let mut inner = self.lock();
        let state = inner.state();
        if state != JobState::Idle {
            return Err(Error::InvalidTransition {
                state: state.name(),
                action: "submit",
            });
        }

        let job = Job::new(params);
        let job_id = job.id;
        let cancel = CancellationToken::new();
        inner.job = Some(job);
        inner.cancel = Some(cancel.clone());

        self.observer.on_state_change(&JobState::RequestingLocation);
        self.observer.on_progress("Requesting upload location");
        Ok((job_id, cancel))
    }

    /// Move the job from `from` to `to`. Returns false when the job was
    /// cancelled or replaced in the meantime.
    fn advance<F>(&self, job_id: Uuid, from: &JobState, to: JobState, update: F) -> bool
    where
        F: FnOnce(&mut Job),
    {
        let mut inner = self.lock();
        let Some(job) = inner.job_in(job_id, from) else {
            return false;
        };
        update(job);
        job.state = to;
        self.observer.on_state_change(&job.state);
        true
    }

    fn progress(&self, job_id: Uuid, message: String) {
        let inner = self.lock();
        if let Some(job) = inner.job.as_ref() {
            if job.id == job_id && job.state.is_in_flight() {
                self.observer.on_progress(&message);
            }
        }
    }

    fn record_attempt(&self, job_id: Uuid, attempt: u32, message: String) {
        let mut inner = self.lock();
        if let Some(job) = inner.job_in(job_id, &JobState::AwaitingResult) {
            job.attempts = attempt;
            self.observer.on_progress(&message);
        }
    }

    fn succeed(&self, job_id: Uuid, reference: OutputReference) -> JobState {
        let mut inner = self.lock();
        let Some(job) = inner.job_in(job_id, &JobState::AwaitingResult) else {
            return JobState::Cancelled;
        };
        job.state = JobState::Succeeded(reference.clone());
        let state = job.state.clone();
        inner.cancel = None;

        self.observer.on_state_change(&state);
        self.observer.on_result(&reference);
        state
    }

    fn fail(&self, job_id: Uuid, error: &Error) -> JobState {
        let mut inner = self.lock();
        let Some(job) = inner
            .job
            .as_mut()
            .filter(|job| job.id == job_id && job.state.is_in_flight())
        else {
            return JobState::Cancelled;
        };
        let fault = JobFault::from(error);
        job.state = JobState::Failed(fault.clone());
        let state = job.state.clone();
        inner.cancel = None;

        self.observer.on_state_change(&state);
        self.observer.on_error(fault.kind, &fault.message);
        state
    }
}
