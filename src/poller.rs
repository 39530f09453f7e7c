//! Completion detection for resize jobs.
//!
//! The resize worker gives no signal when it finishes; the only evidence is
//! the derived output object appearing in the results bucket. A
//! [`CompletionPoll`] probes that location on a fixed schedule with a bounded
//! attempt budget and yields one [`PollEvent`] per step. It is single-use:
//! once it has produced a terminal event, or has been cancelled, it yields
//! nothing more.

use crate::keys::OutputLocation;
use crate::storage::{ProbeOutcome, ResultStore};
use std::iter::Take;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    /// End the poll on a 5xx-class probe response instead of retrying it.
    pub fail_fast_on_server_error: bool,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_attempts: 30,
            fail_fast_on_server_error: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// The artifact is not there yet; another probe will follow.
    Pending { attempt: u32, outcome: ProbeOutcome },
    Found { attempt: u32 },
    Exhausted { attempts: u32 },
    /// A server error ended the poll under a fail-fast policy.
    Rejected { attempt: u32, status: u16 },
}

impl PollEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollEvent::Pending { .. })
    }
}

pub struct CompletionPoll<'a> {
    store: &'a dyn ResultStore,
    location: OutputLocation,
    fail_fast_on_server_error: bool,
    schedule: Take<FixedInterval>,
    attempts: u32,
    cancel: CancellationToken,
    finished: bool,
}

impl<'a> CompletionPoll<'a> {
    pub fn new(
        store: &'a dyn ResultStore,
        location: OutputLocation,
        policy: &PollPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            location,
            fail_fast_on_server_error: policy.fail_fast_on_server_error,
            schedule: FixedInterval::new(policy.interval).take(policy.max_attempts as usize),
            attempts: 0,
            cancel,
            finished: false,
        }
    }

    /// Number of probes issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn location(&self) -> &OutputLocation {
        &self.location
    }

    /// Wait one interval, probe once, and report the outcome.
    ///
    /// Returns `None` after a terminal event or once the cancellation token
    /// fires. Cancellation is observed while waiting and right after a probe;
    /// a probe outcome that arrives after cancellation is discarded.
    pub async fn next(&mut self) -> Option<PollEvent> {
        if self.finished {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.finished = true;
            return None;
        }

        let Some(delay) = self.schedule.next() else {
            self.finished = true;
            warn!(
                "Giving up on {} after {} probes",
                self.location, self.attempts
            );
            return Some(PollEvent::Exhausted {
                attempts: self.attempts,
            });
        };

        self.attempts += 1;
        let attempt = self.attempts;

        let cancelled = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(delay) => false,
        };
        if cancelled {
            self.finished = true;
            debug!("Poll for {} cancelled before probe {}", self.location, attempt);
            return None;
        }

        let outcome = self.store.probe(&self.location).await;
        if self.cancel.is_cancelled() {
            self.finished = true;
            debug!(
                "Discarding probe {} outcome for {}: poll cancelled",
                attempt, self.location
            );
            return None;
        }

        let event = match outcome {
            ProbeOutcome::Found => {
                info!("Found {} on probe {}", self.location, attempt);
                PollEvent::Found { attempt }
            }
            ProbeOutcome::UnexpectedStatus(status)
                if self.fail_fast_on_server_error && status >= 500 =>
            {
                warn!(
                    "Probe {} for {} returned {}; failing fast",
                    attempt, self.location, status
                );
                PollEvent::Rejected { attempt, status }
            }
            ProbeOutcome::UnexpectedStatus(status) => {
                warn!(
                    "Probe {} for {} returned unexpected status {}; will retry",
                    attempt, self.location, status
                );
                PollEvent::Pending {
                    attempt,
                    outcome: ProbeOutcome::UnexpectedStatus(status),
                }
            }
            ProbeOutcome::NetworkFault(message) => {
                warn!(
                    "Probe {} for {} failed: {}; will retry",
                    attempt, self.location, message
                );
                PollEvent::Pending {
                    attempt,
                    outcome: ProbeOutcome::NetworkFault(message),
                }
            }
            ProbeOutcome::NotFoundYet => {
                debug!("Probe {}: {} not ready yet", attempt, self.location);
                PollEvent::Pending {
                    attempt,
                    outcome: ProbeOutcome::NotFoundYet,
                }
            }
        };

        if event.is_terminal() {
            self.finished = true;
        }
        Some(event)
    }
}
