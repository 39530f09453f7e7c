use crate::models::{FaultKind, JobState, OutputReference};
use tracing::{error, info};

/// Presentation callbacks. The controller invokes these while its job record
/// is locked, so implementations must not call back into the controller.
pub trait JobObserver: Send + Sync {
    fn on_state_change(&self, state: &JobState);
    fn on_progress(&self, message: &str);
    fn on_result(&self, output: &OutputReference);
    fn on_error(&self, kind: FaultKind, message: &str);
}

/// Renders job callbacks as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl JobObserver for TracingObserver {
    fn on_state_change(&self, state: &JobState) {
        info!("Job state: {}", state.name());
    }

    fn on_progress(&self, message: &str) {
        info!("{}", message);
    }

    fn on_result(&self, output: &OutputReference) {
        info!("Resized image ready: {}", output.url);
    }

    fn on_error(&self, kind: FaultKind, message: &str) {
        match kind {
            FaultKind::Timeout => info!("{}", message),
            _ => error!("Job failed ({:?}): {}", kind, message),
        }
    }
}
