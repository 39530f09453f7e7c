use super::JobObserver;
use crate::models::{FaultKind, JobState, OutputReference};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    State(JobState),
    Progress(String),
    Result(OutputReference),
    Error(FaultKind, String),
}

/// Observer that keeps every callback for later inspection.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<ObservedEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn states(&self) -> Vec<JobState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObservedEvent::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(FaultKind, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObservedEvent::Error(kind, message) => Some((kind, message)),
                _ => None,
            })
            .collect()
    }

    pub fn results(&self) -> Vec<OutputReference> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObservedEvent::Result(output) => Some(output),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ObservedEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl JobObserver for RecordingObserver {
    fn on_state_change(&self, state: &JobState) {
        self.push(ObservedEvent::State(state.clone()));
    }

    fn on_progress(&self, message: &str) {
        self.push(ObservedEvent::Progress(message.to_string()));
    }

    fn on_result(&self, output: &OutputReference) {
        self.push(ObservedEvent::Result(output.clone()));
    }

    fn on_error(&self, kind: FaultKind, message: &str) {
        self.push(ObservedEvent::Error(kind, message.to_string()));
    }
}
