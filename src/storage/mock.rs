use super::{ProbeOutcome, ResultStore};
use crate::keys::OutputLocation;
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Holds each probe open until the test releases it.
#[derive(Clone, Default)]
pub struct ProbeGate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl ProbeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until a probe is in flight.
    pub async fn wait_for_probe(&self) {
        self.entered.notified().await;
    }

    /// Let the in-flight probe return its outcome.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Scripted result store: probes return queued outcomes in order, then the
/// fallback outcome forever.
#[derive(Clone)]
pub struct MockResultStore {
    outcomes: Arc<Mutex<VecDeque<ProbeOutcome>>>,
    fallback: Arc<Mutex<ProbeOutcome>>,
    probed: Arc<Mutex<Vec<String>>>,
    content: Arc<Mutex<Vec<u8>>>,
    download_count: Arc<Mutex<usize>>,
    base_url: String,
    gate: Option<ProbeGate>,
}

impl MockResultStore {
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(ProbeOutcome::NotFoundYet)),
            probed: Arc::new(Mutex::new(Vec::new())),
            content: Arc::new(Mutex::new(vec![0xFF, 0xD8, 0xFF, 0xD9])),
            download_count: Arc::new(Mutex::new(0)),
            base_url: "https://mock-results.example.com".to_string(),
            gate: None,
        }
    }

    pub fn with_outcome(self, outcome: ProbeOutcome) -> Self {
        self.push_outcome(outcome);
        self
    }

    pub fn with_fallback(self, outcome: ProbeOutcome) -> Self {
        *self.fallback.lock().unwrap() = outcome;
        self
    }

    pub fn with_content(self, content: Vec<u8>) -> Self {
        *self.content.lock().unwrap() = content;
        self
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_gate(mut self, gate: ProbeGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Queue another outcome on a store that is already in use.
    pub fn push_outcome(&self, outcome: ProbeOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn get_probe_count(&self) -> usize {
        self.probed.lock().unwrap().len()
    }

    pub fn get_probed_locations(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }

    pub fn get_download_count(&self) -> usize {
        *self.download_count.lock().unwrap()
    }
}

impl Default for MockResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for MockResultStore {
    async fn probe(&self, location: &OutputLocation) -> ProbeOutcome {
        self.probed.lock().unwrap().push(location.to_string());

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        match self.outcomes.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => self.fallback.lock().unwrap().clone(),
        }
    }

    fn reference_url(&self, location: &OutputLocation) -> String {
        format!("{}/{}", self.base_url, location)
    }

    async fn download(&self, _location: &OutputLocation) -> Result<Vec<u8>> {
        *self.download_count.lock().unwrap() += 1;
        Ok(self.content.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{derive_output_location, ObjectKey};

    #[tokio::test]
    async fn test_mock_result_store_replays_script() {
        let store = MockResultStore::new()
            .with_outcome(ProbeOutcome::NotFoundYet)
            .with_outcome(ProbeOutcome::Found)
            .with_fallback(ProbeOutcome::UnexpectedStatus(500));
        let location = derive_output_location(&ObjectKey::new("q1_w1_h1/a.png"), "jpeg").unwrap();

        assert_eq!(store.probe(&location).await, ProbeOutcome::NotFoundYet);
        assert_eq!(store.probe(&location).await, ProbeOutcome::Found);
        assert_eq!(
            store.probe(&location).await,
            ProbeOutcome::UnexpectedStatus(500)
        );
        assert_eq!(store.get_probe_count(), 3);
        assert_eq!(store.get_probed_locations()[0], "resized-q1_w1_h1/a.jpeg");
    }

    #[tokio::test]
    async fn test_gated_probe_waits_for_release() {
        let gate = ProbeGate::new();
        let store = MockResultStore::new()
            .with_outcome(ProbeOutcome::Found)
            .with_gate(gate.clone());
        let location = derive_output_location(&ObjectKey::new("q1_w1_h1/a.png"), "jpeg").unwrap();

        let mut probe = tokio_test::task::spawn(store.probe(&location));
        tokio_test::assert_pending!(probe.poll());

        gate.wait_for_probe().await;
        gate.release();
        assert!(probe.is_woken());
        tokio_test::assert_ready_eq!(probe.poll(), ProbeOutcome::Found);
    }
}
