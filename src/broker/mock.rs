use super::{LocationBroker, UploadLocation};
use crate::keys::{build_input_key, ObjectKey};
use crate::models::JobParameters;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Which failure the mock broker should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerFailure {
    Unauthorized,
    Unavailable,
}

#[derive(Clone)]
pub struct MockLocationBroker {
    upload_base_url: String,
    key_override: Arc<Mutex<Option<String>>>,
    failure: Arc<Mutex<Option<BrokerFailure>>>,
    requests: Arc<Mutex<Vec<JobParameters>>>,
}

impl MockLocationBroker {
    pub fn new() -> Self {
        Self {
            upload_base_url: "https://mock-uploads.example.com".to_string(),
            key_override: Arc::new(Mutex::new(None)),
            failure: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_upload_base_url(mut self, base_url: String) -> Self {
        self.upload_base_url = base_url;
        self
    }

    /// Answer with this key instead of the one derived from the parameters.
    pub fn with_key(self, key: String) -> Self {
        *self.key_override.lock().unwrap() = Some(key);
        self
    }

    pub fn with_failure(self, failure: BrokerFailure) -> Self {
        *self.failure.lock().unwrap() = Some(failure);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn get_requests(&self) -> Vec<JobParameters> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockLocationBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationBroker for MockLocationBroker {
    async fn request_location(&self, params: &JobParameters) -> Result<UploadLocation> {
        self.requests.lock().unwrap().push(params.clone());

        match *self.failure.lock().unwrap() {
            Some(BrokerFailure::Unauthorized) => {
                return Err(Error::Authorization("Mock broker denied upload".to_string()))
            }
            Some(BrokerFailure::Unavailable) => {
                return Err(Error::Transient("Mock broker unavailable".to_string()))
            }
            None => {}
        }

        let canonical_key = match self.key_override.lock().unwrap().clone() {
            Some(key) => ObjectKey::new(key),
            None => build_input_key(params),
        };

        Ok(UploadLocation {
            write_url: format!("{}/{}", self.upload_base_url, canonical_key),
            canonical_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobRequest;

    fn params() -> JobParameters {
        JobRequest::new("a.png", "85", "128", "128", "image/png")
            .validate()
            .unwrap()
    }

    #[tokio::test]
    async fn test_mock_broker_derives_key_from_parameters() {
        let broker = MockLocationBroker::new();

        let location = broker.request_location(&params()).await.unwrap();

        assert_eq!(location.canonical_key.as_str(), "q85_w128_h128/a.png");
        assert_eq!(
            location.write_url,
            "https://mock-uploads.example.com/q85_w128_h128/a.png"
        );
        assert_eq!(broker.get_call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_broker_failures() {
        let broker = MockLocationBroker::new().with_failure(BrokerFailure::Unauthorized);
        let err = broker.request_location(&params()).await.unwrap_err();
        assert!(matches!(err, Error::Authorization(_)));

        let broker = MockLocationBroker::new().with_failure(BrokerFailure::Unavailable);
        let err = broker.request_location(&params()).await.unwrap_err();
        assert!(matches!(err, Error::Transient(_)));
    }
}
