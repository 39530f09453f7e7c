use super::ArtifactTransfer;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A recorded upload: `(write_url, payload, content_type)`.
pub type RecordedUpload = (String, Vec<u8>, String);

#[derive(Clone)]
pub struct MockTransfer {
    uploads: Arc<Mutex<Vec<RecordedUpload>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockTransfer {
    pub fn new() -> Self {
        Self {
            uploads: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn get_uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

impl Default for MockTransfer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactTransfer for MockTransfer {
    async fn send(&self, write_url: &str, payload: &[u8], content_type: &str) -> Result<()> {
        self.uploads.lock().unwrap().push((
            write_url.to_string(),
            payload.to_vec(),
            content_type.to_string(),
        ));

        if *self.should_fail.lock().unwrap() {
            return Err(Error::Transfer("Mock failure".to_string()));
        }
        Ok(())
    }
}
