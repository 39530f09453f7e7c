use super::ArtifactTransfer;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

pub struct HttpTransfer {
    client: Client,
}

impl HttpTransfer {
    pub fn new_with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactTransfer for HttpTransfer {
    async fn send(&self, write_url: &str, payload: &[u8], content_type: &str) -> Result<()> {
        tracing::debug!("Uploading {} bytes ({})", payload.len(), content_type);

        let response = self
            .client
            .put(write_url)
            .header(CONTENT_TYPE, content_type)
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Upload request failed: {}", e);
                Error::Transfer(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Upload rejected (status {}): {}", status, error_text);
            return Err(Error::Transfer(format!(
                "storage rejected upload (status {})",
                status
            )));
        }

        Ok(())
    }
}
