use super::{classify_status, object_url, parse_base_url, ProbeOutcome, ResultStore};
use crate::keys::OutputLocation;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};

/// Result store reachable over plain HTTP, e.g. a public bucket or CDN.
pub struct HttpResultStore {
    client: Client,
    base_url: Url,
}

impl HttpResultStore {
    pub fn new_with_client(base_url: &str, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }
}

#[async_trait]
impl ResultStore for HttpResultStore {
    async fn probe(&self, location: &OutputLocation) -> ProbeOutcome {
        let url = object_url(&self.base_url, location);
        // Intermediate caches must not replay an earlier 404.
        let cache_buster = Utc::now().timestamp_millis().to_string();

        match self
            .client
            .head(url)
            .query(&[("t", cache_buster)])
            .send()
            .await
        {
            Ok(response) => classify_status(response.status().as_u16()),
            Err(e) => ProbeOutcome::NetworkFault(e.to_string()),
        }
    }

    fn reference_url(&self, location: &OutputLocation) -> String {
        object_url(&self.base_url, location).to_string()
    }

    async fn download(&self, location: &OutputLocation) -> Result<Vec<u8>> {
        let url = object_url(&self.base_url, location);
        tracing::debug!("Downloading resized image from {}", url);

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            tracing::error!("Result download failed (status {}): {}", status, url);
            return Err(Error::ResultStore(format!(
                "Failed to download {} (status {})",
                location, status
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
