//! Direct artifact transfer to a broker-issued write URL.

pub mod client;
pub mod mock;

pub use client::HttpTransfer;
pub use mock::MockTransfer;

use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ArtifactTransfer: Send + Sync {
    /// Single attempt; a failure is `Error::Transfer` and is never retried.
    async fn send(&self, write_url: &str, payload: &[u8], content_type: &str) -> Result<()>;
}
