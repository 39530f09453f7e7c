//! Upload location broker
//!
//! The broker authorizes an upload and hands back a short-lived write URL plus
//! the canonical object key the artifact will be stored under.

pub mod client;
pub mod mock;

pub use client::HttpLocationBroker;
pub use mock::MockLocationBroker;

use crate::keys::ObjectKey;
use crate::models::JobParameters;
use crate::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLocation {
    pub write_url: String,
    /// Authoritative key for the uploaded artifact.
    pub canonical_key: ObjectKey,
}

#[async_trait]
pub trait LocationBroker: Send + Sync {
    /// One request, no retry. Fails with `Error::Authorization` or
    /// `Error::Transient`.
    async fn request_location(&self, params: &JobParameters) -> Result<UploadLocation>;
}
