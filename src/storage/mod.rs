//! Result storage access
//!
//! The resize worker writes finished artifacts to a read-only results bucket.
//! This module probes that bucket for a derived output location and fetches
//! the artifact once it exists, over public HTTP or the S3 API.

pub mod client;
pub mod mock;
pub mod s3;

pub use client::HttpResultStore;
pub use mock::{MockResultStore, ProbeGate};
pub use s3::S3ResultStore;

use crate::keys::OutputLocation;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Url;

/// Outcome of a single existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found,
    /// 403/404: expected while the worker is still processing.
    NotFoundYet,
    UnexpectedStatus(u16),
    NetworkFault(String),
}

/// Map a response status onto a probe outcome.
///
/// Buckets that deny listing answer 403 for a missing object, so both 403 and
/// 404 mean "not there yet".
pub fn classify_status(status: u16) -> ProbeOutcome {
    match status {
        200..=299 => ProbeOutcome::Found,
        403 | 404 => ProbeOutcome::NotFoundYet,
        other => ProbeOutcome::UnexpectedStatus(other),
    }
}

/// Parse the public base URL results are served from.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("Invalid results URL '{}': {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!(
            "Results URL '{}' cannot hold object paths",
            raw
        )));
    }
    Ok(url)
}

/// URL of `location` under `base_url`. Each key segment is percent-encoded,
/// so `#`, `?` and `%` in file names stay part of the path.
pub fn object_url(base_url: &Url, location: &OutputLocation) -> Url {
    let mut url = base_url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(location.as_str().split('/'));
    }
    url
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Metadata-only existence check; never fetches the body.
    async fn probe(&self, location: &OutputLocation) -> ProbeOutcome;

    /// Readable reference handed to the presentation layer.
    fn reference_url(&self, location: &OutputLocation) -> String;

    async fn download(&self, location: &OutputLocation) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{derive_output_location, ObjectKey};

    fn location_for(file_name: &str) -> OutputLocation {
        derive_output_location(&ObjectKey::new(format!("q85_w128_h128/{}", file_name)), "jpeg")
            .unwrap()
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(200), ProbeOutcome::Found);
        assert_eq!(classify_status(204), ProbeOutcome::Found);
        assert_eq!(classify_status(403), ProbeOutcome::NotFoundYet);
        assert_eq!(classify_status(404), ProbeOutcome::NotFoundYet);
        assert_eq!(classify_status(500), ProbeOutcome::UnexpectedStatus(500));
        assert_eq!(classify_status(301), ProbeOutcome::UnexpectedStatus(301));
        assert_eq!(classify_status(429), ProbeOutcome::UnexpectedStatus(429));
    }

    #[test]
    fn test_object_url_encodes_reserved_characters() {
        let base = parse_base_url("https://results.example.com/bucket/").unwrap();

        assert_eq!(
            object_url(&base, &location_for("photo #1.png")).as_str(),
            "https://results.example.com/bucket/resized-q85_w128_h128/photo%20%231.jpeg"
        );
        assert_eq!(
            object_url(&base, &location_for("what?.png")).as_str(),
            "https://results.example.com/bucket/resized-q85_w128_h128/what%3F.jpeg"
        );
        assert_eq!(
            object_url(&base, &location_for("50%.png")).as_str(),
            "https://results.example.com/bucket/resized-q85_w128_h128/50%25.jpeg"
        );
    }

    #[test]
    fn test_object_url_on_bare_host() {
        let base = parse_base_url("http://127.0.0.1:9000").unwrap();
        assert_eq!(
            object_url(&base, &location_for("a.png")).as_str(),
            "http://127.0.0.1:9000/resized-q85_w128_h128/a.jpeg"
        );
    }

    #[test]
    fn test_parse_base_url_rejects_garbage() {
        assert!(matches!(parse_base_url("not a url"), Err(Error::Config(_))));
        assert!(matches!(
            parse_base_url("mailto:someone@example.com"),
            Err(Error::Config(_))
        ));
    }
}
