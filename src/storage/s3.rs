use super::{classify_status, object_url, parse_base_url, ProbeOutcome, ResultStore};
use crate::keys::OutputLocation;
use crate::models::S3Settings;
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::{config::Region, Client as S3Client};
use reqwest::Url;

/// Result store accessed through the S3 API, for buckets that are not
/// publicly readable.
pub struct S3ResultStore {
    client: S3Client,
    bucket: String,
    public_base_url: Option<Url>,
}

impl S3ResultStore {
    pub async fn new(settings: &S3Settings, public_base_url: Option<&str>) -> Result<Self> {
        let public_base_url = public_base_url.map(parse_base_url).transpose()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            let credentials = aws_sdk_s3::config::Credentials::new(
                access_key_id.clone(),
                secret_access_key.clone(),
                None,
                None,
                "results-bucket",
            );
            loader = loader.credentials_provider(credentials);
        }
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        // S3-compatible endpoints generally need path-style addressing.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.endpoint.is_some())
            .build();

        Ok(Self {
            client: S3Client::from_conf(s3_config),
            bucket: settings.bucket.clone(),
            public_base_url,
        })
    }
}

#[async_trait]
impl ResultStore for S3ResultStore {
    async fn probe(&self, location: &OutputLocation) -> ProbeOutcome {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(location.as_str())
            .send()
            .await
        {
            Ok(_) => ProbeOutcome::Found,
            Err(SdkError::ServiceError(err)) => classify_status(err.raw().status().as_u16()),
            Err(e) => ProbeOutcome::NetworkFault(e.to_string()),
        }
    }

    fn reference_url(&self, location: &OutputLocation) -> String {
        match &self.public_base_url {
            Some(base_url) => object_url(base_url, location).to_string(),
            None => format!("s3://{}/{}", self.bucket, location),
        }
    }

    async fn download(&self, location: &OutputLocation) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(location.as_str())
            .send()
            .await
            .map_err(|e| Error::S3(format!("Failed to read {}: {}", location, e)))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| Error::S3(format!("Failed to read body: {}", e)))?;

        Ok(bytes.to_vec())
    }
}
