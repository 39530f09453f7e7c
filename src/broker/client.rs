use super::{LocationBroker, UploadLocation};
use crate::keys::ObjectKey;
use crate::models::{BrokerErrorResponse, JobParameters, UploadUrlResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

pub struct HttpLocationBroker {
    client: Client,
    endpoint: String,
}

impl HttpLocationBroker {
    pub fn new_with_client(endpoint: String, client: Client) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl LocationBroker for HttpLocationBroker {
    async fn request_location(&self, params: &JobParameters) -> Result<UploadLocation> {
        tracing::debug!("Requesting upload location for {}", params.file_name);

        let query = [
            ("fileName", params.file_name.clone()),
            ("quality", params.quality.to_string()),
            ("width", params.max_width.to_string()),
            ("height", params.max_height.to_string()),
            ("contentType", params.content_type.clone()),
        ];

        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to reach upload broker: {}", e);
                Error::Transient(format!("Upload broker unreachable: {}", e))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transient(format!("Failed to read broker response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<BrokerErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            tracing::error!("Upload broker error (status {}): {}", status, message);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authorization(message),
                _ => Error::Transient(format!("status {}: {}", status, message)),
            });
        }

        let parsed: UploadUrlResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse broker response: {}\nBody: {}", e, body);
            Error::Transient(format!("Malformed broker response: {}", e))
        })?;

        Ok(UploadLocation {
            write_url: parsed.upload_url,
            canonical_key: ObjectKey::new(parsed.key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobRequest;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params() -> JobParameters {
        JobRequest::new("a.png", "85", "128", "96", "image/png")
            .validate()
            .unwrap()
    }

    fn broker(server: &MockServer) -> HttpLocationBroker {
        HttpLocationBroker::new_with_client(format!("{}/upload-url", server.uri()), Client::new())
    }

    #[tokio::test]
    async fn test_request_location_sends_parameters() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/upload-url"))
            .and(query_param("fileName", "a.png"))
            .and(query_param("quality", "85"))
            .and(query_param("width", "128"))
            .and(query_param("height", "96"))
            .and(query_param("contentType", "image/png"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "uploadUrl": "https://bucket.test/q85_w128_h96/a.png?X-Amz-Signature=abc",
                "key": "q85_w128_h96/a.png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let location = broker(&server).request_location(&params()).await.unwrap();
        assert_eq!(
            location.write_url,
            "https://bucket.test/q85_w128_h96/a.png?X-Amz-Signature=abc"
        );
        assert_eq!(location.canonical_key.as_str(), "q85_w128_h96/a.png");
    }

    #[tokio::test]
    async fn test_forbidden_is_authorization_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({ "error": "not allowed" })),
            )
            .mount(&server)
            .await;

        let err = broker(&server).request_location(&params()).await.unwrap_err();
        match err {
            Error::Authorization(message) => assert_eq!(message, "not allowed"),
            other => panic!("expected authorization error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = broker(&server).request_location(&params()).await.unwrap_err();
        assert!(matches!(err, Error::Transient(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let err = broker(&server).request_location(&params()).await.unwrap_err();
        assert!(matches!(err, Error::Transient(_)));
    }

    #[tokio::test]
    async fn test_unreachable_broker_is_transient() {
        let broker = HttpLocationBroker::new_with_client(
            "http://127.0.0.1:1/upload-url".to_string(),
            Client::new(),
        );
        let err = broker.request_location(&params()).await.unwrap_err();
        assert!(matches!(err, Error::Transient(_)));
    }
}
