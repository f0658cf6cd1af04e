//! HTTP client for the Kinesis `PutRecords` API.
//!
//! Speaks the x-amz-json-1.1 protocol directly: one POST per batch with an
//! `X-Amz-Target` header selecting the operation and a SigV4 `Authorization`
//! header. The `KinesisApi` trait is the seam callers program against, so
//! tests (and alternative transports) can swap the implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::credentials::{EnvCredentials, ProvideCredentials};
use crate::error::{ClientError, Result};
use crate::records::{
    PutRecordsEntry, PutRecordsOutput, WireEntry, WireErrorResponse, WirePutRecordsRequest,
    WirePutRecordsResponse,
};
use crate::signer::{format_amz_date, sign_request};

const TARGET_PUT_RECORDS: &str = "Kinesis_20131202.PutRecords";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Batch publisher for a Kinesis-compatible streaming service.
#[async_trait]
pub trait KinesisApi: Send + Sync {
    /// Publish a batch of 1..=500 records in one call.
    ///
    /// Returns the per-record outcomes; a transport or whole-call service
    /// failure is an `Err`.
    async fn put_records(
        &self,
        stream_name: &str,
        entries: &[PutRecordsEntry],
    ) -> Result<PutRecordsOutput>;
}

/// Client configuration.
///
/// `role_arn` and `role_session_name` identify a role the deployment wants
/// assumed; this crate does not talk to STS. They are carried here so an
/// external `ProvideCredentials` implementation can honour them.
#[derive(Debug, Clone)]
pub struct KinesisConfig {
    /// Region the stream lives in; also part of the signature scope.
    pub region: String,
    /// Endpoint override, e.g. `http://localhost:4567` for a local
    /// Kinesis-compatible service. Defaults to the regional AWS endpoint.
    pub endpoint: Option<String>,
    pub role_arn: Option<String>,
    pub role_session_name: Option<String>,
}

impl Default for KinesisConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            role_arn: None,
            role_session_name: None,
        }
    }
}

/// reqwest-backed implementation of [`KinesisApi`].
pub struct KinesisClient {
    config: KinesisConfig,
    endpoint: String,
    host: String,
    http: reqwest::Client,
    credentials: Arc<dyn ProvideCredentials>,
}

impl KinesisClient {
    /// Create a client using [`EnvCredentials`] for signing.
    pub fn new(config: KinesisConfig) -> Result<Self> {
        Self::with_credentials(config, Arc::new(EnvCredentials))
    }

    /// Create a client with an explicit credential source.
    pub fn with_credentials(
        config: KinesisConfig,
        credentials: Arc<dyn ProvideCredentials>,
    ) -> Result<Self> {
        if config.region.is_empty() {
            return Err(ClientError::Config("region must not be empty".to_string()));
        }

        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://kinesis.{}.amazonaws.com", config.region));
        let url = reqwest::Url::parse(&endpoint)
            .map_err(|e| ClientError::Config(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        let mut host = url
            .host_str()
            .ok_or_else(|| {
                ClientError::Config(format!("endpoint '{}' has no host", endpoint))
            })?
            .to_string();
        if let Some(port) = url.port() {
            host = format!("{}:{}", host, port);
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(ClientError::Connection)?;

        Ok(Self {
            config,
            endpoint,
            host,
            http,
            credentials,
        })
    }

    /// Replace the HTTP client (useful for testing).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// The resolved endpoint this client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl KinesisApi for KinesisClient {
    async fn put_records(
        &self,
        stream_name: &str,
        entries: &[PutRecordsEntry],
    ) -> Result<PutRecordsOutput> {
        let request = WirePutRecordsRequest {
            stream_name,
            records: entries.iter().map(WireEntry::from).collect(),
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| ClientError::Serialization(e.to_string()))?;

        let credentials = self.credentials.provide().await?;
        let now = Utc::now();

        let mut headers: Vec<(String, String)> = vec![
            ("content-type".to_string(), CONTENT_TYPE.to_string()),
            ("host".to_string(), self.host.clone()),
            ("x-amz-date".to_string(), format_amz_date(&now)),
            ("x-amz-target".to_string(), TARGET_PUT_RECORDS.to_string()),
        ];
        if let Some(token) = &credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        let authorization = sign_request(
            &credentials,
            "POST",
            "/",
            "",
            &headers,
            &body,
            &self.config.region,
            "kinesis",
            now,
        );

        let mut builder = self.http.post(&self.endpoint);
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }
        let response = builder
            .header("authorization", authorization)
            .body(body)
            .send()
            .await
            .map_err(ClientError::Connection)?;

        let status = response.status();
        let text = response.text().await.map_err(ClientError::Connection)?;

        if !status.is_success() {
            let wire: WireErrorResponse = serde_json::from_str(&text).unwrap_or_default();
            let code = if wire.error_type.is_empty() {
                status.to_string()
            } else {
                // The __type field may be namespaced, e.g.
                // "com.amazonaws.kinesis#ResourceNotFoundException".
                wire.error_type
                    .rsplit(['#', '.'])
                    .next()
                    .unwrap_or(&wire.error_type)
                    .to_string()
            };
            return Err(ClientError::Api {
                code,
                message: wire.message,
            });
        }

        let wire: WirePutRecordsResponse = serde_json::from_str(&text)
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        debug!(
            stream = %stream_name,
            records = entries.len(),
            failed = wire.failed_record_count,
            "put records call completed"
        );
        Ok(wire.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credentials, StaticCredentials};

    fn test_client(config: KinesisConfig) -> Result<KinesisClient> {
        KinesisClient::with_credentials(
            config,
            Arc::new(StaticCredentials(Credentials::new("AKID", "SECRET"))),
        )
    }

    #[test]
    fn test_default_endpoint_from_region() {
        let client = test_client(KinesisConfig {
            region: "eu-west-1".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.endpoint(), "https://kinesis.eu-west-1.amazonaws.com");
        assert_eq!(client.host, "kinesis.eu-west-1.amazonaws.com");
    }

    #[test]
    fn test_endpoint_override_keeps_port() {
        let client = test_client(KinesisConfig {
            endpoint: Some("http://localhost:4567".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:4567");
        assert_eq!(client.host, "localhost:4567");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = test_client(KinesisConfig {
            endpoint: Some("not a url".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_empty_region_rejected() {
        let result = test_client(KinesisConfig {
            region: String::new(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn test_transport_error_surfaces() {
        // Nothing listens on this port; the call must fail with Connection.
        let client = test_client(KinesisConfig {
            endpoint: Some("http://127.0.0.1:1".to_string()),
            ..Default::default()
        })
        .unwrap();
        let entries = vec![PutRecordsEntry {
            data: bytes::Bytes::from("line"),
            partition_key: "pk".to_string(),
        }];
        let result = client.put_records("events", &entries).await;
        assert!(matches!(result, Err(ClientError::Connection(_))));
    }
}
