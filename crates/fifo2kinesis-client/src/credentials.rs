//! Credential sources for request signing.
//!
//! Credential *acquisition* is deliberately out of scope for this crate: the
//! `ProvideCredentials` trait is the seam, and `EnvCredentials` is the only
//! built-in source. Deployments that assume a role (see
//! `KinesisConfig::role_arn`) plug in their own provider backed by whatever
//! process manages the role session.

use async_trait::async_trait;

use crate::error::{ClientError, Result};

/// A resolved set of signing credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Present for temporary credentials; attached as
    /// `x-amz-security-token` and included in the signature.
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

/// Source of signing credentials, resolved once per request.
#[async_trait]
pub trait ProvideCredentials: Send + Sync {
    async fn provide(&self) -> Result<Credentials>;
}

/// Reads credentials from the conventional `AWS_ACCESS_KEY_ID`,
/// `AWS_SECRET_ACCESS_KEY`, and `AWS_SESSION_TOKEN` environment variables.
#[derive(Debug, Default)]
pub struct EnvCredentials;

#[async_trait]
impl ProvideCredentials for EnvCredentials {
    async fn provide(&self) -> Result<Credentials> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| ClientError::Credentials("AWS_ACCESS_KEY_ID is not set".to_string()))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            ClientError::Credentials("AWS_SECRET_ACCESS_KEY is not set".to_string())
        })?;

        let mut credentials = Credentials::new(access_key_id, secret_access_key);
        if let Ok(token) = std::env::var("AWS_SESSION_TOKEN") {
            if !token.is_empty() {
                credentials = credentials.with_session_token(token);
            }
        }
        Ok(credentials)
    }
}

/// A fixed set of credentials, mainly useful in tests and against local
/// Kinesis-compatible endpoints that do not validate signatures.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

#[async_trait]
impl ProvideCredentials for StaticCredentials {
    async fn provide(&self) -> Result<Credentials> {
        Ok(self.0.clone())
    }
}
