//! `CloudCredentialProvider` port — concrete cloud-platform plug-ins
//! (DigitalOcean, ECS, ...) are out of scope; this defines only the contract
//! `cloud_validate`/`ecs_*` steps resolve against the service registry.

use async_trait::async_trait;

use crate::error::PortError;

#[derive(Debug, Clone, serde::Serialize)]
pub struct CloudCredentials {
    pub access_key: String,
    pub secret: String,
}

#[async_trait]
pub trait CloudCredentialProvider: Send + Sync {
    fn provider(&self) -> &str;
    fn region(&self) -> &str;
    async fn get_credentials(&self) -> Result<CloudCredentials, PortError>;
}

/// Static in-memory credential provider for tests and local development.
pub struct StaticCloudCredentialProvider {
    provider: String,
    region: String,
    credentials: CloudCredentials,
}

impl StaticCloudCredentialProvider {
    pub fn new(provider: impl Into<String>, region: impl Into<String>, credentials: CloudCredentials) -> Self {
        Self {
            provider: provider.into(),
            region: region.into(),
            credentials,
        }
    }
}

#[async_trait]
impl CloudCredentialProvider for StaticCloudCredentialProvider {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn get_credentials(&self) -> Result<CloudCredentials, PortError> {
        Ok(self.credentials.clone())
    }
}
