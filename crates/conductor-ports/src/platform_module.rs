//! `PlatformModule` port — the contract `cloud_validate`/`ecs_*` steps
//! resolve against the service registry. Concrete cloud plug-ins (ECS,
//! DigitalOcean App Platform, ...) are out of scope; this specifies only the
//! `Plan/Apply/Status/Destroy` shape the core consumes.

use async_trait::async_trait;
use conductor_context::Value;

use crate::error::PortError;

#[async_trait]
pub trait PlatformModule: Send + Sync {
    fn platform(&self) -> &str;
    async fn plan(&self, spec: &Value) -> Result<Value, PortError>;
    async fn apply(&self, spec: &Value) -> Result<Value, PortError>;
    async fn status(&self, resource_id: &str) -> Result<Value, PortError>;
    async fn destroy(&self, resource_id: &str) -> Result<Value, PortError>;
}

/// Records every call it receives and returns canned results. Used in tests
/// and as a local-development stand-in for a real cloud plug-in.
pub struct InMemoryPlatformModule {
    platform: String,
    canned: Value,
}

impl InMemoryPlatformModule {
    pub fn new(platform: impl Into<String>, canned: Value) -> Self {
        Self {
            platform: platform.into(),
            canned,
        }
    }
}

#[async_trait]
impl PlatformModule for InMemoryPlatformModule {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn plan(&self, _spec: &Value) -> Result<Value, PortError> {
        Ok(self.canned.clone())
    }

    async fn apply(&self, _spec: &Value) -> Result<Value, PortError> {
        Ok(self.canned.clone())
    }

    async fn status(&self, _resource_id: &str) -> Result<Value, PortError> {
        Ok(self.canned.clone())
    }

    async fn destroy(&self, _resource_id: &str) -> Result<Value, PortError> {
        Ok(self.canned.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plan_and_apply_return_the_canned_result() {
        let module = InMemoryPlatformModule::new("ecs", Value::from("ok"));
        assert_eq!(module.plan(&Value::object()).await.unwrap(), Value::from("ok"));
        assert_eq!(module.apply(&Value::object()).await.unwrap(), Value::from("ok"));
    }
}
