//! Write-through persistence port for `WorkflowInstance`s. Concrete stores
//! (SQLite, Postgres, ...) are external collaborators; only the contract and
//! an in-memory reference implementation live here.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::instance::WorkflowInstance;

#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Upsert by `id`. Must be atomic per instance. Failures here are
    /// non-fatal to the commit path — callers log and move on.
    async fn save_workflow_instance(&self, instance: &WorkflowInstance) -> Result<(), String>;
    async fn load_workflow_instances(&self, workflow_type: &str) -> Result<Vec<WorkflowInstance>, String>;
}

/// In-memory reference backend for tests and local development.
#[derive(Default)]
pub struct MemoryPersistenceBackend {
    instances: RwLock<std::collections::HashMap<String, WorkflowInstance>>,
}

impl MemoryPersistenceBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceBackend for MemoryPersistenceBackend {
    async fn save_workflow_instance(&self, instance: &WorkflowInstance) -> Result<(), String> {
        self.instances.write().await.insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    async fn load_workflow_instances(&self, workflow_type: &str) -> Result<Vec<WorkflowInstance>, String> {
        Ok(self
            .instances
            .read()
            .await
            .values()
            .filter(|i| i.workflow_type == workflow_type)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_context::Value;

    #[tokio::test]
    async fn save_then_load_round_trips_by_type() {
        let backend = MemoryPersistenceBackend::new();
        let instance = WorkflowInstance::new("w1", "order", "A", Value::object());
        backend.save_workflow_instance(&instance).await.unwrap();
        let loaded = backend.load_workflow_instances("order").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "w1");
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let backend = MemoryPersistenceBackend::new();
        let mut instance = WorkflowInstance::new("w1", "order", "A", Value::object());
        backend.save_workflow_instance(&instance).await.unwrap();
        instance.current_state = "B".to_string();
        backend.save_workflow_instance(&instance).await.unwrap();
        let loaded = backend.load_workflow_instances("order").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].current_state, "B");
    }
}
