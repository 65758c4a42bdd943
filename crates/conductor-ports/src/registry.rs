//! Typed capability registry.
//!
//! Replaces "look up a service by name, then type-assert at call time" with
//! a registry that resolves a step's `service`/`database`/`statemachine`/
//! `account` field against a declared capability at pipeline-build time,
//! surfacing any mismatch as a config error before the pipeline ever runs.

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::PortError;

struct Registered {
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub struct ServiceRegistry {
    services: DashMap<String, Registered>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Any + Send + Sync>(&self, name: impl Into<String>, service: Arc<T>) {
        self.services.insert(
            name.into(),
            Registered {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                value: service,
            },
        );
    }

    /// Resolve `name` as a `T`. Returns `ErrConfig`-equivalent
    /// (`PortError::NotFound` / `PortError::CapabilityMismatch`) rather than
    /// panicking on a bad downcast.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, PortError> {
        let entry = self
            .services
            .get(name)
            .ok_or_else(|| PortError::NotFound(name.to_string()))?;
        if entry.type_id != TypeId::of::<T>() {
            return Err(PortError::CapabilityMismatch {
                name: format!("{name} (registered as {}, requested as {})", entry.type_name, std::any::type_name::<T>()),
            });
        }
        entry
            .value
            .clone()
            .downcast::<T>()
            .map_err(|_| PortError::CapabilityMismatch { name: name.to_string() })
    }

    pub fn names(&self) -> Vec<String> {
        self.services.iter().map(|e| e.key().clone()).collect()
    }
}
