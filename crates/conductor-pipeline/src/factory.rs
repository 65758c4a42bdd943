//! `StepFactory registry` — maps a step type tag to a constructor that
//! validates config and returns a `Step`. Construction errors (`ErrConfig`)
//! are fatal at pipeline-build time.

use std::collections::HashMap;
use std::sync::Arc;

use conductor_context::Value;
use conductor_ports::ServiceRegistry;

use crate::error::StepError;
use crate::step::Step;

pub type StepConstructor = Arc<dyn Fn(&Value, &ServiceRegistry) -> Result<Arc<dyn Step>, StepError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct StepFactoryRegistry {
    constructors: HashMap<String, StepConstructor>,
}

impl StepFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in catalogue
    /// (`db_exec`, `json_response`, `statemachine_get`, `circuit_breaker`,
    /// `cloud_validate`, `ecs_plan`, plus `noop`/`log`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::steps::register_builtins(&mut registry);
        registry
    }

    pub fn register(&mut self, step_type: impl Into<String>, constructor: StepConstructor) {
        self.constructors.insert(step_type.into(), constructor);
    }

    pub fn build(&self, step_type: &str, config: &Value, services: &ServiceRegistry) -> Result<Arc<dyn Step>, StepError> {
        let constructor = self
            .constructors
            .get(step_type)
            .ok_or_else(|| StepError::Config(format!("no step type registered: {step_type:?}")))?;
        constructor(config, services)
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_is_config_error() {
        let registry = StepFactoryRegistry::with_builtins();
        let services = ServiceRegistry::new();
        let err = registry.build("nonexistent", &Value::object(), &services).unwrap_err();
        assert!(matches!(err, StepError::Config(_)));
    }

    #[test]
    fn builtins_include_the_representative_catalogue() {
        let registry = StepFactoryRegistry::with_builtins();
        let types = registry.registered_types();
        for expected in ["db_exec", "json_response", "statemachine_get", "circuit_breaker", "cloud_validate", "noop"] {
            assert!(types.contains(&expected.to_string()), "missing {expected}");
        }
    }
}
