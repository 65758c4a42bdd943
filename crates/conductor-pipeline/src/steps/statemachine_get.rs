//! `statemachine_get` — resolves a workflow instance's current state from a
//! `StateMachineEngine` registered under a service name.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use conductor_context::{PipelineContext, TemplateEngine, Value};
use conductor_ports::ServiceRegistry;
use conductor_statemachine::StateMachineEngine;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::step::{Step, StepResult};

pub struct StateMachineGetStep {
    engine: Arc<StateMachineEngine>,
    entity_id: String,
    template: TemplateEngine,
}

impl StateMachineGetStep {
    pub fn build(config: &Value, services: &ServiceRegistry) -> Result<Arc<dyn Step>, StepError> {
        let statemachine_name = config
            .get_path("statemachine")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::Config("statemachine_get requires a string `statemachine` field".to_string()))?;
        let entity_id = config
            .get_path("entity_id")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::Config("statemachine_get requires a string `entity_id` field".to_string()))?
            .to_string();

        let engine = services
            .get::<StateMachineEngine>(statemachine_name)
            .map_err(|err| StepError::Config(format!("statemachine_get {statemachine_name:?}: {err}")))?;

        Ok(Arc::new(StateMachineGetStep {
            engine,
            entity_id,
            template: TemplateEngine::new(),
        }))
    }
}

#[async_trait]
impl Step for StateMachineGetStep {
    fn step_type(&self) -> &str {
        "statemachine_get"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    async fn execute(&self, _token: &CancellationToken, pc: &mut PipelineContext) -> Result<StepResult, StepError> {
        let entity_id = self.template.resolve(&self.entity_id, pc).to_string();
        let instance = self
            .engine
            .get_instance(&entity_id)
            .ok_or_else(|| StepError::Other(format!("no workflow instance {entity_id:?}")))?;

        let mut output = BTreeMap::new();
        output.insert("current_state".to_string(), Value::from(instance.current_state));
        output.insert("entity_id".to_string(), Value::from(entity_id));
        Ok(StepResult::new(Value::Object(output)))
    }
}

#[cfg(test)]
mod tests {
    use conductor_statemachine::{StateDef, StateMachineDefinition};

    use super::*;

    async fn engine_with_instance() -> Arc<StateMachineEngine> {
        let engine = StateMachineEngine::new(None);
        let def = StateMachineDefinition::builder("order", "PENDING")
            .state("PENDING", StateDef::new())
            .state("SHIPPED", StateDef::final_ok())
            .build()
            .unwrap();
        engine.register_definition(def).unwrap();
        engine.create_workflow("order", "order-1", Value::object()).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn resolves_an_existing_instances_current_state() {
        let engine = engine_with_instance().await;
        let registry = ServiceRegistry::new();
        registry.register("orders", engine);

        let mut config = BTreeMap::new();
        config.insert("statemachine".to_string(), Value::from("orders"));
        config.insert("entity_id".to_string(), Value::from("order-1"));

        let step = StateMachineGetStep::build(&Value::Object(config), &registry).unwrap();
        let mut pc = PipelineContext::new("exec-1");
        let token = CancellationToken::new();
        let result = step.execute(&token, &mut pc).await.unwrap();

        assert_eq!(result.output.get_path("current_state"), Some(&Value::from("PENDING")));
        assert_eq!(result.output.get_path("entity_id"), Some(&Value::from("order-1")));
    }

    #[tokio::test]
    async fn missing_instance_is_an_error_not_a_panic() {
        let engine = engine_with_instance().await;
        let registry = ServiceRegistry::new();
        registry.register("orders", engine);

        let mut config = BTreeMap::new();
        config.insert("statemachine".to_string(), Value::from("orders"));
        config.insert("entity_id".to_string(), Value::from("no-such-order"));

        let step = StateMachineGetStep::build(&Value::Object(config), &registry).unwrap();
        let mut pc = PipelineContext::new("exec-1");
        let token = CancellationToken::new();
        let err = step.execute(&token, &mut pc).await.unwrap_err();
        assert!(matches!(err, StepError::Other(_)));
    }
}
