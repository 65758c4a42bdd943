//! Built-in step catalogue. Each submodule owns one step type's config
//! parsing and `Execute` behaviour; `register_builtins` wires them into a
//! `StepFactoryRegistry` under their type tag.

mod circuit_breaker;
mod cloud_validate;
mod db_exec;
mod json_response;
mod noop;
mod statemachine_get;

pub use circuit_breaker::CircuitBreakerStep;

use crate::factory::StepFactoryRegistry;

pub fn register_builtins(registry: &mut StepFactoryRegistry) {
    registry.register("db_exec", std::sync::Arc::new(db_exec::DbExecStep::build));
    registry.register("json_response", std::sync::Arc::new(json_response::JsonResponseStep::build));
    registry.register("statemachine_get", std::sync::Arc::new(statemachine_get::StateMachineGetStep::build));
    registry.register("circuit_breaker", std::sync::Arc::new(circuit_breaker::CircuitBreakerStep::build));
    registry.register("cloud_validate", std::sync::Arc::new(cloud_validate::CloudValidateStep::build));
    registry.register("ecs_plan", std::sync::Arc::new(cloud_validate::CloudValidateStep::build));
    registry.register("noop", std::sync::Arc::new(noop::NoopStep::build));
    registry.register("log", std::sync::Arc::new(noop::LogStep::build));
}
