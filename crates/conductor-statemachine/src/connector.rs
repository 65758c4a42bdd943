//! `StateMachineStateConnector` — wires a `StateMachineEngine` discovered in
//! the service registry into a `StateTracker`.

use std::sync::Arc;

use async_trait::async_trait;
use conductor_ports::ServiceRegistry;

use crate::engine::StateMachineEngine;
use crate::error::StateMachineError;
use crate::events::TransitionEvent;
use crate::handler::TransitionHandler;
use crate::state_tracker::{ResourceState, StateTracker};

/// Installed as a transition listener; on every committed transition it
/// writes `(resource_type, instance_id, to_state, data)` into the tracker.
struct TrackerTransitionListener {
    tracker: Arc<StateTracker>,
    resource_type: String,
}

#[async_trait]
impl TransitionHandler for TrackerTransitionListener {
    async fn handle(&self, event: &TransitionEvent) -> Result<(), StateMachineError> {
        self.tracker
            .set_state(
                &self.resource_type,
                &event.workflow_id,
                ResourceState {
                    current_state: event.to_state.clone(),
                    previous_state: event.from_state.clone(),
                    last_update: event.timestamp,
                    data: event.data.clone(),
                },
            )
            .await;
        Ok(())
    }
}

pub struct StateMachineStateConnector {
    tracker: Arc<StateTracker>,
}

impl StateMachineStateConnector {
    pub fn new(tracker: Arc<StateTracker>) -> Self {
        Self { tracker }
    }

    /// Resolve `service_name` in `registry` as a `StateMachineEngine`,
    /// install a transition listener that projects into `resource_type`, and
    /// seed the tracker with every instance that already exists. Resolves by
    /// exact registry name, or by dotted suffix (`"orders"` matches a
    /// registered `"app.workflows.orders"`).
    pub async fn connect(
        &self,
        registry: &ServiceRegistry,
        service_name: &str,
        resource_type: impl Into<String>,
    ) -> Result<(), StateMachineError> {
        let resource_type = resource_type.into();
        let resolved_name = resolve_service_name(&registry.names(), service_name)
            .ok_or_else(|| StateMachineError::DefinitionNotFound(service_name.to_string()))?;
        let engine = registry
            .get::<StateMachineEngine>(&resolved_name)
            .map_err(|err| StateMachineError::Config(err.to_string()))?;

        engine.add_transition_listener(Arc::new(TrackerTransitionListener {
            tracker: self.tracker.clone(),
            resource_type: resource_type.clone(),
        }));

        for instance in engine.get_all_instances() {
            self.tracker
                .set_state(
                    &resource_type,
                    &instance.id,
                    ResourceState {
                        current_state: instance.current_state.clone(),
                        previous_state: instance.previous_state.clone(),
                        last_update: instance.last_updated,
                        data: instance.data.clone(),
                    },
                )
                .await;
        }
        Ok(())
    }
}

fn resolve_service_name(registered: &[String], want: &str) -> Option<String> {
    if registered.iter().any(|n| n == want) {
        return Some(want.to_string());
    }
    let suffix = format!(".{want}");
    registered.iter().find(|n| n.ends_with(&suffix)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_exact_name() {
        let registered = vec!["orders".to_string()];
        assert_eq!(resolve_service_name(&registered, "orders"), Some("orders".to_string()));
    }

    #[test]
    fn resolves_dotted_suffix() {
        let registered = vec!["app.workflows.orders".to_string()];
        assert_eq!(
            resolve_service_name(&registered, "orders"),
            Some("app.workflows.orders".to_string())
        );
    }

    #[test]
    fn no_match_returns_none() {
        let registered = vec!["app.workflows.shipping".to_string()];
        assert_eq!(resolve_service_name(&registered, "orders"), None);
    }
}
