//! `StateMachineEngine` — owns definitions, instances, and transition
//! handlers; enforces transition legality; write-through persistence;
//! auto-transform continuation; crash recovery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use conductor_context::Value;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::definition::StateMachineDefinition;
use crate::error::StateMachineError;
use crate::events::TransitionEvent;
use crate::handler::{CompositeTransitionHandler, TransitionHandler};
use crate::instance::WorkflowInstance;
use crate::persistence::PersistenceBackend;

struct EngineState {
    definitions: HashMap<String, Arc<StateMachineDefinition>>,
    instances: HashMap<String, WorkflowInstance>,
    /// `workflow_type -> instance ids`, maintained alongside `instances`
    /// under the same lock.
    type_index: HashMap<String, Vec<String>>,
}

/// Multi-tenant store of named state-machine definitions and their
/// instances. One reader/writer lock protects `definitions`, `instances`,
/// and `type_index` together; the transition commit path takes it in write
/// mode, plain reads take it in read mode.
pub struct StateMachineEngine {
    state: RwLock<EngineState>,
    handler: Arc<CompositeTransitionHandler>,
    persistence: Option<Arc<dyn PersistenceBackend>>,
    tasks: TaskTracker,
}

impl StateMachineEngine {
    pub fn new(persistence: Option<Arc<dyn PersistenceBackend>>) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(EngineState {
                definitions: HashMap::new(),
                instances: HashMap::new(),
                type_index: HashMap::new(),
            }),
            handler: Arc::new(CompositeTransitionHandler::new()),
            persistence,
            tasks: TaskTracker::new(),
        })
    }

    pub fn add_transition_listener(&self, handler: Arc<dyn TransitionHandler>) {
        self.handler.add_listener(handler);
    }

    pub fn add_global_transition_handler(&self, handler: Arc<dyn TransitionHandler>) {
        self.handler.add(handler);
    }

    /// Rejects empty name, empty states, or an `initial_state` absent from
    /// `states` — `StateMachineDefinition::validate` already enforces this
    /// (and the stricter ambiguous-auto-transform check), so registration
    /// re-runs it defensively against hand-built definitions.
    pub fn register_definition(&self, def: StateMachineDefinition) -> Result<(), StateMachineError> {
        def.validate()?;
        self.state.write().definitions.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    pub async fn create_workflow(
        &self,
        workflow_type: &str,
        id: &str,
        initial_data: Value,
    ) -> Result<(), StateMachineError> {
        let instance = {
            let mut state = self.state.write();
            let def = state
                .definitions
                .get(workflow_type)
                .ok_or_else(|| StateMachineError::DefinitionNotFound(workflow_type.to_string()))?
                .clone();
            let instance = WorkflowInstance::new(id, workflow_type, def.initial_state.clone(), initial_data);
            state.instances.insert(id.to_string(), instance.clone());
            state.type_index.entry(workflow_type.to_string()).or_default().push(id.to_string());
            instance
        };

        if let Some(backend) = &self.persistence {
            if let Err(err) = backend.save_workflow_instance(&instance).await {
                tracing::warn!(error = %err, workflow_id = %id, "failed to persist newly created workflow instance");
            }
        }
        Ok(())
    }

    pub fn get_instance(&self, id: &str) -> Option<WorkflowInstance> {
        self.state.read().instances.get(id).cloned()
    }

    pub fn get_all_instances(&self) -> Vec<WorkflowInstance> {
        self.state.read().instances.values().cloned().collect()
    }

    pub fn get_orphaned_instances(&self) -> Vec<WorkflowInstance> {
        let state = self.state.read();
        state
            .instances
            .values()
            .filter(|instance| {
                state
                    .definitions
                    .get(&instance.workflow_type)
                    .map(|def| !def.states.contains_key(&instance.current_state))
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// The core atom: validate-under-lock, invoke handler outside the lock,
    /// commit-under-lock. See module docs for the full contract.
    pub async fn trigger_transition(
        self: &Arc<Self>,
        workflow_id: &str,
        transition_name: &str,
        data: Value,
    ) -> Result<(), StateMachineError> {
        let (event, def) = {
            let state = self.state.read();
            let instance = state
                .instances
                .get(workflow_id)
                .ok_or_else(|| StateMachineError::InstanceNotFound(workflow_id.to_string()))?;
            let def = state
                .definitions
                .get(&instance.workflow_type)
                .ok_or_else(|| StateMachineError::DefinitionNotFound(instance.workflow_type.clone()))?
                .clone();
            let transition = def.transition_by_name(transition_name).ok_or_else(|| {
                StateMachineError::TransitionNotFound {
                    definition: def.name.clone(),
                    transition: transition_name.to_string(),
                }
            })?;
            if instance.current_state != transition.from_state {
                return Err(StateMachineError::InvalidTransition {
                    workflow_id: workflow_id.to_string(),
                    current: instance.current_state.clone(),
                    expected: transition.from_state.clone(),
                    transition: transition_name.to_string(),
                });
            }
            let event = TransitionEvent {
                workflow_id: workflow_id.to_string(),
                transition_id: transition_name.to_string(),
                from_state: transition.from_state.clone(),
                to_state: transition.to_state.clone(),
                timestamp: Utc::now(),
                data,
            };
            (event, def)
        };

        // Lock dropped here. The handler may call back into the engine
        // (e.g. via AddTransitionListener) without deadlocking.
        self.handler
            .handle(&event)
            .await
            .map_err(|err| StateMachineError::Handler(err.to_string()))?;

        let (committed_state, should_auto, snapshot_data) = {
            let mut state = self.state.write();
            let instance = state
                .instances
                .get_mut(workflow_id)
                .ok_or_else(|| StateMachineError::InstanceNotFound(workflow_id.to_string()))?;
            // Re-validate under the write lock: closes the race window where
            // a second transition passed the read-lock guard-check while
            // this one's handler was running.
            if instance.current_state != event.from_state {
                return Err(StateMachineError::InvalidTransition {
                    workflow_id: workflow_id.to_string(),
                    current: instance.current_state.clone(),
                    expected: event.from_state.clone(),
                    transition: transition_name.to_string(),
                });
            }
            instance.previous_state = instance.current_state.clone();
            instance.current_state = event.to_state.clone();
            instance.last_updated = Utc::now();
            instance.last_transition = Some(transition_name.to_string());
            merge_data(&mut instance.data, event.data.clone());

            if let Some(new_state_def) = def.states.get(&event.to_state) {
                if new_state_def.is_final {
                    instance.completed = true;
                    instance.error = new_state_def.is_error;
                }
            }
            let snapshot = instance.clone();
            (instance.current_state.clone(), !instance.completed, snapshot.data.clone())
        };

        if let Some(backend) = &self.persistence {
            if let Some(instance) = self.get_instance(workflow_id) {
                if let Err(err) = backend.save_workflow_instance(&instance).await {
                    tracing::warn!(error = %err, workflow_id, "failed to persist committed transition, will retry on Stop flush");
                }
            }
        }

        if should_auto && def.auto_transform_from(&committed_state).is_some() {
            let auto_name = def
                .transitions
                .iter()
                .find(|(_, t)| t.from_state == committed_state && t.auto_transform)
                .map(|(name, _)| name.clone());
            if let Some(auto_name) = auto_name {
                let engine = self.clone();
                let workflow_id = workflow_id.to_string();
                self.tasks.spawn(async move {
                    if let Err(err) = engine.trigger_transition(&workflow_id, &auto_name, snapshot_data).await {
                        tracing::warn!(error = %err, workflow_id, transition = %auto_name, "auto-transform failed");
                    }
                });
            }
        }

        Ok(())
    }

    /// Repopulate in-memory maps from the persistence backend, skipping IDs
    /// already present and warning about orphaned states.
    pub async fn load_all_persisted_instances(&self, workflow_type: &str) -> Result<usize, StateMachineError> {
        let Some(backend) = &self.persistence else {
            return Ok(0);
        };
        let loaded = backend
            .load_workflow_instances(workflow_type)
            .await
            .map_err(StateMachineError::Persistence)?;
        let mut count = 0;
        let mut state = self.state.write();
        for instance in loaded {
            if state.instances.contains_key(&instance.id) {
                continue;
            }
            let orphaned = state
                .definitions
                .get(&instance.workflow_type)
                .map(|def| !def.states.contains_key(&instance.current_state))
                .unwrap_or(true);
            if orphaned {
                tracing::warn!(workflow_id = %instance.id, state = %instance.current_state, "loaded instance is in an undeclared (orphaned) state");
            }
            state.type_index.entry(instance.workflow_type.clone()).or_default().push(instance.id.clone());
            state.instances.insert(instance.id.clone(), instance);
            count += 1;
        }
        Ok(count)
    }

    /// Find non-completed instances whose `CurrentState` is in `states` and
    /// whose `PreviousState` is recorded; roll each back to `PreviousState`,
    /// persist, and re-trigger the transition that originally advanced it,
    /// asynchronously under the tracked task set. Returns the number
    /// scheduled.
    pub async fn recover_processing_instances(self: &Arc<Self>, states: &[String]) -> usize {
        let candidates: Vec<(String, String, String)> = {
            let state = self.state.read();
            state
                .instances
                .values()
                .filter(|i| !i.completed && states.contains(&i.current_state) && !i.previous_state.is_empty())
                .filter_map(|i| i.last_transition.clone().map(|t| (i.id.clone(), i.previous_state.clone(), t)))
                .collect()
        };

        let mut scheduled = 0;
        for (workflow_id, previous_state, transition) in candidates {
            {
                let mut state = self.state.write();
                if let Some(instance) = state.instances.get_mut(&workflow_id) {
                    instance.current_state = previous_state;
                    instance.last_updated = Utc::now();
                }
            }
            if let Some(backend) = &self.persistence {
                if let Some(instance) = self.get_instance(&workflow_id) {
                    if let Err(err) = backend.save_workflow_instance(&instance).await {
                        tracing::warn!(error = %err, workflow_id, "failed to persist rollback before recovery re-trigger");
                    }
                }
            }

            let engine = self.clone();
            let wf_id = workflow_id.clone();
            self.tasks.spawn(async move {
                if let Err(err) = engine.trigger_transition(&wf_id, &transition, Value::object()).await {
                    tracing::warn!(error = %err, workflow_id = %wf_id, transition = %transition, "recovery re-trigger failed");
                }
            });
            scheduled += 1;
        }
        scheduled
    }

    /// Wait for in-flight tasks (bounded by `deadline`), then flush every
    /// instance to the persistence backend. Partial flush failures are
    /// logged, not returned.
    pub async fn stop(&self, deadline: Duration) {
        self.tasks.close();
        if tokio::time::timeout(deadline, self.tasks.wait()).await.is_err() {
            tracing::warn!("StateMachineEngine::stop timed out waiting for in-flight tasks");
        }

        if let Some(backend) = &self.persistence {
            let snapshot = self.get_all_instances();
            for instance in snapshot {
                if let Err(err) = backend.save_workflow_instance(&instance).await {
                    tracing::warn!(error = %err, workflow_id = %instance.id, "failed to flush instance on stop");
                }
            }
        }
    }
}

fn merge_data(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(existing_map), Value::Object(new_map)) => {
            for (k, v) in new_map {
                existing_map.insert(k, v);
            }
        }
        (slot, new_value) if !matches!(new_value, Value::Null) => {
            *slot = new_value;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{StateDef, StateMachineDefinition, TransitionDef};
    use async_trait::async_trait;

    fn ab_definition() -> StateMachineDefinition {
        StateMachineDefinition::builder("order", "A")
            .state("A", StateDef::new())
            .state("B", StateDef::new())
            .transition("t", TransitionDef::new("A", "B"))
            .build()
            .unwrap()
    }

    struct FailingHandler;
    #[async_trait]
    impl TransitionHandler for FailingHandler {
        async fn handle(&self, _event: &TransitionEvent) -> Result<(), StateMachineError> {
            Err(StateMachineError::Handler("boom".to_string()))
        }
    }

    /// E2: handler failure commits nothing.
    #[tokio::test]
    async fn handler_failure_leaves_instance_unchanged() {
        let engine = StateMachineEngine::new(None);
        engine.register_definition(ab_definition()).unwrap();
        engine.add_global_transition_handler(Arc::new(FailingHandler));
        engine.create_workflow("order", "w1", Value::object()).await.unwrap();

        let err = engine.trigger_transition("w1", "t", Value::object()).await.unwrap_err();
        assert!(matches!(err, StateMachineError::Handler(_)));

        let instance = engine.get_instance("w1").unwrap();
        assert_eq!(instance.current_state, "A");
        assert_eq!(instance.previous_state, "");
    }

    /// Property 2: FromState guard.
    #[tokio::test]
    async fn wrong_from_state_is_rejected() {
        let engine = StateMachineEngine::new(None);
        engine.register_definition(
            StateMachineDefinition::builder("order", "A")
                .state("A", StateDef::new())
                .state("B", StateDef::new())
                .state("C", StateDef::new())
                .transition("b_to_c", TransitionDef::new("B", "C"))
                .build()
                .unwrap(),
        ).unwrap();
        engine.create_workflow("order", "w1", Value::object()).await.unwrap();

        let err = engine.trigger_transition("w1", "b_to_c", Value::object()).await.unwrap_err();
        assert!(matches!(err, StateMachineError::InvalidTransition { .. }));
    }

    /// E3: auto-transform confluence A --t--> B --auto--> C.
    #[tokio::test]
    async fn auto_transform_chains_to_final_state() {
        let engine = StateMachineEngine::new(None);
        engine.register_definition(
            StateMachineDefinition::builder("order", "A")
                .state("A", StateDef::new())
                .state("B", StateDef::new())
                .state("C", StateDef::final_ok())
                .transition("t", TransitionDef::new("A", "B"))
                .transition("auto", TransitionDef::new("B", "C").auto())
                .build()
                .unwrap(),
        ).unwrap();
        engine.create_workflow("order", "w1", Value::object()).await.unwrap();
        engine.trigger_transition("w1", "t", Value::object()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let instance = engine.get_instance("w1").unwrap();
        assert_eq!(instance.current_state, "C");
        assert_eq!(instance.previous_state, "B");
        assert!(instance.completed);
    }

    #[tokio::test]
    async fn recover_processing_instances_reruns_last_transition() {
        let backend = Arc::new(crate::persistence::MemoryPersistenceBackend::new());
        let engine = StateMachineEngine::new(Some(backend.clone()));
        engine.register_definition(
            StateMachineDefinition::builder("order", "A")
                .state("A", StateDef::new())
                .state("B", StateDef::new())
                .transition("t", TransitionDef::new("A", "B"))
                .build()
                .unwrap(),
        ).unwrap();
        engine.create_workflow("order", "w1", Value::object()).await.unwrap();
        engine.trigger_transition("w1", "t", Value::object()).await.unwrap();

        let scheduled = engine.recover_processing_instances(&["B".to_string()]).await;
        assert_eq!(scheduled, 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let instance = engine.get_instance("w1").unwrap();
        assert_eq!(instance.current_state, "B");
    }
}
