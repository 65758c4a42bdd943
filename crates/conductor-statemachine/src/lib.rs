//! # conductor-statemachine
//!
//! A multi-tenant store of named state-machine definitions and their
//! instances, with transactional transitions, auto-transform chains,
//! persistence write-through, crash recovery, and a composite listener
//! model.

pub mod connector;
pub mod definition;
pub mod engine;
pub mod error;
pub mod events;
pub mod handler;
pub mod instance;
pub mod persistence;
pub mod state_tracker;

pub use connector::StateMachineStateConnector;
pub use definition::{StateDef, StateMachineDefinition, StateMachineDefinitionBuilder, TransitionDef};
pub use engine::StateMachineEngine;
pub use error::StateMachineError;
pub use events::TransitionEvent;
pub use handler::{CompositeTransitionHandler, ListenerAdapter, NoopHandler, TransitionHandler};
pub use instance::WorkflowInstance;
pub use persistence::{MemoryPersistenceBackend, PersistenceBackend};
pub use state_tracker::{DispatchMode, ResourceState, StateChangeListener, StateTracker, WILDCARD_RESOURCE_TYPE};
