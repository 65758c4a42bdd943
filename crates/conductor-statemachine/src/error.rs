use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateMachineError {
    #[error("definition config invalid: {0}")]
    Config(String),

    #[error("at most one auto-transform may fire per state entry, but state {state:?} in {definition:?} has more than one: {transitions:?}")]
    AmbiguousAutoTransform {
        definition: String,
        state: String,
        transitions: Vec<String>,
    },

    #[error("definition not registered: {0}")]
    DefinitionNotFound(String),

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("transition {transition:?} not declared on definition {definition:?}")]
    TransitionNotFound { definition: String, transition: String },

    #[error("invalid transition: instance {workflow_id} is in state {current:?}, but transition {transition:?} requires {expected:?}")]
    InvalidTransition {
        workflow_id: String,
        current: String,
        expected: String,
        transition: String,
    },

    #[error("transition handler failed: {0}")]
    Handler(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("persistence backend error: {0}")]
    Persistence(String),
}
