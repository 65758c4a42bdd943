use thiserror::Error;

/// Step-facing error taxonomy. `Config` is fatal at build time; `Template`
/// and `External` are runtime and absorbable via a step's `ignore_error`
/// flag.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("step config invalid: {0}")]
    Config(String),

    #[error("template resolution failed: {0}")]
    Template(#[from] conductor_context::TemplateError),

    #[error("external operation failed: {0}")]
    External(#[from] conductor_ports::PortError),

    #[error("{0}")]
    Other(String),

    #[error("cancelled")]
    Cancelled,
}

/// Runner-level failure: which step failed, and why.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("step {step:?} failed: {source}")]
    StepFailed { step: String, #[source] source: StepError },

    #[error("pipeline run cancelled")]
    Cancelled,
}
