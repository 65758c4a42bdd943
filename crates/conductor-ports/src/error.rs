use thiserror::Error;

/// Error raised by a port operation (DB, broker, cache, cloud credential).
/// Surfaced by the pipeline's `db_exec`/`cloud_validate`/etc. steps as
/// `ErrExternal`.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("message broker not started")]
    NotStarted,

    #[error("no such service registered: {0}")]
    NotFound(String),

    #[error("service {name} does not implement the requested capability")]
    CapabilityMismatch { name: String },

    #[error("external operation failed: {0}")]
    External(String),
}
