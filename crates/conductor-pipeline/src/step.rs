//! The `Step` contract shared by every built-in and future step type.

use async_trait::async_trait;
use conductor_context::{PipelineContext, Value};
use tokio_util::sync::CancellationToken;

use crate::error::StepError;

/// Result of one step's `execute`. `output` is merged into
/// `pc.StepOutputs[step.name]`; `stop` halts the pipeline successfully.
#[derive(Debug, Clone, Default)]
pub struct StepResult {
    pub output: Value,
    pub stop: bool,
}

impl StepResult {
    pub fn new(output: Value) -> Self {
        Self { output, stop: false }
    }

    pub fn stopping(output: Value) -> Self {
        Self { output, stop: true }
    }
}

/// A constructed, ready-to-run step. Implementers MUST treat their config as
/// frozen after construction — the factory is the only place config is
/// parsed and validated.
///
/// `as_any` lets the runner recover a concrete step (e.g. `CircuitBreakerStep`)
/// from the type-erased `Arc<dyn Step>` the factory hands back, to call
/// methods outside the `Step` contract such as `record_success`.
#[async_trait]
pub trait Step: Send + Sync + std::any::Any {
    fn step_type(&self) -> &str;
    async fn execute(&self, token: &CancellationToken, pc: &mut PipelineContext) -> Result<StepResult, StepError>;
    fn as_any(&self) -> &dyn std::any::Any;
}
