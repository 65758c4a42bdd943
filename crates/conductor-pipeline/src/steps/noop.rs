//! Trivial steps: `noop` (pass-through) and `log` (log-only, pass-through).

use std::sync::Arc;

use async_trait::async_trait;
use conductor_context::{PipelineContext, TemplateEngine, Value};
use conductor_ports::ServiceRegistry;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::step::{Step, StepResult};

pub struct NoopStep;

impl NoopStep {
    pub fn build(_config: &Value, _services: &ServiceRegistry) -> Result<Arc<dyn Step>, StepError> {
        Ok(Arc::new(NoopStep))
    }
}

#[async_trait]
impl Step for NoopStep {
    fn step_type(&self) -> &str {
        "noop"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    async fn execute(&self, _token: &CancellationToken, _pc: &mut PipelineContext) -> Result<StepResult, StepError> {
        Ok(StepResult::new(Value::object()))
    }
}

pub struct LogStep {
    message: String,
    level: String,
    template: TemplateEngine,
}

impl LogStep {
    pub fn build(config: &Value, _services: &ServiceRegistry) -> Result<Arc<dyn Step>, StepError> {
        let message = config
            .get_path("message")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::Config("log requires a string `message` field".to_string()))?
            .to_string();
        let level = config
            .get_path("level")
            .and_then(Value::as_str)
            .unwrap_or("info")
            .to_string();
        Ok(Arc::new(LogStep {
            message,
            level,
            template: TemplateEngine::new(),
        }))
    }
}

#[async_trait]
impl Step for LogStep {
    fn step_type(&self) -> &str {
        "log"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    async fn execute(&self, _token: &CancellationToken, pc: &mut PipelineContext) -> Result<StepResult, StepError> {
        let rendered = self.template.interpolate(&self.message, pc);
        match self.level.as_str() {
            "warn" => tracing::warn!(execution_id = pc.execution_id(), "{rendered}"),
            "error" => tracing::error!(execution_id = pc.execution_id(), "{rendered}"),
            "debug" => tracing::debug!(execution_id = pc.execution_id(), "{rendered}"),
            _ => tracing::info!(execution_id = pc.execution_id(), "{rendered}"),
        }
        Ok(StepResult::new(Value::object()))
    }
}
