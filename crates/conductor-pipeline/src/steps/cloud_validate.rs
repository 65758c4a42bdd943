//! `cloud_validate` / `ecs_*` — locates a `PlatformModule` via the service
//! registry and invokes its `Plan/Apply/Status/Destroy` contract.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use conductor_context::{PipelineContext, TemplateEngine, Value};
use conductor_ports::{PlatformModule, PortError, ServiceRegistry};
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::step::{Step, StepResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Plan,
    Apply,
    Status,
    Destroy,
}

impl Operation {
    fn parse(s: &str) -> Result<Self, StepError> {
        match s {
            "plan" => Ok(Operation::Plan),
            "apply" => Ok(Operation::Apply),
            "status" => Ok(Operation::Status),
            "destroy" => Ok(Operation::Destroy),
            other => Err(StepError::Config(format!("cloud_validate `operation` must be one of plan/apply/status/destroy, got {other:?}"))),
        }
    }
}

pub struct CloudValidateStep {
    module: Arc<Box<dyn PlatformModule>>,
    operation: Operation,
    spec: Value,
    resource_id: Option<String>,
    template: TemplateEngine,
}

impl CloudValidateStep {
    pub fn build(config: &Value, services: &ServiceRegistry) -> Result<Arc<dyn Step>, StepError> {
        let platform_name = config
            .get_path("platform")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::Config("cloud_validate requires a string `platform` field".to_string()))?;
        let operation = Operation::parse(
            config
                .get_path("operation")
                .and_then(Value::as_str)
                .unwrap_or("plan"),
        )?;
        let spec = config.get_path("spec").cloned().unwrap_or_else(Value::object);
        let resource_id = config
            .get_path("resource_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        if matches!(operation, Operation::Status | Operation::Destroy) && resource_id.is_none() {
            return Err(StepError::Config(
                "cloud_validate `status`/`destroy` requires `resource_id`".to_string(),
            ));
        }

        let module = services
            .get::<Box<dyn PlatformModule>>(platform_name)
            .map_err(|err| StepError::Config(format!("cloud_validate platform {platform_name:?}: {err}")))?;

        Ok(Arc::new(CloudValidateStep {
            module,
            operation,
            spec,
            resource_id,
            template: TemplateEngine::new(),
        }))
    }
}

#[async_trait]
impl Step for CloudValidateStep {
    fn step_type(&self) -> &str {
        "cloud_validate"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    async fn execute(&self, _token: &CancellationToken, pc: &mut PipelineContext) -> Result<StepResult, StepError> {
        let spec = self.template.resolve_config(&self.spec, pc);
        let resource_id = self
            .resource_id
            .as_ref()
            .map(|id| self.template.resolve(id, pc).to_string());

        let result: Result<Value, PortError> = match self.operation {
            Operation::Plan => self.module.plan(&spec).await,
            Operation::Apply => self.module.apply(&spec).await,
            Operation::Status => self.module.status(resource_id.as_deref().unwrap_or_default()).await,
            Operation::Destroy => self.module.destroy(resource_id.as_deref().unwrap_or_default()).await,
        };

        let mut output = BTreeMap::new();
        output.insert("platform".to_string(), Value::from(self.module.platform()));
        output.insert("result".to_string(), result?);
        Ok(StepResult::new(Value::Object(output)))
    }
}
