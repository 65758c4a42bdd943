//! `json_response` — writes the HTTP response that completes the run that
//! triggered this pipeline. Requires a response writer to have been
//! installed on the context (see E5).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use conductor_context::{PipelineContext, TemplateEngine, Value};
use conductor_ports::ServiceRegistry;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::step::{Step, StepResult};

const DEFAULT_STATUS: u16 = 200;

pub struct JsonResponseStep {
    status: u16,
    headers: Vec<(String, String)>,
    body: Option<Value>,
    body_from: Option<String>,
    template: TemplateEngine,
}

impl JsonResponseStep {
    pub fn build(config: &Value, _services: &ServiceRegistry) -> Result<Arc<dyn Step>, StepError> {
        let status = match config.get_path("status") {
            Some(Value::Int(s)) => u16::try_from(*s)
                .map_err(|_| StepError::Config("json_response `status` out of range".to_string()))?,
            Some(Value::Null) | None => DEFAULT_STATUS,
            Some(_) => return Err(StepError::Config("json_response `status` must be an integer".to_string())),
        };

        let mut headers = Vec::new();
        if let Some(Value::Object(declared)) = config.get_path("headers") {
            for (k, v) in declared {
                headers.push((k.clone(), v.as_str().unwrap_or_default().to_string()));
            }
        }
        if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        let body = config.get_path("body").cloned();
        let body_from = config
            .get_path("body_from")
            .and_then(Value::as_str)
            .map(str::to_string);

        if body.is_none() && body_from.is_none() {
            return Err(StepError::Config(
                "json_response requires either `body` or `body_from`".to_string(),
            ));
        }

        Ok(Arc::new(JsonResponseStep {
            status,
            headers,
            body,
            body_from,
            template: TemplateEngine::new(),
        }))
    }
}

#[async_trait]
impl Step for JsonResponseStep {
    fn step_type(&self) -> &str {
        "json_response"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    async fn execute(&self, _token: &CancellationToken, pc: &mut PipelineContext) -> Result<StepResult, StepError> {
        let writer = pc
            .response_writer()
            .ok_or_else(|| StepError::Config("json_response requires a _http_response_writer".to_string()))?
            .clone();

        let body = if let Some(path) = &self.body_from {
            pc.resolve_path(path).cloned().unwrap_or(Value::Null)
        } else if let Some(body) = &self.body {
            self.template.resolve_config(body, pc)
        } else {
            Value::Null
        };

        writer.write(self.status, self.headers.clone(), body.clone()).await;
        pc.mark_response_handled();

        let mut output = BTreeMap::new();
        output.insert("status".to_string(), Value::Int(self.status as i64));
        output.insert("body".to_string(), body);
        Ok(StepResult::stopping(Value::Object(output)))
    }
}
