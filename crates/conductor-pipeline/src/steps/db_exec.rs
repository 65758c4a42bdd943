//! `db_exec` — resolves params against the context, executes a
//! parameterised SQL statement against a named `DBProvider`.

use std::sync::Arc;

use async_trait::async_trait;
use conductor_context::{PipelineContext, TemplateEngine, Value};
use conductor_ports::{DBProvider, ServiceRegistry};
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::step::{Step, StepResult};

pub struct DbExecStep {
    database: Arc<Box<dyn DBProvider>>,
    query: String,
    params: Vec<Value>,
    template: TemplateEngine,
}

impl DbExecStep {
    pub fn build(config: &Value, services: &ServiceRegistry) -> Result<Arc<dyn Step>, StepError> {
        let database_name = config
            .get_path("database")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::Config("db_exec requires a string `database` field".to_string()))?;
        let query = config
            .get_path("query")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::Config("db_exec requires a string `query` field".to_string()))?
            .to_string();

        let template = TemplateEngine::new();
        template.reject_templated_query(&query)?;

        let params = match config.get_path("params") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return Err(StepError::Config("db_exec `params` must be an array".to_string())),
        };

        let database = services
            .get::<Box<dyn DBProvider>>(database_name)
            .map_err(|err| StepError::Config(format!("db_exec database {database_name:?}: {err}")))?;

        Ok(Arc::new(DbExecStep { database, query, params, template }))
    }
}

#[async_trait]
impl Step for DbExecStep {
    fn step_type(&self) -> &str {
        "db_exec"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    async fn execute(&self, _token: &CancellationToken, pc: &mut PipelineContext) -> Result<StepResult, StepError> {
        let resolved_params: Vec<Value> = self
            .params
            .iter()
            .map(|p| self.template.resolve_config(p, pc))
            .collect();

        let result = self.database.exec(&self.query, &resolved_params).await?;

        let mut output = std::collections::BTreeMap::new();
        output.insert("affected_rows".to_string(), Value::Int(result.rows_affected as i64));
        output.insert(
            "last_id".to_string(),
            result.last_insert_id.map(Value::Int).unwrap_or(Value::Null),
        );
        Ok(StepResult::new(Value::Object(output)))
    }
}
