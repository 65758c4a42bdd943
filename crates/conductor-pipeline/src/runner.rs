//! The `Pipeline` runner: walks a declared step sequence in order, resolving
//! templated config, merging outputs, honoring `Stop`, and absorbing or
//! propagating errors per each step's `ignore_error` flag.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use conductor_context::{PipelineContext, TemplateEngine, Value};
use conductor_sse::{SSEEvent, SSETracer};
use tokio_util::sync::CancellationToken;

use crate::error::{RunnerError, StepError};
use crate::step::Step;
use crate::steps::CircuitBreakerStep;

/// One entry in a declared pipeline: a name unique within the pipeline, the
/// constructed step, templated config to resolve into `pc.Current` before
/// `execute`, and whether a runtime failure is absorbed rather than
/// propagated.
pub struct PipelineStep {
    pub name: String,
    pub step: Arc<dyn Step>,
    pub config: Value,
    pub ignore_error: bool,
}

impl PipelineStep {
    pub fn new(name: impl Into<String>, step: Arc<dyn Step>) -> Self {
        Self {
            name: name.into(),
            step,
            config: Value::object(),
            ignore_error: false,
        }
    }

    pub fn with_ignore_error(mut self, ignore_error: bool) -> Self {
        self.ignore_error = ignore_error;
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }
}

pub struct Pipeline {
    steps: Vec<PipelineStep>,
    tracer: SSETracer,
    template: TemplateEngine,
}

impl Pipeline {
    pub fn new(steps: Vec<PipelineStep>, tracer: SSETracer) -> Self {
        Self {
            steps,
            tracer,
            template: TemplateEngine::new(),
        }
    }

    /// Execute every step in declared order against `pc`. Returns `Ok(())`
    /// when every step ran (or was absorbed) without an unabsorbed error, or
    /// a step stopped the pipeline early via `StepResult::stop`.
    pub async fn run(&self, token: &CancellationToken, pc: &mut PipelineContext) -> Result<(), RunnerError> {
        let execution_id = pc.execution_id().unwrap_or("unknown").to_string();
        let mut pending_breaker: Option<&CircuitBreakerStep> = None;

        for step in &self.steps {
            if token.is_cancelled() {
                return Err(RunnerError::Cancelled);
            }

            self.tracer.publish(&execution_id, SSEEvent::new(&execution_id, "step.started", lifecycle_data(&step.name, None, 0)));

            let resolved_config = self.template.resolve_config(&step.config, pc);
            for (k, v) in resolved_config.as_object().cloned().unwrap_or_default() {
                pc.set_current(k, v);
            }

            let started = Instant::now();
            let outcome = step.step.execute(token, pc).await;
            let duration_ms = started.elapsed().as_millis() as i64;

            if let Some(breaker) = pending_breaker.take() {
                match &outcome {
                    Ok(_) => breaker.record_success(),
                    Err(_) => breaker.record_failure(),
                }
            }
            pending_breaker = step.step.as_any().downcast_ref::<CircuitBreakerStep>();

            match outcome {
                Ok(result) => {
                    self.tracer.publish(
                        &execution_id,
                        SSEEvent::new(&execution_id, "step.completed", lifecycle_data(&step.name, Some(&result.output), duration_ms)),
                    );
                    pc.merge_step_output(&step.name, result.output);
                    if result.stop {
                        return Ok(());
                    }
                }
                Err(err) => {
                    self.tracer.publish(
                        &execution_id,
                        SSEEvent::new(&execution_id, "step.failed", failure_data(&step.name, &err, duration_ms)),
                    );
                    if step.ignore_error {
                        let mut absorbed = BTreeMap::new();
                        absorbed.insert("ignored_error".to_string(), Value::from(err.to_string()));
                        pc.merge_step_output(&step.name, Value::Object(absorbed));
                        continue;
                    }
                    return Err(RunnerError::StepFailed {
                        step: step.name.clone(),
                        source: err,
                    });
                }
            }
        }
        Ok(())
    }
}

fn lifecycle_data(step_name: &str, output: Option<&Value>, duration_ms: i64) -> String {
    let mut data = BTreeMap::new();
    data.insert("step".to_string(), Value::from(step_name));
    data.insert("duration_ms".to_string(), Value::Int(duration_ms));
    if let Some(output) = output {
        data.insert("output".to_string(), truncate(output));
    }
    serde_json::to_string(&Into::<serde_json::Value>::into(Value::Object(data))).unwrap_or_default()
}

fn failure_data(step_name: &str, err: &StepError, duration_ms: i64) -> String {
    let mut data = BTreeMap::new();
    data.insert("step".to_string(), Value::from(step_name));
    data.insert("duration_ms".to_string(), Value::Int(duration_ms));
    data.insert("error".to_string(), Value::from(err.to_string()));
    serde_json::to_string(&Into::<serde_json::Value>::into(Value::Object(data))).unwrap_or_default()
}

const SNAPSHOT_MAX_CHARS: usize = 2048;

/// Truncate an output snapshot before it goes out over SSE; full payloads
/// stay in `PipelineContext`, only a preview is published.
fn truncate(value: &Value) -> Value {
    let rendered = value.to_string();
    if rendered.len() <= SNAPSHOT_MAX_CHARS {
        value.clone()
    } else {
        Value::from(format!("{}... (truncated)", &rendered[..SNAPSHOT_MAX_CHARS]))
    }
}
