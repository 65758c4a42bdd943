//! `circuit_breaker` — an in-step Mealy machine guarding a caller-chosen
//! operation. `execute` only admits or denies; the caller reports the
//! outcome of the guarded operation back via `record_success`/`record_failure`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use conductor_context::{PipelineContext, Value};
use conductor_ports::{PortError, ServiceRegistry};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::step::{Step, StepResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    consecutive_fails: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreakerStep {
    failure_threshold: u32,
    success_threshold: u32,
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreakerStep {
    pub fn build(config: &Value, _services: &ServiceRegistry) -> Result<Arc<dyn Step>, StepError> {
        let failure_threshold = positive_int(config, "failure_threshold", 3)?;
        let success_threshold = positive_int(config, "success_threshold", 2)?;
        let timeout_ms = positive_int(config, "timeout_ms", 50)?;

        Ok(Arc::new(CircuitBreakerStep {
            failure_threshold,
            success_threshold,
            timeout: Duration::from_millis(timeout_ms as u64),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_fails: 0,
                success_count: 0,
                opened_at: None,
            }),
        }))
    }

    /// Caller reports the guarded operation succeeded.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_fails = 0;
        match inner.state {
            BreakerState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.success_count = 0;
                    inner.opened_at = None;
                }
            }
            BreakerState::Closed | BreakerState::Open => {}
        }
    }

    /// Caller reports the guarded operation failed.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_fails += 1;
                if inner.consecutive_fails >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.success_count = 0;
            }
            BreakerState::Open => {}
        }
    }

    fn admit(&self) -> (bool, BreakerState) {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.success_count = 0;
                }
            }
        }
        let admitted = inner.state != BreakerState::Open;
        (admitted, inner.state)
    }
}

fn positive_int(config: &Value, field: &str, default: i64) -> Result<u32, StepError> {
    match config.get_path(field) {
        Some(Value::Int(n)) if *n > 0 => Ok(*n as u32),
        Some(Value::Int(_)) => Err(StepError::Config(format!("circuit_breaker `{field}` must be positive"))),
        Some(Value::Null) | None => Ok(default as u32),
        Some(_) => Err(StepError::Config(format!("circuit_breaker `{field}` must be an integer"))),
    }
}

#[async_trait]
impl Step for CircuitBreakerStep {
    fn step_type(&self) -> &str {
        "circuit_breaker"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    async fn execute(&self, _token: &CancellationToken, _pc: &mut PipelineContext) -> Result<StepResult, StepError> {
        let (admitted, state) = self.admit();
        if !admitted {
            return Err(StepError::External(PortError::External("circuit is open".to_string())));
        }
        let mut output = BTreeMap::new();
        output.insert("admitted".to_string(), Value::Bool(admitted));
        output.insert(
            "state".to_string(),
            Value::from(match state {
                BreakerState::Closed => "CLOSED",
                BreakerState::Open => "OPEN",
                BreakerState::HalfOpen => "HALF_OPEN",
            }),
        );
        Ok(StepResult::new(Value::Object(output)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_context::PipelineContext;

    fn breaker(failure_threshold: u32, success_threshold: u32, timeout_ms: u64) -> CircuitBreakerStep {
        CircuitBreakerStep {
            failure_threshold,
            success_threshold,
            timeout: Duration::from_millis(timeout_ms),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_fails: 0,
                success_count: 0,
                opened_at: None,
            }),
        }
    }

    #[tokio::test]
    async fn opens_after_failure_threshold_then_half_opens_after_timeout() {
        let breaker = breaker(3, 2, 50);
        let token = CancellationToken::new();
        let mut pc = PipelineContext::new("exec-1");

        for _ in 0..3 {
            breaker.record_failure();
        }
        let err = breaker.execute(&token, &mut pc).await.unwrap_err();
        assert!(matches!(err, StepError::External(_)));

        tokio::time::sleep(Duration::from_millis(60)).await;
        let result = breaker.execute(&token, &mut pc).await.unwrap();
        assert_eq!(result.output.get_path("state"), Some(&Value::from("HALF_OPEN")));
    }

    #[tokio::test]
    async fn half_open_closes_after_success_threshold() {
        let breaker = breaker(1, 2, 10);
        breaker.record_failure();
        tokio::time::sleep(Duration::from_millis(15)).await;
        let token = CancellationToken::new();
        let mut pc = PipelineContext::new("exec-1");
        breaker.execute(&token, &mut pc).await.unwrap();

        breaker.record_success();
        breaker.record_success();
        let result = breaker.execute(&token, &mut pc).await.unwrap();
        assert_eq!(result.output.get_path("state"), Some(&Value::from("CLOSED")));
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let breaker = breaker(1, 2, 10);
        breaker.record_failure();
        tokio::time::sleep(Duration::from_millis(15)).await;
        let token = CancellationToken::new();
        let mut pc = PipelineContext::new("exec-1");
        breaker.execute(&token, &mut pc).await.unwrap();

        breaker.record_failure();
        let err = breaker.execute(&token, &mut pc).await.unwrap_err();
        assert!(matches!(err, StepError::External(_)));
    }
}
