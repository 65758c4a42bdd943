//! `DBProvider` port — a narrow SQL execution contract. Concrete clients
//! (SQLite, Postgres, ...) are external collaborators.

use async_trait::async_trait;
use conductor_context::Value;
use parking_lot::Mutex;

use crate::error::PortError;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

#[async_trait]
pub trait DBProvider: Send + Sync {
    async fn exec(&self, query: &str, params: &[Value]) -> Result<ExecResult, PortError>;
}

/// In-memory reference provider for tests: records every statement it was
/// asked to run and returns a caller-configured canned result.
pub struct InMemoryDbProvider {
    log: Mutex<Vec<(String, Vec<Value>)>>,
    canned: ExecResult,
    fail: bool,
}

impl InMemoryDbProvider {
    pub fn new(canned: ExecResult) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            canned,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            canned: ExecResult::default(),
            fail: true,
        }
    }

    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl DBProvider for InMemoryDbProvider {
    async fn exec(&self, query: &str, params: &[Value]) -> Result<ExecResult, PortError> {
        if self.fail {
            return Err(PortError::External("simulated driver error".to_string()));
        }
        self.log.lock().push((query.to_string(), params.to_vec()));
        Ok(self.canned.clone())
    }
}
