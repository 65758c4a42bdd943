//! Thread-safe TCP port allocation for dynamically deployed workflows.

use std::collections::{HashMap, HashSet};
use std::net::TcpListener;

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortAllocatorError {
    #[error("no available port found starting from {0}")]
    Exhausted(u16),
}

struct State {
    next_port: u16,
    allocated: HashMap<u16, String>,
    excluded: HashSet<u16>,
}

/// Single-mutex port allocator. The OS-level availability probe (bind then
/// close) happens under the lock — a few milliseconds per allocation is an
/// accepted cost for correctness.
pub struct PortAllocator {
    state: Mutex<State>,
    max_scan: u16,
}

impl PortAllocator {
    pub fn new(base_port: u16, excluded: impl IntoIterator<Item = u16>) -> Self {
        Self {
            state: Mutex::new(State {
                next_port: base_port,
                allocated: HashMap::new(),
                excluded: excluded.into_iter().collect(),
            }),
            max_scan: 1000,
        }
    }

    /// Allocate the next free port for `workflow_name`. Concurrent callers
    /// always receive distinct ports: the probe-and-reserve happens under a
    /// single lock held for the duration of the OS bind check.
    pub fn allocate(&self, workflow_name: impl Into<String>) -> Result<u16, PortAllocatorError> {
        let workflow_name = workflow_name.into();
        let mut state = self.state.lock();
        let start = state.next_port;
        for offset in 0..self.max_scan {
            let candidate = start.checked_add(offset).ok_or(PortAllocatorError::Exhausted(start))?;
            if state.excluded.contains(&candidate) || state.allocated.contains_key(&candidate) {
                continue;
            }
            if is_port_available(candidate) {
                state.allocated.insert(candidate, workflow_name);
                state.next_port = candidate.saturating_add(1);
                return Ok(candidate);
            }
        }
        Err(PortAllocatorError::Exhausted(start))
    }

    /// Free every port mapped to `workflow_name`. If any freed port is lower
    /// than the current scan cursor, the cursor resets to it so allocation
    /// can reuse it.
    pub fn release(&self, workflow_name: &str) -> Vec<u16> {
        let mut state = self.state.lock();
        let freed: Vec<u16> = state
            .allocated
            .iter()
            .filter(|(_, name)| name.as_str() == workflow_name)
            .map(|(port, _)| *port)
            .collect();
        for port in &freed {
            state.allocated.remove(port);
            if *port < state.next_port {
                state.next_port = *port;
            }
        }
        freed
    }

    pub fn allocated_for(&self, workflow_name: &str) -> Vec<u16> {
        self.state
            .lock()
            .allocated
            .iter()
            .filter(|(_, name)| name.as_str() == workflow_name)
            .map(|(port, _)| *port)
            .collect()
    }
}

fn is_port_available(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}
