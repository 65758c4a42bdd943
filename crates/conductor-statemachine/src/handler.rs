//! Transition handler contract plus the composite / fire-and-forget
//! adapters that let multiple observers share the engine's single handler
//! slot.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StateMachineError;
use crate::events::TransitionEvent;

#[async_trait]
pub trait TransitionHandler: Send + Sync {
    async fn handle(&self, event: &TransitionEvent) -> Result<(), StateMachineError>;
}

/// A handler with no real work to do; the default slot before any listener
/// is registered.
pub struct NoopHandler;

#[async_trait]
impl TransitionHandler for NoopHandler {
    async fn handle(&self, _event: &TransitionEvent) -> Result<(), StateMachineError> {
        Ok(())
    }
}

/// Erases a wrapped handler's errors: logs them and always returns `Ok`.
/// Used for fire-and-forget listeners whose failures must never abort the
/// transition chain.
pub struct ListenerAdapter {
    inner: Arc<dyn TransitionHandler>,
}

impl ListenerAdapter {
    pub fn new(inner: Arc<dyn TransitionHandler>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TransitionHandler for ListenerAdapter {
    async fn handle(&self, event: &TransitionEvent) -> Result<(), StateMachineError> {
        if let Err(err) = self.inner.handle(event).await {
            tracing::warn!(error = %err, workflow_id = %event.workflow_id, "transition listener failed, swallowing by design");
        }
        Ok(())
    }
}

/// Chain-of-responsibility over multiple handlers. Order is insertion
/// order; the handler list is snapshotted under a read-lock before
/// invocation so handlers may be added/removed concurrently without
/// blocking in-flight dispatch. Any handler's error aborts the chain.
#[derive(Default)]
pub struct CompositeTransitionHandler {
    handlers: RwLock<Vec<Arc<dyn TransitionHandler>>>,
}

impl CompositeTransitionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handler: Arc<dyn TransitionHandler>) {
        self.handlers.write().push(handler);
    }

    /// Add a listener: failures are swallowed (wrapped in `ListenerAdapter`).
    pub fn add_listener(&self, handler: Arc<dyn TransitionHandler>) {
        self.add(Arc::new(ListenerAdapter::new(handler)));
    }
}

#[async_trait]
impl TransitionHandler for CompositeTransitionHandler {
    async fn handle(&self, event: &TransitionEvent) -> Result<(), StateMachineError> {
        let snapshot: Vec<Arc<dyn TransitionHandler>> = self.handlers.read().clone();
        for handler in snapshot {
            handler.handle(event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_event() -> TransitionEvent {
        TransitionEvent {
            workflow_id: "w1".to_string(),
            transition_id: "t".to_string(),
            from_state: "A".to_string(),
            to_state: "B".to_string(),
            timestamp: chrono::Utc::now(),
            data: conductor_context::Value::object(),
        }
    }

    struct FailingHandler;
    #[async_trait]
    impl TransitionHandler for FailingHandler {
        async fn handle(&self, _event: &TransitionEvent) -> Result<(), StateMachineError> {
            Err(StateMachineError::Handler("boom".to_string()))
        }
    }

    struct CountingHandler(Arc<AtomicUsize>);
    #[async_trait]
    impl TransitionHandler for CountingHandler {
        async fn handle(&self, _event: &TransitionEvent) -> Result<(), StateMachineError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn listener_failure_is_swallowed() {
        let composite = CompositeTransitionHandler::new();
        composite.add_listener(Arc::new(FailingHandler));
        assert!(composite.handle(&sample_event()).await.is_ok());
    }

    #[tokio::test]
    async fn global_handler_failure_aborts_chain() {
        let composite = CompositeTransitionHandler::new();
        let count = Arc::new(AtomicUsize::new(0));
        composite.add(Arc::new(FailingHandler));
        composite.add(Arc::new(CountingHandler(count.clone())));
        let result = composite.handle(&sample_event()).await;
        assert!(result.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handlers_run_in_insertion_order() {
        let composite = CompositeTransitionHandler::new();
        let count = Arc::new(AtomicUsize::new(0));
        composite.add(Arc::new(CountingHandler(count.clone())));
        composite.add(Arc::new(CountingHandler(count.clone())));
        composite.handle(&sample_event()).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
