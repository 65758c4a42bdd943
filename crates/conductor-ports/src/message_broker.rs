//! `MessageBroker` port — concrete adapters (Kafka, NATS, EventBus) live
//! outside the core; this crate only defines the contract and an in-memory
//! reference implementation for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::PortError;

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, payload: &[u8]) -> Result<(), PortError>;
}

#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn send_message(&self, topic: &str, payload: &[u8]) -> Result<(), PortError>;
}

#[async_trait]
pub trait MessageConsumer: Send + Sync {
    async fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<(), PortError>;
    async fn unsubscribe(&self, topic: &str) -> Result<(), PortError>;
}

#[async_trait]
pub trait MessageBroker: MessageProducer + MessageConsumer {
    async fn start(&self) -> Result<(), PortError>;
    async fn stop(&self) -> Result<(), PortError>;
}

/// In-memory reference broker: delivers synchronously to subscribed
/// handlers, safe for concurrent use. Never used in production — concrete
/// adapters are external collaborators.
#[derive(Default)]
pub struct InMemoryMessageBroker {
    started: std::sync::atomic::AtomicBool,
    subscribers: RwLock<HashMap<String, Vec<Arc<dyn MessageHandler>>>>,
}

impl InMemoryMessageBroker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageProducer for InMemoryMessageBroker {
    async fn send_message(&self, topic: &str, payload: &[u8]) -> Result<(), PortError> {
        if !self.started.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(PortError::NotStarted);
        }
        let handlers = self.subscribers.read().get(topic).cloned().unwrap_or_default();
        for handler in handlers {
            handler.handle_message(payload).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MessageConsumer for InMemoryMessageBroker {
    async fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<(), PortError> {
        self.subscribers.write().entry(topic.to_string()).or_default().push(handler);
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), PortError> {
        self.subscribers.write().remove(topic);
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for InMemoryMessageBroker {
    async fn start(&self) -> Result<(), PortError> {
        self.started.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), PortError> {
        self.started.store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl MessageHandler for CountingHandler {
        async fn handle_message(&self, _payload: &[u8]) -> Result<(), PortError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn send_before_start_fails() {
        let broker = InMemoryMessageBroker::new();
        let err = broker.send_message("t", b"x").await.unwrap_err();
        assert!(matches!(err, PortError::NotStarted));
    }

    #[tokio::test]
    async fn subscribed_handler_receives_message_after_start() {
        let broker = InMemoryMessageBroker::new();
        let count = Arc::new(AtomicUsize::new(0));
        broker
            .subscribe("t", Arc::new(CountingHandler(count.clone())))
            .await
            .unwrap();
        broker.start().await.unwrap();
        broker.send_message("t", b"x").await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
