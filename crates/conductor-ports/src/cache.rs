//! `Cache` port — `Get`/`Set`/`Delete` with a configurable default TTL.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use conductor_context::Value;
use dashmap::DashMap;

use crate::error::PortError;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, PortError>;
    /// `ttl` of zero means "use the cache's configured default".
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), PortError>;
    async fn delete(&self, key: &str) -> Result<(), PortError>;
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-memory reference cache with real TTL expiry, for tests.
pub struct InMemoryCache {
    default_ttl: Duration,
    entries: DashMap<String, Entry>,
}

impl InMemoryCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, PortError> {
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                self.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), PortError> {
        let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PortError> {
        self.entries.remove(key);
        Ok(())
    }
}
