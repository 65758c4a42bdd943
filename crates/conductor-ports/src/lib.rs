//! # conductor-ports
//!
//! Narrow port/trait contracts the core consumes: `MessageBroker`,
//! `DBProvider`, `Cache`, `HealthCheckable`, `CloudCredentialProvider`, plus
//! the typed capability registry, the credential vault, and the TCP port
//! allocator. Concrete adapters (Kafka, Postgres, Redis, cloud platforms)
//! are external collaborators and out of scope — only in-memory reference
//! implementations live here.

pub mod cache;
pub mod cloud_credentials;
pub mod credential_vault;
pub mod db;
pub mod error;
pub mod health;
pub mod message_broker;
pub mod platform_module;
pub mod port_allocator;
pub mod registry;

pub use cache::{Cache, InMemoryCache};
pub use cloud_credentials::{CloudCredentialProvider, CloudCredentials, StaticCloudCredentialProvider};
pub use credential_vault::CredentialVault;
pub use db::{DBProvider, ExecResult, InMemoryDbProvider};
pub use error::PortError;
pub use health::{aggregate_health, AggregateHealth, HealthCheckable, HealthState, HealthStatus};
pub use message_broker::{InMemoryMessageBroker, MessageBroker, MessageConsumer, MessageHandler, MessageProducer};
pub use platform_module::{InMemoryPlatformModule, PlatformModule};
pub use port_allocator::{PortAllocator, PortAllocatorError};
pub use registry::ServiceRegistry;
