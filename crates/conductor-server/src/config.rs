//! Environment-based configuration.

use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub port_allocator_base: u16,
    pub shutdown_deadline_secs: u64,
    pub vault_passphrase: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let host = env::var("CONDUCTOR_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("CONDUCTOR_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);
        let port_allocator_base = env::var("CONDUCTOR_PORT_ALLOCATOR_BASE")
            .unwrap_or_else(|_| "19000".to_string())
            .parse()
            .unwrap_or(19000);
        let shutdown_deadline_secs = env::var("CONDUCTOR_SHUTDOWN_DEADLINE_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);
        let vault_passphrase = env::var("CONDUCTOR_VAULT_PASSPHRASE").ok();

        Self {
            host,
            port,
            port_allocator_base,
            shutdown_deadline_secs,
            vault_passphrase,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
