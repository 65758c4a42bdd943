//! Shared application state handed to every axum handler.

use std::sync::Arc;

use conductor_ports::{HealthCheckable, PortAllocator, ServiceRegistry};
use conductor_pipeline::StepFactoryRegistry;
use conductor_sse::SSETracer;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub services: Arc<ServiceRegistry>,
    pub step_factory: Arc<StepFactoryRegistry>,
    pub sse: SSETracer,
    pub port_allocator: Arc<PortAllocator>,
    pub health_checks: Arc<Vec<(String, Arc<dyn HealthCheckable>)>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let port_allocator_base = config.port_allocator_base;
        Self {
            config: Arc::new(config),
            services: Arc::new(ServiceRegistry::new()),
            step_factory: Arc::new(StepFactoryRegistry::with_builtins()),
            sse: SSETracer::new(),
            port_allocator: Arc::new(PortAllocator::new(port_allocator_base, Vec::<u16>::new())),
            health_checks: Arc::new(Vec::new()),
        }
    }

    pub fn with_health_checks(mut self, checks: Vec<(String, Arc<dyn HealthCheckable>)>) -> Self {
        self.health_checks = Arc::new(checks);
        self
    }
}
