//! `HealthCheckable` port plus the aggregation rules used by the `/health`,
//! `/ready`, `/live` HTTP surface.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub message: String,
}

#[async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_status(&self) -> HealthStatus;
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AggregateHealth {
    pub status: HealthState,
    pub components: Vec<(String, HealthStatus)>,
}

/// Aggregate a set of named health checks: any unhealthy makes the whole
/// aggregate unhealthy; any degraded (with none unhealthy) makes it degraded;
/// otherwise healthy.
pub async fn aggregate_health(
    checks: &[(String, std::sync::Arc<dyn HealthCheckable>)],
) -> AggregateHealth {
    let mut components = Vec::with_capacity(checks.len());
    let mut worst = HealthState::Healthy;
    for (name, check) in checks {
        let status = check.health_status().await;
        worst = match (worst, status.status) {
            (_, HealthState::Unhealthy) | (HealthState::Unhealthy, _) => HealthState::Unhealthy,
            (_, HealthState::Degraded) | (HealthState::Degraded, _) => HealthState::Degraded,
            _ => HealthState::Healthy,
        };
        components.push((name.clone(), status));
    }
    AggregateHealth {
        status: worst,
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Fixed(HealthState);

    #[async_trait]
    impl HealthCheckable for Fixed {
        async fn health_status(&self) -> HealthStatus {
            HealthStatus {
                status: self.0,
                message: "fixed".to_string(),
            }
        }
    }

    #[tokio::test]
    async fn any_unhealthy_wins() {
        let checks: Vec<(String, Arc<dyn HealthCheckable>)> = vec![
            ("a".to_string(), Arc::new(Fixed(HealthState::Healthy))),
            ("b".to_string(), Arc::new(Fixed(HealthState::Unhealthy))),
        ];
        let agg = aggregate_health(&checks).await;
        assert_eq!(agg.status, HealthState::Unhealthy);
    }

    #[tokio::test]
    async fn degraded_without_unhealthy_is_degraded() {
        let checks: Vec<(String, Arc<dyn HealthCheckable>)> = vec![
            ("a".to_string(), Arc::new(Fixed(HealthState::Healthy))),
            ("b".to_string(), Arc::new(Fixed(HealthState::Degraded))),
        ];
        let agg = aggregate_health(&checks).await;
        assert_eq!(agg.status, HealthState::Degraded);
    }

    #[tokio::test]
    async fn all_healthy_is_healthy() {
        let checks: Vec<(String, Arc<dyn HealthCheckable>)> =
            vec![("a".to_string(), Arc::new(Fixed(HealthState::Healthy)))];
        let agg = aggregate_health(&checks).await;
        assert_eq!(agg.status, HealthState::Healthy);
    }
}
