//! Health reporting.
//!
//! Health is derived from configuration completeness: the report says which
//! required secrets are present. Dependencies are not probed.

use crate::config::{RequiredSecret, ServiceConfig};
use async_trait::async_trait;
use serde::Serialize;

/// Health report served at `/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// True iff every required secret is present
    pub ok: bool,
    pub requires: Vec<RequiredSecret>,
}

impl HealthReport {
    pub fn from_requirements(requires: Vec<RequiredSecret>) -> Self {
        Self {
            ok: requires.iter().all(|r| r.present),
            requires,
        }
    }
}

/// Interface for system health monitoring
#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn check(&self) -> HealthReport;
}

/// Reports presence of the secrets in the startup configuration.
#[derive(Debug, Clone)]
pub struct ConfigHealthChecker {
    requires: Vec<RequiredSecret>,
}

impl ConfigHealthChecker {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            requires: config.required_secrets(),
        }
    }
}

#[async_trait]
impl HealthChecker for ConfigHealthChecker {
    async fn check(&self) -> HealthReport {
        HealthReport::from_requirements(self.requires.clone())
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
