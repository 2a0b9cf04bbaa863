use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub version: String,
    pub environment: String,
    pub services: ServiceHealthDetails,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealthDetails {
    pub resolution_cache: CacheHealth,
    pub site: SiteHealth,
}

#[derive(Debug, Serialize)]
pub struct CacheHealth {
    pub status: HealthStatus,
    pub entries: usize,
    pub capacity: usize,
}

#[derive(Debug, Serialize)]
pub struct SiteHealth {
    pub name: String,
    pub url: String,
}
