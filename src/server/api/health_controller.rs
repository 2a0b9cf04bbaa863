use axum::Extension;
use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use chrono::Utc;

use crate::logger::Logger;
use crate::server::dtos::health_dto::{
    CacheHealth, HealthResponse, HealthStatus, ServiceHealthDetails, SiteHealth,
};
use crate::server::services::AppServices;
use crate::server::{get_app_version, get_uptime_seconds};

pub struct HealthController;

impl HealthController {
    pub fn app() -> Router {
        Router::new().route("/", get(Self::health_endpoint))
    }

    /// nothing external is checked, the tracked site being slow isn't our health
    pub async fn health_endpoint(
        Extension(services): Extension<AppServices>,
    ) -> (StatusCode, Json<HealthResponse>) {
        let cache_health = Self::check_cache_health(&services);

        // the cache is the only local state, a disabled one still serves every request
        let overall_status = cache_health.status;

        let response = HealthResponse {
            status: overall_status,
            timestamp: Utc::now(),
            uptime_seconds: get_uptime_seconds(),
            version: get_app_version().to_string(),
            environment: Logger::environment_name(services.config.cargo_env).to_string(),
            services: ServiceHealthDetails {
                resolution_cache: cache_health,
                site: SiteHealth {
                    name: services.config.site_name.clone(),
                    url: services.config.site_url.clone(),
                },
            },
        };

        let http_status = match overall_status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };

        (http_status, Json(response))
    }

    fn check_cache_health(services: &AppServices) -> CacheHealth {
        let capacity = services.cache.capacity();
        let entries = services.cache.len();

        let status = if capacity == 0 {
            HealthStatus::Degraded
        } else if entries > capacity {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        };

        CacheHealth {
            status,
            entries,
            capacity,
        }
    }
}
