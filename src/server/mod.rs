pub mod api;
pub mod dtos;
pub mod error;
pub mod extractors;
pub mod services;
pub mod utils;

use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::Instant,
};

use anyhow::Context;
use axum::{Extension, Router, ServiceExt, extract::Request, http::HeaderValue};
use tokio::net::TcpListener;
use tower::{Layer, limit::GlobalConcurrencyLimitLayer};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    normalize_path::NormalizePathLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::AppConfig;
use api::{HealthController, ProxyController, ResolveController};
use services::AppServices;

pub const HEALTH_ROUTE: &str = "/api/v1/health";
pub const RESOLVE_ROUTE: &str = "/api/v1/resolve";
pub const PROXY_ROUTE: &str = "/api/v1/proxy";

static START_TIME: OnceLock<Instant> = OnceLock::new();

pub fn get_uptime_seconds() -> u64 {
    START_TIME.get_or_init(Instant::now).elapsed().as_secs()
}

pub fn get_app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub struct ApplicationServer;

impl ApplicationServer {
    /// every route with its layers, `serve` only adds path normalization and the listener
    pub fn router(services: AppServices) -> Router {
        START_TIME.get_or_init(Instant::now);

        let cors = Self::cors_layer(&services.config.cors_origin);
        let max_concurrent = services.config.max_concurrent_requests.max(1);

        Router::new()
            .nest(HEALTH_ROUTE, HealthController::app().layer(cors.clone()))
            .nest(RESOLVE_ROUTE, ResolveController::app().layer(cors))
            // the proxy sets its own cors headers, preflight included
            .nest(PROXY_ROUTE, ProxyController::app())
            .layer(Extension(services))
            .layer(TraceLayer::new_for_http())
            .layer(GlobalConcurrencyLimitLayer::new(max_concurrent))
    }

    pub async fn serve(config: Arc<AppConfig>) -> anyhow::Result<()> {
        START_TIME.get_or_init(Instant::now);

        let services = AppServices::new(config.clone()).context("failed to start services")?;

        // has to wrap the router from the outside, routing happens before any router layer runs
        let app = NormalizePathLayer::trim_trailing_slash().layer(Self::router(services));

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        info!("routes initialized, listening on port {}", config.port);

        axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
            .await
            .context("error while starting API server")?;

        Ok(())
    }

    fn cors_layer(cors_origin: &str) -> CorsLayer {
        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

        if cors_origin.trim() == "*" {
            return layer.allow_origin(Any);
        }

        let origins: Vec<HeaderValue> = cors_origin
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("skipping invalid cors origin '{}': {}", o, e);
                    None
                }
            })
            .collect();

        info!("cors allow-list: {:?}", origins);

        layer.allow_origin(AllowOrigin::list(origins))
    }
}
