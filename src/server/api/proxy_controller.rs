use axum::{
    Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::debug;

use crate::server::{
    error::AppResult, extractors::ProxyTarget, services::proxy_services::cors_headers,
};

pub struct ProxyController;

impl ProxyController {
    pub fn app() -> Router {
        // axum answers HEAD on a get route by itself but drops the body after the fact, a
        // dedicated handler never reads it
        Router::new()
            .route(
                "/",
                get(Self::proxy_get)
                    .head(Self::proxy_head)
                    .options(Self::proxy_options),
            )
            // every response gets them, extractor rejections and upstream errors included
            .layer(middleware::map_response(Self::with_cors_headers))
    }

    async fn with_cors_headers(mut response: Response) -> Response {
        response.headers_mut().extend(cors_headers());
        response
    }

    async fn proxy_get(target: ProxyTarget) -> AppResult<Response> {
        target
            .services
            .proxy
            .proxy(&target.request, &target.proxy_endpoint, false)
            .await
    }

    async fn proxy_head(target: ProxyTarget) -> AppResult<Response> {
        debug!("HEAD {}", target.request.target_url);
        target
            .services
            .proxy
            .proxy(&target.request, &target.proxy_endpoint, true)
            .await
    }

    async fn proxy_options() -> impl IntoResponse {
        (StatusCode::NO_CONTENT, cors_headers())
    }
}
