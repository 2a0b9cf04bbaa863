use axum::{
    Extension, Json, Router,
    http::HeaderMap,
    routing::get,
};
use tracing::{debug, info, warn};

use crate::server::{
    dtos::resolve_dto::{ResolveRequest, ResolveResponse},
    error::{AppResult, Error},
    extractors::{ValidatedJson, ValidatedQuery, proxy_endpoint_for},
    services::AppServices,
    utils::rewrite_utils,
};

pub struct ResolveController;

impl ResolveController {
    pub fn app() -> Router {
        Router::new().route("/", get(Self::resolve_get).post(Self::resolve_post))
    }

    async fn resolve_get(
        Extension(services): Extension<AppServices>,
        headers: HeaderMap,
        ValidatedQuery(request): ValidatedQuery<ResolveRequest>,
    ) -> AppResult<Json<ResolveResponse>> {
        Self::resolve(services, headers, request).await
    }

    async fn resolve_post(
        Extension(services): Extension<AppServices>,
        headers: HeaderMap,
        ValidatedJson(request): ValidatedJson<ResolveRequest>,
    ) -> AppResult<Json<ResolveResponse>> {
        Self::resolve(services, headers, request).await
    }

    async fn resolve(
        services: AppServices,
        headers: HeaderMap,
        request: ResolveRequest,
    ) -> AppResult<Json<ResolveResponse>> {
        if let Some(site) = request.site.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !site.eq_ignore_ascii_case(&services.config.site_name) {
                debug!("resolve asked for unknown site '{}'", site);
                return Ok(Json(ResolveResponse::failed(
                    format!("Unsupported site '{}'", site),
                    None,
                )));
            }
        }

        let query = request.into_query();
        debug!("resolving {:?}", query);

        let source = match services.resolver.resolve_with_stream(&query).await {
            Ok(source) => source,
            // exhausting every fallback is an answer, not a failure
            Err(Error::NotFound(message)) => {
                info!("nothing found for '{}': {}", query.primary_title, message);
                return Ok(Json(ResolveResponse::failed(message, None)));
            }
            Err(e) => return Err(e),
        };

        let Some(stream_url) = source.embedded_stream_url.clone() else {
            warn!(
                "watch page {} found for '{}' but no player on it",
                source.watch_page_url, query.primary_title
            );
            return Ok(Json(ResolveResponse::failed(
                "Player not found on watch page",
                Some(source.watch_page_url),
            )));
        };

        // the player expects to be embedded by the watch page
        let proxy_endpoint = proxy_endpoint_for(&services.config, &headers);
        let proxy_url = rewrite_utils::wrap(&stream_url, &proxy_endpoint, &source.watch_page_url);

        info!(
            "resolved '{}' to {} (player {})",
            query.primary_title, source.watch_page_url, stream_url
        );

        Ok(Json(ResolveResponse::found(source, stream_url, proxy_url)))
    }
}
