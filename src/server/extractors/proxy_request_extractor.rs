use axum::Extension;
use axum::extract::{FromRequestParts, Query};
use axum::http::HeaderMap;
use axum::http::header::{HOST, RANGE};
use axum::http::request::Parts;
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use tracing::{debug, error};

use crate::config::AppConfig;
use crate::domain::proxy::ProxyRequest;
use crate::server::dtos::proxy_dto::ProxyQuery;
use crate::server::PROXY_ROUTE;
use crate::server::error::Error;
use crate::server::services::AppServices;

/// a validated proxy call, the services and the address links in the response should point at
pub struct ProxyTarget {
    pub request: ProxyRequest,
    pub proxy_endpoint: String,
    pub services: AppServices,
}

/// `url` arrives either as a plain (already query-decoded) http(s) url or as url-safe base64
pub fn decode_url(url_param: &str) -> Result<String, Error> {
    let url_param = url_param.trim();

    if url_param.starts_with("http://") || url_param.starts_with("https://") {
        return Ok(url_param.to_string());
    }

    let mut padded = url_param.trim_end_matches('=').to_string();
    while !padded.len().is_multiple_of(4) {
        padded.push('=');
    }

    URL_SAFE
        .decode(&padded)
        .map_err(|e| {
            error!("failed to decode base64 url: {}", e);
            Error::BadRequest("Invalid URL encoding".to_string())
        })
        .and_then(|bytes| {
            String::from_utf8(bytes).map_err(|e| {
                error!("failed to parse utf-8 url: {}", e);
                Error::BadRequest("Invalid URL encoding".to_string())
            })
        })
}

/// absolute address of the proxy route. PUBLIC_URL wins, otherwise it's rebuilt from the
/// forwarded headers a reverse proxy sets, or the Host header
pub fn proxy_endpoint_for(config: &AppConfig, headers: &HeaderMap) -> String {
    if let Some(public_url) = config
        .public_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
    {
        return format!("{}{}", public_url.trim_end_matches('/'), PROXY_ROUTE);
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let scheme = header("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
    let host = header("x-forwarded-host")
        .or_else(|| header(HOST.as_str()))
        .unwrap_or_else(|| format!("localhost:{}", config.port));

    format!("{}://{}{}", scheme, host, PROXY_ROUTE)
}

impl<S> FromRequestParts<S> for ProxyTarget
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(services): Extension<AppServices> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|err| Error::InternalServerErrorWithContext(err.to_string()))?;

        let Query(query): Query<ProxyQuery> = Query::from_request_parts(parts, state)
            .await
            .map_err(|err| Error::BadRequest(err.body_text()))?;

        let raw_url = query
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::BadRequest("Missing url parameter".to_string()))?;
        let target = decode_url(&raw_url)?;

        let range = parts
            .headers
            .get(RANGE)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        let request = ProxyRequest::new(&target, query.referer, query.origin, range)
            .map_err(|e| Error::BadRequest(format!("Invalid proxy request: {}", e)))?;

        let proxy_endpoint = proxy_endpoint_for(&services.config, &parts.headers);
        debug!(
            "proxy target {} (links rewritten to {})",
            request.target_url, proxy_endpoint
        );

        Ok(ProxyTarget {
            request,
            proxy_endpoint,
            services,
        })
    }
}
