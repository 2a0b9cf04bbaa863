// fetches whatever the client asks for with spoofed browser headers and sends it back, text gets
// every url inside rewritten to come back through here, everything else is streamed untouched
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use tracing::{debug, error, warn};

use crate::{
    domain::proxy::{ContentClass, ProxyRequest, RewriteContext},
    server::{
        error::{AppResult, Error},
        utils::{
            encoding_utils::decode_content,
            header_profile::{FetchKind, HeaderProfile},
            rewrite_utils,
            shim_utils::{self, SHIM_MARKER, ShimParams},
        },
    },
};

/// upstream headers relayed as they are, frame blocking ones are never on this list
const FORWARDED_HEADERS: &[HeaderName] = &[
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
];

/// spoofed referer / origin for hosts matching `host_suffix`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefererRule {
    pub host_suffix: String,
    pub referer: String,
    pub origin: String,
}

impl RefererRule {
    /// media / cdn subdomains of a player host want the player as referer, the player page itself
    /// wants the embedding site, which is the default anyway
    pub fn for_player_domain(domain: &str) -> Self {
        let domain = domain.trim().trim_start_matches("www.").to_lowercase();
        Self {
            host_suffix: format!(".{}", domain),
            referer: format!("https://{}/", domain),
            origin: format!("https://{}", domain),
        }
    }

    fn matches(&self, host: &str) -> bool {
        host.ends_with(&self.host_suffix) && !host.starts_with("www.")
    }
}

/// permissive cors set on every proxy response, preflight included
pub fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, HEAD, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Length, Content-Range, Accept-Ranges, Content-Type"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
    headers
}

pub struct ProxyService {
    http: reqwest::Client,
    profile: HeaderProfile,
    site_origin: String,
    rules: Vec<RefererRule>,
    upstream_timeout: Duration,
}

impl ProxyService {
    pub fn new(
        http: reqwest::Client,
        site_origin: String,
        rules: Vec<RefererRule>,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            http,
            profile: HeaderProfile::default(),
            site_origin: site_origin.trim_end_matches('/').to_string(),
            rules,
            upstream_timeout,
        }
    }

    /// referer and origin sent upstream: caller overrides, then the host rule table, then the
    /// tracked site
    pub fn spoofed_headers(&self, req: &ProxyRequest) -> (String, String) {
        let host = req
            .target_url
            .host_str()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let rule = self.rules.iter().find(|r| r.matches(&host));

        let referer = req
            .referer_override
            .clone()
            .or_else(|| rule.map(|r| r.referer.clone()))
            .unwrap_or_else(|| format!("{}/", self.site_origin));

        let origin = req
            .origin_override
            .clone()
            .or_else(|| {
                // an explicit referer implies its origin
                req.referer_override
                    .as_deref()
                    .and_then(|r| url::Url::parse(r).ok())
                    .map(|u| u.origin().ascii_serialization())
                    .filter(|o| o != "null")
            })
            .or_else(|| rule.map(|r| r.origin.clone()))
            .unwrap_or_else(|| self.site_origin.clone());

        (referer, origin)
    }

    fn fetch_kind(req: &ProxyRequest) -> FetchKind {
        let path = req.target_url.path().to_ascii_lowercase();
        let last = path.rsplit('/').next().unwrap_or_default();

        if last.is_empty()
            || !last.contains('.')
            || last.ends_with(".html")
            || last.ends_with(".htm")
            || last.ends_with(".php")
        {
            FetchKind::Document
        } else {
            FetchKind::Subresource
        }
    }

    /// fetches and relays one resource, `proxy_endpoint` is the absolute address of the proxy
    /// route links get rewritten to
    pub async fn proxy(
        &self,
        req: &ProxyRequest,
        proxy_endpoint: &str,
        head_only: bool,
    ) -> AppResult<Response> {
        let (referer, origin) = self.spoofed_headers(req);
        debug!(
            "proxying {} (referer={}, origin={}, range={:?})",
            req.target_url, referer, origin, req.range_header
        );

        let mut request_builder = self.profile.apply(
            self.http.get(req.target_url.clone()),
            Self::fetch_kind(req),
            Some(&referer),
            Some(&origin),
        );

        if let Some(range) = &req.range_header {
            request_builder = request_builder.header(header::RANGE, range);
        }

        // bounds the wait for headers only, long media bodies keep streaming afterwards
        let sent = tokio::time::timeout(self.upstream_timeout, request_builder.send()).await;
        let upstream = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!("request to {} failed: {}", req.target_url, e);
                return Err(Error::UpstreamUnreachable(format!("Request failed: {}", e)));
            }
            Err(_) => {
                error!(
                    "request to {} timed out after {:?}",
                    req.target_url, self.upstream_timeout
                );
                return Err(Error::UpstreamUnreachable(format!(
                    "Request timed out after {}s",
                    self.upstream_timeout.as_secs()
                )));
            }
        };

        let status = upstream.status();
        if !status.is_success() {
            // relayed like any other response, these sites put real content behind 4xx
            warn!("upstream {} answered {}", req.target_url, status);
        }

        let content_type = upstream
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let class = ContentClass::classify(&content_type, &req.target_url);
        debug!("content-type '{}' classified as {:?}", content_type, class);

        let mut response_headers = cors_headers();
        for name in FORWARDED_HEADERS {
            if let Some(value) = upstream.headers().get(name) {
                response_headers.insert(name.clone(), value.clone());
            }
        }

        let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);

        // partial text can't be rewritten without breaking its Content-Range
        if head_only || !class.is_text_like() || status == StatusCode::PARTIAL_CONTENT {
            if let Some(encoding) = upstream.headers().get(header::CONTENT_ENCODING) {
                response_headers.insert(header::CONTENT_ENCODING, encoding.clone());
            }

            let body = if head_only {
                Body::empty()
            } else {
                let target = req.target_url.clone();
                // headers are already out by now, a broken upstream can only cut the body short
                Body::from_stream(upstream.bytes_stream().inspect_err(move |e| {
                    warn!("stream from {} broke off: {}", target, e);
                }))
            };

            return Ok((status, response_headers, body).into_response());
        }

        let content_encoding = upstream
            .headers()
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // text is buffered whole before rewriting, so the read gets the same bound as the headers
        let raw = match tokio::time::timeout(self.upstream_timeout, upstream.bytes()).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                error!("failed to read body of {}: {}", req.target_url, e);
                return Err(Error::UpstreamUnreachable(format!(
                    "Failed to read response: {}",
                    e
                )));
            }
            Err(_) => {
                error!(
                    "body of {} not complete after {:?}",
                    req.target_url, self.upstream_timeout
                );
                return Err(Error::UpstreamUnreachable(format!(
                    "Response body timed out after {}s",
                    self.upstream_timeout.as_secs()
                )));
            }
        };
        debug!("read {} bytes from {}", raw.len(), req.target_url);

        let rewritten = self.rewrite_body(
            &raw,
            content_encoding.as_deref(),
            class,
            req,
            &referer,
            proxy_endpoint,
        );

        let body = match rewritten {
            Some(rewritten) => {
                response_headers.insert(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-cache"),
                );
                rewritten
            }
            None => {
                // relay the original bytes, encoding and all
                if let Some(encoding) = content_encoding
                    .as_deref()
                    .and_then(|e| HeaderValue::from_str(e).ok())
                {
                    response_headers.insert(header::CONTENT_ENCODING, encoding);
                }
                raw.to_vec()
            }
        };

        response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));

        Ok((status, response_headers, body).into_response())
    }

    /// rewritten body, or None when the bytes couldn't be decoded and go out unchanged
    fn rewrite_body(
        &self,
        raw: &[u8],
        content_encoding: Option<&str>,
        class: ContentClass,
        req: &ProxyRequest,
        referer: &str,
        proxy_endpoint: &str,
    ) -> Option<Vec<u8>> {
        let decoded = match decode_content(raw, content_encoding) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("could not decode {} ({}), relaying untouched", req.target_url, e);
                return None;
            }
        };

        let text = match String::from_utf8(decoded) {
            Ok(text) => text,
            Err(e) => {
                warn!("{} is not utf-8 ({}), relaying untouched", req.target_url, e);
                return None;
            }
        };

        let rewritten = match class {
            ContentClass::Html => {
                // links found in a page carry the page itself as their referer
                let ctx = RewriteContext::new(
                    req.target_url.clone(),
                    proxy_endpoint,
                    req.target_url.as_str(),
                );
                let shim = shim_utils::build_shim(&ShimParams {
                    proxy_endpoint: proxy_endpoint.to_string(),
                    original_referer: referer.to_string(),
                    target_origin: ctx.target_origin.clone(),
                    current_page_url: req.target_url.to_string(),
                });
                rewrite_utils::rewrite_html(&text, &ctx, &shim, SHIM_MARKER)
            }
            ContentClass::Manifest => {
                // segments are fetched by the same player that fetched the playlist
                let ctx = RewriteContext::new(req.target_url.clone(), proxy_endpoint, referer);
                rewrite_utils::rewrite_manifest(&text, &ctx)
            }
            ContentClass::Text => {
                let ctx = RewriteContext::new(req.target_url.clone(), proxy_endpoint, referer);
                rewrite_utils::rewrite_references(&text, &ctx)
            }
            ContentClass::Binary => return None,
        };

        debug!(
            "rewrote {:?} body of {} ({} -> {} bytes)",
            class,
            req.target_url,
            text.len(),
            rewritten.len()
        );

        Some(rewritten.into_bytes())
    }
}
