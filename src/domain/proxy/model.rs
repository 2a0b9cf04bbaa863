use axum::http::HeaderValue;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidTarget {
    #[error("missing target url")]
    Missing,
    #[error("target url is not absolute: {0}")]
    NotAbsolute(String),
    #[error("unsupported scheme '{0}', only http and https can be proxied")]
    UnsupportedScheme(String),
    #[error("{0} is not a valid header value")]
    InvalidHeader(&'static str),
}

/// a single resource the client wants fetched on its behalf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub target_url: Url,
    pub referer_override: Option<String>,
    pub origin_override: Option<String>,
    pub range_header: Option<String>,
}

impl ProxyRequest {
    pub fn new(
        target: &str,
        referer_override: Option<String>,
        origin_override: Option<String>,
        range_header: Option<String>,
    ) -> Result<Self, InvalidTarget> {
        let target = target.trim();
        if target.is_empty() {
            return Err(InvalidTarget::Missing);
        }

        let target_url =
            Url::parse(target).map_err(|_| InvalidTarget::NotAbsolute(target.to_string()))?;

        match target_url.scheme() {
            "http" | "https" => {}
            other => return Err(InvalidTarget::UnsupportedScheme(other.to_string())),
        }

        if target_url.host_str().is_none_or(str::is_empty) {
            return Err(InvalidTarget::NotAbsolute(target.to_string()));
        }

        // blank overrides are the same as no override
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let referer_override = non_blank(referer_override);
        let origin_override = non_blank(origin_override);
        let range_header = non_blank(range_header);

        // these go out as request headers, so control characters fail here instead of in the client
        for (name, value) in [
            ("referer", &referer_override),
            ("origin", &origin_override),
            ("range", &range_header),
        ] {
            if value
                .as_deref()
                .is_some_and(|v| HeaderValue::from_str(v).is_err())
            {
                return Err(InvalidTarget::InvalidHeader(name));
            }
        }

        Ok(Self {
            target_url,
            referer_override,
            origin_override,
            range_header,
        })
    }

    /// scheme + host (+ port), e.g. `https://cdn.example.com`
    pub fn target_origin(&self) -> String {
        self.target_url.origin().ascii_serialization()
    }
}

/// everything needed to turn a url found inside a response into a proxy link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteContext {
    pub target_url: Url,
    pub target_origin: String,
    /// full address of the proxy route, e.g. `https://edge.example.com/api/v1/proxy`
    pub proxy_endpoint: String,
    /// referer attached to every link produced while rewriting this response
    pub referer: String,
}

impl RewriteContext {
    pub fn new(target_url: Url, proxy_endpoint: impl Into<String>, referer: impl Into<String>) -> Self {
        Self {
            target_origin: target_url.origin().ascii_serialization(),
            target_url,
            proxy_endpoint: proxy_endpoint.into(),
            referer: referer.into(),
        }
    }
}

/// how a proxied response body gets treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    /// rewritten, plus the base tag and client shim
    Html,
    /// rewritten, plus every segment line
    Manifest,
    /// scripts, stylesheets, json, plain text; attribute and css url rewriting only
    Text,
    /// streamed through untouched
    Binary,
}

impl ContentClass {
    pub fn classify(content_type: &str, target_url: &Url) -> Self {
        let content_type = content_type.to_ascii_lowercase();

        if content_type.contains("mpegurl") || target_url.path().ends_with(".m3u8") {
            return Self::Manifest;
        }

        if content_type.contains("text/html") || content_type.contains("application/xhtml") {
            return Self::Html;
        }

        if content_type.starts_with("text/")
            || content_type.contains("javascript")
            || content_type.contains("json")
        {
            return Self::Text;
        }

        Self::Binary
    }

    pub fn is_text_like(self) -> bool {
        !matches!(self, Self::Binary)
    }
}
