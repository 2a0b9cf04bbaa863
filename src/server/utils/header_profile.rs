use reqwest::{RequestBuilder, header};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// br is left out on purpose, only gzip / deflate / zstd get decoded before rewriting
pub const ACCEPT_ENCODING: &str = "gzip, deflate, zstd";

/// which kind of request the headers should look like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// top level page load, e.g. search results or a watch page
    Document,
    /// anything a page pulls in itself (scripts, manifests, segments)
    Subresource,
}

/// canned set of headers that make outbound requests look like a real browser
#[derive(Debug, Clone)]
pub struct HeaderProfile {
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for HeaderProfile {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            accept_language: "tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
        }
    }
}

impl HeaderProfile {
    pub fn apply(
        &self,
        request_builder: RequestBuilder,
        kind: FetchKind,
        referer: Option<&str>,
        origin: Option<&str>,
    ) -> RequestBuilder {
        let mut request_builder = request_builder
            .header(header::USER_AGENT, &self.user_agent)
            .header(header::ACCEPT_LANGUAGE, &self.accept_language)
            .header(header::ACCEPT_ENCODING, ACCEPT_ENCODING)
            .header(header::PRAGMA, "no-cache")
            .header(header::CACHE_CONTROL, "no-cache");

        request_builder = match kind {
            FetchKind::Document => request_builder
                .header(
                    header::ACCEPT,
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                )
                .header("Sec-Fetch-Dest", "document")
                .header("Sec-Fetch-Mode", "navigate")
                .header("Sec-Fetch-Site", "same-origin")
                .header(header::UPGRADE_INSECURE_REQUESTS, "1"),
            FetchKind::Subresource => request_builder
                .header(header::ACCEPT, "*/*")
                .header("Sec-Fetch-Dest", "empty")
                .header("Sec-Fetch-Mode", "cors")
                .header("Sec-Fetch-Site", "cross-site"),
        };

        if let Some(referer) = referer {
            request_builder = request_builder.header(header::REFERER, referer);
        }

        if let Some(origin) = origin {
            request_builder = request_builder.header(header::ORIGIN, origin);
        }

        request_builder
    }
}
