use serde::Deserialize;

/// raw query of a proxy call, `url` is checked and decoded by the `ProxyTarget` extractor
#[derive(Debug, Default, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
    pub referer: Option<String>,
    pub origin: Option<String>,
}
