use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::domain::source::{ResolutionQuery, ResolvedSource};

// media types the frontend uses for anything episodic
const SERIES_TYPES: &[&str] = &["series", "tv", "dizi", "show"];

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("title must not be blank".into()));
    }
    Ok(())
}

/// same fields for the query string and the json body
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ResolveRequest {
    #[serde(default)]
    pub site: Option<String>,

    #[serde(default, alias = "slug")]
    #[validate(length(min = 1, max = 300), custom(function = "not_blank"))]
    pub title: String,

    #[serde(default, alias = "originalTitle")]
    #[validate(length(max = 300))]
    pub original_title: Option<String>,

    #[serde(default)]
    #[validate(range(min = 1, max = 1000))]
    pub season: Option<u32>,

    #[serde(default)]
    #[validate(range(min = 1, max = 10000))]
    pub episode: Option<u32>,

    #[serde(default, rename = "type", alias = "mediaType")]
    pub media_type: Option<String>,
}

impl ResolveRequest {
    /// a season or episode on its own is enough to treat the title as a series
    pub fn is_series(&self) -> bool {
        let typed_series = self
            .media_type
            .as_deref()
            .map(|t| SERIES_TYPES.contains(&t.trim().to_lowercase().as_str()))
            .unwrap_or(false);

        typed_series || self.season.is_some() || self.episode.is_some()
    }

    pub fn into_query(self) -> ResolutionQuery {
        let is_series = self.is_series();

        ResolutionQuery {
            primary_title: self.title.trim().to_string(),
            alternate_title: self
                .original_title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            is_series,
            season: self.season.filter(|_| is_series),
            episode: self.episode.filter(|_| is_series),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie_page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolveResponse {
    /// player found, `proxy_url` is the player wrapped in a proxy link
    pub fn found(source: ResolvedSource, stream_url: String, proxy_url: String) -> Self {
        Self {
            success: true,
            url: Some(stream_url),
            proxy_url: Some(proxy_url),
            movie_page: Some(source.watch_page_url),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, movie_page: Option<String>) -> Self {
        Self {
            success: false,
            url: None,
            proxy_url: None,
            movie_page,
            error: Some(error.into()),
        }
    }
}
