use serde::{Deserialize, Serialize};

/// one hit scraped from the site's search results page
///
/// candidates are kept in the order the results page lists them, two candidates with the same
/// link are the same candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub link: String,
    pub title: String,
}

impl SearchCandidate {
    pub fn new(link: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            title: title.into(),
        }
    }
}

/// what the frontend asked for, never mutated once built
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionQuery {
    pub primary_title: String,
    pub alternate_title: Option<String>,
    pub is_series: bool,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl ResolutionQuery {
    pub fn movie(title: impl Into<String>) -> Self {
        Self {
            primary_title: title.into(),
            alternate_title: None,
            is_series: false,
            season: None,
            episode: None,
        }
    }

    pub fn series(title: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            primary_title: title.into(),
            alternate_title: None,
            is_series: true,
            season: Some(season),
            episode: Some(episode),
        }
    }

    pub fn with_alternate_title(mut self, alternate: impl Into<String>) -> Self {
        self.alternate_title = Some(alternate.into());
        self
    }

    /// primary title first, alternate only when it's actually different
    pub fn search_terms(&self) -> Vec<String> {
        let mut terms = Vec::with_capacity(2);

        let primary = self.primary_title.trim();
        if !primary.is_empty() {
            terms.push(primary.to_string());
        }

        if let Some(alternate) = self.alternate_title.as_deref().map(str::trim) {
            if !alternate.is_empty() && !terms.iter().any(|t| t.eq_ignore_ascii_case(alternate)) {
                terms.push(alternate.to_string());
            }
        }

        terms
    }

    /// season and episode, only when both are known and this is a series
    pub fn episode_coordinates(&self) -> Option<(u32, u32)> {
        if !self.is_series {
            return None;
        }

        match (self.season, self.episode) {
            (Some(season), Some(episode)) => Some((season, episode)),
            (None, Some(episode)) => Some((1, episode)),
            _ => None,
        }
    }

    /// key used by the resolution cache, folds case and surrounding whitespace so the same title
    /// typed slightly differently still hits
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.primary_title.trim().to_lowercase(),
            self.alternate_title
                .as_deref()
                .map(|t| t.trim().to_lowercase())
                .unwrap_or_default(),
            self.is_series,
            self.season.map(|s| s.to_string()).unwrap_or_default(),
            self.episode.map(|e| e.to_string()).unwrap_or_default(),
        )
    }
}

/// result of a resolution, `embedded_stream_url` stays empty until the extractor found a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSource {
    pub watch_page_url: String,
    pub embedded_stream_url: Option<String>,
}

impl ResolvedSource {
    pub fn new(watch_page_url: impl Into<String>) -> Self {
        Self {
            watch_page_url: watch_page_url.into(),
            embedded_stream_url: None,
        }
    }
}
