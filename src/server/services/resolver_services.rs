// turns a title into a watch page on the tracked site, and that watch page into a player url
//
// search first (exact title match short circuits), then scoring over everything the search
// returned, then blind url-pattern probing. series get one more round of episode probing on top of
// whatever page was found. every single attempt is allowed to fail, only running out of attempts
// is an error
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use once_cell::sync::Lazy;
use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    domain::source::{ResolutionQuery, ResolvedSource, SearchCandidate},
    server::{
        error::{AppResult, Error},
        services::{
            extractor_services::PlayerExtractorService,
            resolution_cache_services::DynResolutionCacheService,
        },
        utils::{
            encoding_utils::response_text,
            header_profile::{FetchKind, HeaderProfile},
            slug_utils::{normalize, slugify},
        },
    },
};

pub type DynSourceResolver = Arc<dyn SourceResolverTrait + Send + Sync>;

/// best candidate has to beat this, otherwise the first search hit is used instead
pub const SCORE_THRESHOLD: f64 = 30.0;
pub const EXACT_MATCH_SCORE: f64 = 100.0;

// either of these in the body means the page has a player on it
const WATCH_PAGE_MARKERS: &[&str] = &["iframe", "player"];

static RESULT_CONTAINERS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "article, .movie-item, .film-item, .result-item, .search-result, .card, .poster, li.film",
    )
    .expect("valid container selector")
});
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));
static HEADING: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h1, h2, h3, h4, .title, .film-title, .movie-title")
        .expect("valid heading selector")
});
static IMAGE_ALT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[alt]").expect("valid image selector"));

#[automock]
#[async_trait]
pub trait SourceResolverTrait {
    /// watch page for the query, `Error::NotFound` once every search term and probe failed
    async fn resolve(&self, query: &ResolutionQuery) -> AppResult<ResolvedSource>;

    /// watch page plus the player url found on it, successful results are cached
    async fn resolve_with_stream(&self, query: &ResolutionQuery) -> AppResult<ResolvedSource>;
}

/// a located watch page, `body` is kept when probing already downloaded it
struct WatchPage {
    url: String,
    body: Option<String>,
}

pub struct SourceResolverService {
    http: reqwest::Client,
    profile: HeaderProfile,
    site: Url,
    extractor: Arc<PlayerExtractorService>,
    cache: DynResolutionCacheService,
    search_timeout: Duration,
    probe_timeout: Duration,
}

impl SourceResolverService {
    pub fn new(
        http: reqwest::Client,
        site: Url,
        extractor: Arc<PlayerExtractorService>,
        cache: DynResolutionCacheService,
        search_timeout: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            http,
            profile: HeaderProfile::default(),
            site,
            extractor,
            cache,
            search_timeout,
            probe_timeout,
        }
    }

    fn site_root(&self) -> String {
        self.site.origin().ascii_serialization()
    }

    async fn search(&self, term: &str) -> anyhow::Result<Vec<SearchCandidate>> {
        let referer = format!("{}/", self.site_root());
        let request = self.profile.apply(
            self.http.get(self.site.clone()).query(&[("s", term)]),
            FetchKind::Document,
            Some(&referer),
            None,
        );

        let response = request.timeout(self.search_timeout).send().await?;
        debug!("search for '{}' answered {}", term, response.status());

        // the results page shows up with odd statuses too, parse whatever came back
        let html = response_text(response).await?;

        Ok(parse_candidates(&html, &self.site))
    }

    /// single probe, None when the request failed or timed out
    async fn probe(&self, url: &str) -> Option<(StatusCode, String)> {
        let referer = format!("{}/", self.site_root());
        let request = self
            .profile
            .apply(self.http.get(url), FetchKind::Document, Some(&referer), None)
            .timeout(self.probe_timeout);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("probe {} failed: {}", url, e);
                return None;
            }
        };

        let status = response.status();
        match response_text(response).await {
            Ok(body) => Some((status, body)),
            Err(e) => {
                warn!("probe {} body failed: {}", url, e);
                None
            }
        }
    }

    async fn probe_watch_pages(&self, query: &ResolutionQuery) -> Option<(WatchPage, bool)> {
        let mut tried = HashSet::new();

        for term in query.search_terms() {
            let slug = slugify(&term);
            if slug.is_empty() {
                continue;
            }

            for pattern in watch_page_patterns(
                &self.site_root(),
                &slug,
                query.is_series,
                query.episode_coordinates(),
            ) {
                if !tried.insert(pattern.url.clone()) {
                    continue;
                }

                debug!("probing {}", pattern.url);
                if let Some((status, body)) = self.probe(&pattern.url).await {
                    if is_valid_watch_page(status, &body) {
                        info!("url pattern probe hit {} ({})", pattern.url, status);
                        return Some((
                            WatchPage {
                                url: pattern.url,
                                body: Some(body),
                            },
                            pattern.is_episode,
                        ));
                    }
                    debug!("probe {} rejected ({})", pattern.url, status);
                }
            }
        }

        None
    }

    async fn probe_episode(&self, base: WatchPage, season: u32, episode: u32) -> WatchPage {
        for variant in episode_variants(&self.site_root(), &base.url, season, episode) {
            debug!("probing episode variant {}", variant);
            if let Some((status, body)) = self.probe(&variant).await {
                if is_success_like(status, &body) {
                    info!("episode variant hit {} ({})", variant, status);
                    return WatchPage {
                        url: variant,
                        body: Some(body),
                    };
                }
            }
        }

        warn!(
            "no episode variant answered for s{}e{}, keeping {}",
            season, episode, base.url
        );
        base
    }

    async fn locate(&self, query: &ResolutionQuery) -> AppResult<WatchPage> {
        let terms = query.search_terms();
        if terms.is_empty() {
            return Err(Error::BadRequest("a title is required".to_string()));
        }

        let mut candidates: Vec<SearchCandidate> = Vec::new();
        let mut seen_links = HashSet::new();
        let mut found: Option<(WatchPage, bool)> = None;

        for term in &terms {
            let results = match self.search(term).await {
                Ok(results) => results,
                Err(e) => {
                    warn!("search for '{}' failed: {}", term, e);
                    continue;
                }
            };
            debug!("search for '{}' gave {} candidates", term, results.len());

            if let Some(hit) = exact_match(&results, term) {
                info!("exact title match for '{}': {}", term, hit.link);
                found = Some((
                    WatchPage {
                        url: hit.link,
                        body: None,
                    },
                    false,
                ));
                break;
            }

            for candidate in results {
                if seen_links.insert(candidate.link.clone()) {
                    candidates.push(candidate);
                }
            }
        }

        if found.is_none() {
            found = match pick_best(&candidates, &terms) {
                Some((best, value)) if value > SCORE_THRESHOLD => {
                    info!("best match '{}' scored {:.1}: {}", best.title, value, best.link);
                    Some((WatchPage { url: best.link, body: None }, false))
                }
                _ => candidates.first().map(|first| {
                    info!("no confident match, falling back to first result {}", first.link);
                    (
                        WatchPage {
                            url: first.link.clone(),
                            body: None,
                        },
                        false,
                    )
                }),
            };
        }

        if found.is_none() {
            debug!("search gave nothing, falling back to url pattern probing");
            found = self.probe_watch_pages(query).await;
        }

        let Some((page, is_episode_page)) = found else {
            return Err(Error::NotFound(format!(
                "no watch page found for '{}'",
                query.primary_title
            )));
        };

        match query.episode_coordinates() {
            Some((season, episode)) if !is_episode_page => {
                Ok(self.probe_episode(page, season, episode).await)
            }
            _ => Ok(page),
        }
    }

    async fn fetch_page(&self, url: &str) -> Option<String> {
        let referer = format!("{}/", self.site_root());
        let request = self
            .profile
            .apply(self.http.get(url), FetchKind::Document, Some(&referer), None)
            .timeout(self.search_timeout);

        match request.send().await {
            Ok(response) => response_text(response).await.ok(),
            Err(e) => {
                warn!("fetching watch page {} failed: {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl SourceResolverTrait for SourceResolverService {
    async fn resolve(&self, query: &ResolutionQuery) -> AppResult<ResolvedSource> {
        let page = self.locate(query).await?;
        Ok(ResolvedSource::new(page.url))
    }

    async fn resolve_with_stream(&self, query: &ResolutionQuery) -> AppResult<ResolvedSource> {
        let key = query.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let page = self.locate(query).await?;
        let mut source = ResolvedSource::new(page.url.clone());

        let body = match page.body {
            Some(body) => Some(body),
            None => self.fetch_page(&page.url).await,
        };

        let page_url = Url::parse(&page.url).ok();
        source.embedded_stream_url = match (body, page_url) {
            (Some(body), Some(page_url)) => self.extractor.extract_from_page(&body, &page_url),
            _ => None,
        };

        match &source.embedded_stream_url {
            Some(stream) => {
                info!("resolved '{}' to {}", query.primary_title, stream);
                self.cache.insert(&key, source.clone());
            }
            None => warn!("no player found on watch page {}", source.watch_page_url),
        }

        Ok(source)
    }
}

/// pulls result cards out of a search results page, in page order and unique by link
pub fn parse_candidates(html: &str, site: &Url) -> Vec<SearchCandidate> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for container in document.select(&RESULT_CONTAINERS) {
        let Some(anchor) = container_anchor(container) else {
            continue;
        };
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }

        let Ok(link) = site.join(href) else {
            continue;
        };
        if !matches!(link.scheme(), "http" | "https") {
            continue;
        }

        let Some(title) = candidate_title(container, anchor) else {
            continue;
        };

        let link = link.to_string();
        if seen.insert(link.clone()) {
            candidates.push(SearchCandidate::new(link, title));
        }
    }

    candidates
}

fn container_anchor(container: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if container.value().name() == "a" && container.value().attr("href").is_some() {
        return Some(container);
    }
    container.select(&ANCHOR).next()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// nested heading first, then the anchor's title attribute, then an image alt
fn candidate_title(container: ElementRef<'_>, anchor: ElementRef<'_>) -> Option<String> {
    let from_heading = container
        .select(&HEADING)
        .map(|h| collapse_whitespace(&h.text().collect::<String>()))
        .find(|t| !t.is_empty());

    from_heading
        .or_else(|| {
            anchor
                .value()
                .attr("title")
                .or_else(|| container.value().attr("title"))
                .map(collapse_whitespace)
                .filter(|t| !t.is_empty())
        })
        .or_else(|| {
            container
                .select(&IMAGE_ALT)
                .filter_map(|img| img.value().attr("alt"))
                .map(collapse_whitespace)
                .find(|t| !t.is_empty())
        })
}

/// first candidate whose normalized title equals the normalized term
pub fn exact_match(candidates: &[SearchCandidate], term: &str) -> Option<SearchCandidate> {
    let wanted = normalize(term);
    if wanted.is_empty() {
        return None;
    }

    candidates
        .iter()
        .find(|c| normalize(&c.title) == wanted)
        .cloned()
}

/// similarity of two already normalized titles
///
/// equal is 100, a candidate containing the term scores `len(term) / len(candidate) * 100`, a term
/// containing the candidate scores `len(candidate) / len(term) * 80`, anything else is 0
pub fn score(term: &str, candidate: &str) -> f64 {
    if term.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    if term == candidate {
        return EXACT_MATCH_SCORE;
    }

    let term_len = term.chars().count() as f64;
    let candidate_len = candidate.chars().count() as f64;

    if candidate.contains(term) {
        (term_len / candidate_len) * 100.0
    } else if term.contains(candidate) {
        (candidate_len / term_len) * 80.0
    } else {
        0.0
    }
}

/// highest scoring candidate over every (term, candidate) pair, an exact match returns right away
/// and ties go to whichever was seen first
pub fn pick_best(candidates: &[SearchCandidate], terms: &[String]) -> Option<(SearchCandidate, f64)> {
    let mut best: Option<(&SearchCandidate, f64)> = None;

    for term in terms {
        let term = normalize(term);

        for candidate in candidates {
            let value = score(&term, &normalize(&candidate.title));

            if value >= EXACT_MATCH_SCORE {
                return Some((candidate.clone(), value));
            }

            if best.is_none_or(|(_, top)| value > top) {
                best = Some((candidate, value));
            }
        }
    }

    best.map(|(candidate, value)| (candidate.clone(), value))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeUrl {
    pub url: String,
    /// already points at the requested episode, no episode probing needed afterwards
    pub is_episode: bool,
}

/// guessed watch page urls in the order they get probed
pub fn watch_page_patterns(
    site_root: &str,
    slug: &str,
    is_series: bool,
    episode: Option<(u32, u32)>,
) -> Vec<ProbeUrl> {
    let root = site_root.trim_end_matches('/');
    let page = |url: String| ProbeUrl {
        url,
        is_episode: false,
    };

    if !is_series {
        return vec![
            page(format!("{root}/film/{slug}/")),
            page(format!("{root}/{slug}/")),
            page(format!("{root}/{slug}-izle/")),
            page(format!("{root}/movie/{slug}/")),
        ];
    }

    let mut patterns = Vec::new();

    if let Some((season, ep)) = episode {
        patterns.push(ProbeUrl {
            url: format!("{root}/dizi/{slug}/sezon-{season}/bolum-{ep}/"),
            is_episode: true,
        });
        patterns.push(ProbeUrl {
            url: format!("{root}/{slug}-{season}-sezon-{ep}-bolum-izle/"),
            is_episode: true,
        });
    }

    patterns.push(page(format!("{root}/dizi/{slug}/")));
    patterns.push(page(format!("{root}/series/{slug}/")));
    patterns.push(page(format!("{root}/{slug}/")));

    patterns
}

/// episode specific variants of a series page, in probe order
pub fn episode_variants(site_root: &str, base_page: &str, season: u32, episode: u32) -> Vec<String> {
    let root = site_root.trim_end_matches('/');
    let (base_without_query, _) = base_page.split_once('?').unwrap_or((base_page, ""));
    let base = base_without_query.trim_end_matches('/');

    let slug = base
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .trim_end_matches("-izle");

    vec![
        format!("{base}/?sezon={season}&bolum={episode}"),
        format!("{base}/sezon-{season}/bolum-{episode}/"),
        format!("{root}/bolum/{slug}-{season}-sezon-{episode}-bolum/"),
        format!("{root}/episode/{slug}-season-{season}-episode-{episode}/"),
    ]
}

fn has_watch_page_marker(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    WATCH_PAGE_MARKERS.iter().any(|m| lowered.contains(m))
}

/// the site answers 404 for some real pages, so 404 counts as long as the body has a player
pub fn is_valid_watch_page(status: StatusCode, body: &str) -> bool {
    (status.is_success() || status == StatusCode::NOT_FOUND) && has_watch_page_marker(body)
}

/// any 2xx, or the site's 404-with-content quirk
pub fn is_success_like(status: StatusCode, body: &str) -> bool {
    status.is_success() || (status == StatusCode::NOT_FOUND && has_watch_page_marker(body))
}
