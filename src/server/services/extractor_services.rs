// finds the embedded player url on a watch page. the heuristics run in a fixed order and the first
// one that finds something wins, nothing in here can fail on bad markup, it just finds nothing
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

static LET_ARRAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\blet\s+[A-Za-z_$][\w$]*\s*=\s*\[(.*?)\]\s*;").expect("valid let regex")
});
static SRC_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid src regex")
});
static DATA_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)["']?\b(?:data-player|data-embed|embed[-_]?url|player[-_]?url|video[-_]?src)["']?\s*[:=]\s*["']([^"']+)["']"#,
    )
    .expect("valid data attribute regex")
});
static IFRAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("iframe").expect("valid iframe selector"));

// generic words a player iframe url tends to contain, on top of the player domains themselves
const GENERIC_PLAYER_TERMS: &[&str] = &["embed", "player", "rapid"];

const AP_MARKER: &str = "ap=1";

pub struct PlayerExtractorService {
    absolute_domain_url: Regex,
    protocol_relative_domain_url: Regex,
    allow_list: Vec<String>,
}

impl PlayerExtractorService {
    pub fn new(player_domains: &[String]) -> anyhow::Result<Self> {
        let domains: Vec<String> = player_domains
            .iter()
            .map(|d| d.trim().trim_start_matches("www.").to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        // no domains configured means these two heuristics never match
        let alternation = if domains.is_empty() {
            r"[^\s\S]".to_string()
        } else {
            domains
                .iter()
                .map(|d| regex::escape(d))
                .collect::<Vec<_>>()
                .join("|")
        };

        let tail = r#"\b(?:[:/?#][^\s"'<>\\]*)?"#;

        let absolute_domain_url = Regex::new(&format!(
            r"(?i)https?://(?:[a-z0-9-]+\.)*(?:{}){}",
            alternation, tail
        ))
        .context("failed to build player domain regex")?;

        let protocol_relative_domain_url = Regex::new(&format!(
            r"(?i)(?:^|[^:\w/])(//(?:[a-z0-9-]+\.)*(?:{}){})",
            alternation, tail
        ))
        .context("failed to build protocol relative player domain regex")?;

        // full domain plus its first label, `vidmoly.to` also lets `vidmoly.net` through
        let mut allow_list: Vec<String> = Vec::new();
        for domain in &domains {
            allow_list.push(domain.clone());
            if let Some((label, _)) = domain.split_once('.') {
                if !allow_list.iter().any(|a| a == label) {
                    allow_list.push(label.to_string());
                }
            }
        }
        allow_list.extend(GENERIC_PLAYER_TERMS.iter().map(|t| t.to_string()));

        Ok(Self {
            absolute_domain_url,
            protocol_relative_domain_url,
            allow_list,
        })
    }

    /// runs every heuristic in priority order, the url comes back normalized
    pub fn extract(&self, html: &str) -> Option<String> {
        let found = Self::from_let_array(html)
            .inspect(|_| debug!("player url found in embedded let declaration"))
            .or_else(|| {
                self.from_absolute_domain(html)
                    .inspect(|_| debug!("player url found by known domain"))
            })
            .or_else(|| {
                self.from_protocol_relative_domain(html)
                    .inspect(|_| debug!("player url found by protocol relative domain"))
            })
            .or_else(|| {
                self.from_iframes(html)
                    .inspect(|_| debug!("player url found in iframe element"))
            })
            .or_else(|| {
                Self::from_data_attributes(html)
                    .inspect(|_| debug!("player url found in data attribute"))
            })?;

        Some(normalize_player_url(&found))
    }

    /// same as `extract` but relative results get resolved against the watch page
    pub fn extract_from_page(&self, html: &str, page_url: &Url) -> Option<String> {
        let extracted = self.extract(html)?;

        if extracted.starts_with("http://") || extracted.starts_with("https://") {
            return Some(extracted);
        }

        page_url.join(&extracted).ok().map(|u| u.to_string())
    }

    fn from_let_array(html: &str) -> Option<String> {
        LET_ARRAY.captures_iter(html).find_map(|caps| {
            let unescaped = caps[1]
                .replace("\\\"", "\"")
                .replace("\\'", "'")
                .replace("\\/", "/")
                .replace("\\\\", "\\");

            SRC_ATTR
                .captures(&unescaped)
                .map(|src| src[1].trim().to_string())
                .filter(|src| !src.is_empty())
        })
    }

    fn from_absolute_domain(&self, html: &str) -> Option<String> {
        self.absolute_domain_url
            .find(html)
            .map(|m| m.as_str().to_string())
    }

    fn from_protocol_relative_domain(&self, html: &str) -> Option<String> {
        self.protocol_relative_domain_url
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| format!("https:{}", m.as_str()))
    }

    fn from_iframes(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);

        document.select(&IFRAME).find_map(|iframe| {
            ["src", "data-src"].iter().find_map(|attr| {
                let value = iframe.value().attr(attr)?.trim();
                let lowered = value.to_lowercase();

                if value.is_empty() || lowered.starts_with("about:") {
                    return None;
                }

                self.allow_list
                    .iter()
                    .any(|allowed| lowered.contains(allowed.as_str()))
                    .then(|| value.to_string())
            })
        })
    }

    fn from_data_attributes(html: &str) -> Option<String> {
        DATA_ATTR
            .captures_iter(html)
            .map(|caps| caps[1].trim().to_string())
            .find(|value| !value.is_empty() && !value.starts_with('#'))
    }
}

/// `//host` -> `https://host`, entities decoded, `ap=1` appended so our own repeat requests can be
/// told apart from the page's traffic
pub fn normalize_player_url(raw: &str) -> String {
    let mut url = raw.trim().replace("&amp;", "&").replace("\\/", "/");

    if url.starts_with("//") {
        url = format!("https:{}", url);
    }

    let (without_fragment, fragment) = match url.split_once('#') {
        Some((head, tail)) => (head.to_string(), Some(tail.to_string())),
        None => (url.clone(), None),
    };

    let has_marker = without_fragment
        .split_once('?')
        .map(|(_, query)| query.split('&').any(|pair| pair == AP_MARKER))
        .unwrap_or(false);

    if has_marker {
        return url;
    }

    let separator = if without_fragment.contains('?') { '&' } else { '?' };
    let mut normalized = format!("{}{}{}", without_fragment, separator, AP_MARKER);

    if let Some(fragment) = fragment {
        normalized.push('#');
        normalized.push_str(&fragment);
    }

    normalized
}
