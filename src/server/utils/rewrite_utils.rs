// turns every url a proxied response mentions into a link back through the proxy
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

use crate::domain::proxy::RewriteContext;

static DOUBLE_QUOTED_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(src|href)(\s*=\s*)"([^"]*)""#).expect("valid attribute regex")
});
static SINGLE_QUOTED_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(src|href)(\s*=\s*)'([^']*)'"#).expect("valid attribute regex")
});
static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\burl\(\s*(?:"([^"]*)"|'([^']*)'|([^'"()\s]+))\s*\)"#)
        .expect("valid css url regex")
});
static TAG_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"URI="([^"]*)""#).expect("valid manifest uri regex"));
static CSP_META: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta[^>]+http-equiv\s*=\s*["']?content-security-policy["']?[^>]*>"#)
        .expect("valid csp meta regex")
});
static BASE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<base\s[^>]*>").expect("valid base regex"));
static HEAD_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<head(\s[^>]*)?>").expect("valid head regex"));

const SKIPPED_PREFIXES: &[&str] = &["data:", "blob:", "javascript:", "about:", "mailto:", "#"];

// some hosts disguise hls segments as images, those are listed too
const SEGMENT_EXTENSIONS: &[&str] = &[
    "ts", "m4s", "m4a", "m4v", "mp4", "aac", "mp3", "vtt", "webvtt", "key", "m3u8", "cmfv",
    "cmfa", "jpg", "jpeg", "png",
];

// manifest tags whose URI attribute points at something the player will fetch
const URI_TAGS: &[&str] = &[
    "#EXT-X-KEY",
    "#EXT-X-MAP",
    "#EXT-X-MEDIA",
    "#EXT-X-I-FRAME-STREAM-INF",
];

/// references that must never go through the proxy
fn is_skipped(value: &str, proxy_endpoint: &str) -> bool {
    let lowered = value.to_ascii_lowercase();

    value.is_empty()
        || SKIPPED_PREFIXES.iter().any(|p| lowered.starts_with(p))
        || (!proxy_endpoint.is_empty() && value.starts_with(proxy_endpoint))
        || value.contains("{{")
        || value.contains("${")
}

/// resolves a reference found in a response against the page it was found in
///
/// `//host/x` becomes https, `/x` hangs off the target origin, everything else is relative to the
/// target url. returns None for references that are left alone
pub fn absolutize(raw: &str, target_url: &Url) -> Option<String> {
    let value = raw.trim();
    let lowered = value.to_ascii_lowercase();

    if value.is_empty() || SKIPPED_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
        return None;
    }

    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return Some(value.to_string());
    }

    if let Some(rest) = value.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }

    if value.starts_with('/') {
        return Some(format!(
            "{}{}",
            target_url.origin().ascii_serialization(),
            value
        ));
    }

    // a scheme we don't proxy (ws:, tel:, ...)
    if Url::parse(value).is_ok() {
        return None;
    }

    target_url.join(value).ok().map(|u| u.to_string())
}

/// `<endpoint>?url=<absolute>&referer=<referer>`, both percent encoded
pub fn wrap(absolute: &str, proxy_endpoint: &str, referer: &str) -> String {
    let mut link = format!("{}?url={}", proxy_endpoint, urlencoding::encode(absolute));

    if !referer.is_empty() {
        link.push_str("&referer=");
        link.push_str(&urlencoding::encode(referer));
    }

    link
}

/// pulls the target back out of a link produced by `wrap`
pub fn unwrap(proxy_url: &str) -> Option<String> {
    let (_, query) = proxy_url.split_once('?')?;

    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
}

/// absolutize + wrap in one go, None when the reference is left untouched
pub fn proxify(raw: &str, ctx: &RewriteContext) -> Option<String> {
    if is_skipped(raw.trim(), &ctx.proxy_endpoint) {
        return None;
    }

    absolutize(raw, &ctx.target_url).map(|absolute| wrap(&absolute, &ctx.proxy_endpoint, &ctx.referer))
}

/// rewrites `src="…"`, `href="…"` (either quote style) and css `url(…)`
pub fn rewrite_references(text: &str, ctx: &RewriteContext) -> String {
    let attr_replacer = |quote: char| {
        move |caps: &Captures| -> String {
            let value = &caps[3];
            match proxify(value, ctx) {
                Some(proxied) => format!("{}{}{}{}{}", &caps[1], &caps[2], quote, proxied, quote),
                None => caps[0].to_string(),
            }
        }
    };

    let rewritten = DOUBLE_QUOTED_ATTR.replace_all(text, attr_replacer('"'));
    let rewritten = SINGLE_QUOTED_ATTR.replace_all(&rewritten, attr_replacer('\''));

    CSS_URL
        .replace_all(&rewritten, |caps: &Captures| {
            // same quoting as found, an inline style attribute may already use double quotes
            let (value, quote) = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(m), _, _) => (m.as_str(), "\""),
                (_, Some(m), _) => (m.as_str(), "'"),
                (_, _, Some(m)) => (m.as_str(), ""),
                _ => return caps[0].to_string(),
            };

            match proxify(value, ctx) {
                Some(proxied) => format!("url({}{}{})", quote, proxied, quote),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn has_segment_extension(reference: &str) -> bool {
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);

    path.rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            !ext.contains('/') && SEGMENT_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn rewrite_manifest_line(line: &str, ctx: &RewriteContext) -> String {
    let (body, carriage) = match line.strip_suffix('\r') {
        Some(body) => (body, "\r"),
        None => (line, ""),
    };
    let trimmed = body.trim();

    if trimmed.is_empty() {
        return line.to_string();
    }

    if trimmed.starts_with('#') {
        if !URI_TAGS.iter().any(|tag| trimmed.starts_with(tag)) {
            return line.to_string();
        }

        let rewritten = TAG_URI.replace_all(body, |caps: &Captures| match proxify(&caps[1], ctx) {
            Some(proxied) => format!("URI=\"{}\"", proxied),
            None => caps[0].to_string(),
        });
        return format!("{}{}", rewritten, carriage);
    }

    if !has_segment_extension(trimmed) {
        return line.to_string();
    }

    match proxify(trimmed, ctx) {
        Some(proxied) => format!("{}{}", proxied, carriage),
        None => line.to_string(),
    }
}

/// rewrites every segment line of an hls playlist plus the uri of key / map / media tags, other
/// comment lines stay byte for byte the same
pub fn rewrite_manifest(text: &str, ctx: &RewriteContext) -> String {
    text.split('\n')
        .map(|line| rewrite_manifest_line(line, ctx))
        .collect::<Vec<_>>()
        .join("\n")
}

/// puts `snippet` right after the opening head tag, or in front of everything if there is none
pub fn inject_into_head(html: &str, snippet: &str) -> String {
    match HEAD_OPEN.find(html) {
        Some(head) => {
            let mut out = String::with_capacity(html.len() + snippet.len());
            out.push_str(&html[..head.end()]);
            out.push_str(snippet);
            out.push_str(&html[head.end()..]);
            out
        }
        None => format!("{}{}", snippet, html),
    }
}

/// full html treatment: csp meta and old base tags go, references get rewritten, then the base
/// tag and shim land at the top of head
pub fn rewrite_html(html: &str, ctx: &RewriteContext, shim: &str, shim_marker: &str) -> String {
    // already went through the proxy once
    if html.contains(shim_marker) {
        return html.to_string();
    }

    let without_csp = CSP_META.replace_all(html, "");
    let without_base = BASE_TAG.replace_all(&without_csp, "");
    let rewritten = rewrite_references(&without_base, ctx);

    let base_tag = format!("<base href=\"{}/\">", ctx.target_origin);
    inject_into_head(&rewritten, &format!("{}{}", base_tag, shim))
}
