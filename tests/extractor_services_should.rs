use url::Url;
use watchproxy::config::DEFAULT_PLAYER_DOMAINS;
use watchproxy::server::services::extractor_services::{
    PlayerExtractorService, normalize_player_url,
};

fn extractor() -> PlayerExtractorService {
    let domains: Vec<String> = DEFAULT_PLAYER_DOMAINS.iter().map(|d| d.to_string()).collect();
    PlayerExtractorService::new(&domains).unwrap()
}

#[test]
fn read_the_embedded_let_array() {
    let html = r#"<script>let sources = ["<iframe src=\"https:\/\/cdn.other.net\/embed\/1\" allowfullscreen><\/iframe>"];</script>"#;

    assert_eq!(
        extractor().extract(html).as_deref(),
        Some("https://cdn.other.net/embed/1?ap=1")
    );
}

#[test]
fn prefer_the_let_array_over_known_domains() {
    let html = r#"
        <a href="https://vidmoly.to/embed-zzz.html">mirror</a>
        <script>let x = ['<iframe src="https://rapidvid.net/vod/abc"></iframe>'];</script>
    "#;

    assert_eq!(
        extractor().extract(html).as_deref(),
        Some("https://rapidvid.net/vod/abc?ap=1")
    );
}

#[test]
fn find_absolute_player_domain_urls() {
    let html = r#"<div class="tabs"><span data-x="https://www.closeload.top/video/embed/99/">x</span></div>"#;

    assert_eq!(
        extractor().extract(html).as_deref(),
        Some("https://www.closeload.top/video/embed/99/?ap=1")
    );
}

#[test]
fn not_match_lookalike_domains() {
    let html = r#"<a href="https://vidmoly.toolbox.example/x">no</a>"#;

    assert_eq!(extractor().extract(html), None);
}

#[test]
fn upgrade_protocol_relative_player_urls() {
    let html = r#"<script>var p = '//vidmoly.to/embed-abc.html';</script>"#;

    assert_eq!(
        extractor().extract(html).as_deref(),
        Some("https://vidmoly.to/embed-abc.html?ap=1")
    );
}

#[test]
fn accept_iframes_with_player_looking_sources() {
    let html = r#"<iframe src="about:blank"></iframe><iframe data-src="https://stream.example/embed/77"></iframe>"#;

    assert_eq!(
        extractor().extract(html).as_deref(),
        Some("https://stream.example/embed/77?ap=1")
    );
}

#[test]
fn ignore_unrelated_iframes() {
    let html = r#"<iframe src="https://ads.example/banner"></iframe>"#;

    assert_eq!(extractor().extract(html), None);
}

#[test]
fn fall_back_to_data_attributes() {
    let html = r#"<div class="video" data-player="https://media.example/v/9"></div>"#;

    assert_eq!(
        extractor().extract(html).as_deref(),
        Some("https://media.example/v/9?ap=1")
    );
}

#[test]
fn find_nothing_on_plain_pages() {
    assert_eq!(extractor().extract(""), None);
    assert_eq!(
        extractor().extract("<html><body><p>no video here</p></body></html>"),
        None
    );
}

#[test]
fn resolve_relative_results_against_the_page() {
    let page = Url::parse("https://site.example/film/baba/").unwrap();
    let html = r#"<iframe src="/player/embed/5"></iframe>"#;

    assert_eq!(
        extractor().extract_from_page(html, &page).as_deref(),
        Some("https://site.example/player/embed/5?ap=1")
    );
}

#[test]
fn work_without_player_domains() {
    let extractor = PlayerExtractorService::new(&[]).unwrap();

    assert_eq!(
        extractor.extract(r#"<a href="https://vidmoly.to/embed-1.html">x</a>"#),
        None
    );
    assert_eq!(
        extractor
            .extract(r#"<iframe src="https://vidmoly.to/embed-1.html"></iframe>"#)
            .as_deref(),
        Some("https://vidmoly.to/embed-1.html?ap=1")
    );
}

#[test]
fn normalize_player_urls() {
    assert_eq!(
        normalize_player_url("//x.example/e?id=1&amp;t=2#start"),
        "https://x.example/e?id=1&t=2&ap=1#start"
    );
    assert_eq!(
        normalize_player_url(r"https:\/\/x.example\/e"),
        "https://x.example/e?ap=1"
    );
    assert_eq!(
        normalize_player_url("https://x.example/e?ap=1"),
        "https://x.example/e?ap=1"
    );
}
