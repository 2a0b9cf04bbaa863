use url::Url;
use watchproxy::domain::proxy::{ContentClass, InvalidTarget, ProxyRequest};
use watchproxy::domain::source::ResolutionQuery;

#[test]
fn search_the_primary_title_first() {
    let query = ResolutionQuery::movie("Taşkafa").with_alternate_title("Taskafa: Stories of the Street");

    assert_eq!(
        query.search_terms(),
        vec!["Taşkafa".to_string(), "Taskafa: Stories of the Street".to_string()]
    );
}

#[test]
fn skip_blank_and_duplicate_alternate_titles() {
    assert_eq!(
        ResolutionQuery::movie("Baba").with_alternate_title("  ").search_terms(),
        vec!["Baba".to_string()]
    );
    assert_eq!(
        ResolutionQuery::movie("Baba").with_alternate_title("BABA").search_terms(),
        vec!["Baba".to_string()]
    );
}

#[test]
fn only_give_episode_coordinates_for_series() {
    assert_eq!(ResolutionQuery::series("Dizi", 2, 5).episode_coordinates(), Some((2, 5)));
    assert_eq!(ResolutionQuery::movie("Film").episode_coordinates(), None);

    let episode_only = ResolutionQuery {
        season: None,
        ..ResolutionQuery::series("Dizi", 1, 7)
    };
    assert_eq!(episode_only.episode_coordinates(), Some((1, 7)));
}

#[test]
fn share_cache_keys_across_case_and_whitespace() {
    assert_eq!(
        ResolutionQuery::movie(" Baba ").cache_key(),
        ResolutionQuery::movie("baba").cache_key()
    );
    assert_ne!(
        ResolutionQuery::series("Baba", 1, 1).cache_key(),
        ResolutionQuery::series("Baba", 1, 2).cache_key()
    );
}

#[test]
fn reject_invalid_proxy_targets() {
    assert_eq!(ProxyRequest::new("  ", None, None, None), Err(InvalidTarget::Missing));
    assert_eq!(
        ProxyRequest::new("/relative/path", None, None, None),
        Err(InvalidTarget::NotAbsolute("/relative/path".to_string()))
    );
    assert_eq!(
        ProxyRequest::new("ftp://files.example/a", None, None, None),
        Err(InvalidTarget::UnsupportedScheme("ftp".to_string()))
    );
}

#[test]
fn reject_overrides_that_cannot_be_sent_as_headers() {
    assert_eq!(
        ProxyRequest::new(
            "https://cdn.example.com/a.ts",
            Some("https://site.example/\nX-Injected: 1".to_string()),
            None,
            None,
        ),
        Err(InvalidTarget::InvalidHeader("referer"))
    );
    assert_eq!(
        ProxyRequest::new(
            "https://cdn.example.com/a.ts",
            None,
            Some("https://site.example\r".to_string()),
            None,
        ),
        Err(InvalidTarget::InvalidHeader("origin"))
    );
}

#[test]
fn drop_blank_overrides() {
    let request = ProxyRequest::new(
        "https://cdn.example.com/a.ts",
        Some("".to_string()),
        Some("https://site.example".to_string()),
        Some(" ".to_string()),
    )
    .unwrap();

    assert_eq!(request.referer_override, None);
    assert_eq!(request.origin_override.as_deref(), Some("https://site.example"));
    assert_eq!(request.range_header, None);
    assert_eq!(request.target_origin(), "https://cdn.example.com");
}

#[test]
fn classify_content() {
    let page = Url::parse("https://x.example/embed/1").unwrap();
    let playlist = Url::parse("https://x.example/hls/index.m3u8?token=1").unwrap();

    assert_eq!(ContentClass::classify("text/html; charset=utf-8", &page), ContentClass::Html);
    assert_eq!(
        ContentClass::classify("application/vnd.apple.mpegurl", &page),
        ContentClass::Manifest
    );
    assert_eq!(ContentClass::classify("text/plain", &playlist), ContentClass::Manifest);
    assert_eq!(ContentClass::classify("application/javascript", &page), ContentClass::Text);
    assert_eq!(ContentClass::classify("text/css", &page), ContentClass::Text);
    assert_eq!(ContentClass::classify("video/mp2t", &page), ContentClass::Binary);
    assert_eq!(ContentClass::classify("", &page), ContentClass::Binary);
    assert!(!ContentClass::Binary.is_text_like());
}
