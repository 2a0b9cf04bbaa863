use url::Url;
use watchproxy::domain::proxy::RewriteContext;
use watchproxy::server::utils::rewrite_utils::{
    absolutize, inject_into_head, rewrite_html, rewrite_manifest, rewrite_references, unwrap, wrap,
};

const ENDPOINT: &str = "https://proxy.test/api/v1/proxy";
const REFERER: &str = "https://site.example/";

fn ctx(target: &str) -> RewriteContext {
    RewriteContext::new(Url::parse(target).unwrap(), ENDPOINT, REFERER)
}

#[test]
fn rewrite_protocol_relative_image() {
    let out = rewrite_references(
        r#"<img src="//cdn.example.com/a.png">"#,
        &ctx("https://site.example/watch/1"),
    );

    assert_eq!(
        out,
        r#"<img src="https://proxy.test/api/v1/proxy?url=https%3A%2F%2Fcdn.example.com%2Fa.png&referer=https%3A%2F%2Fsite.example%2F">"#
    );
}

#[test]
fn resolve_relative_references_against_the_target() {
    let target = Url::parse("https://cdn.example.com/player/v2/index.html").unwrap();

    assert_eq!(
        absolutize("/static/app.js", &target).as_deref(),
        Some("https://cdn.example.com/static/app.js")
    );
    assert_eq!(
        absolutize("../img/logo.png", &target).as_deref(),
        Some("https://cdn.example.com/player/img/logo.png")
    );
    assert_eq!(
        absolutize("chunk.js?v=3", &target).as_deref(),
        Some("https://cdn.example.com/player/v2/chunk.js?v=3")
    );
    assert_eq!(
        absolutize("//other.example/x.js", &target).as_deref(),
        Some("https://other.example/x.js")
    );
    assert_eq!(absolutize("ws://live.example/socket", &target), None);
}

#[test]
fn leave_special_references_alone() {
    let html = concat!(
        r#"<img src="data:image/png;base64,AAAA">"#,
        r#"<video src="blob:https://site.example/123">"#,
        r#"<a href="javascript:void(0)">"#,
        r##"<a href="#top">"##,
        r#"<a href="mailto:a@b.c">"#,
        r#"<script src="{{ cdn }}/x.js">"#,
    );

    assert_eq!(rewrite_references(html, &ctx("https://site.example/")), html);
}

#[test]
fn never_wrap_twice() {
    let once = rewrite_references(
        r#"<script src="https://cdn.example.com/app.js"></script>"#,
        &ctx("https://site.example/"),
    );
    let twice = rewrite_references(&once, &ctx("https://site.example/"));

    assert_eq!(once, twice);
}

#[test]
fn rewrite_single_quotes_and_css_urls() {
    let out = rewrite_references(
        "<link href='/style.css'><div style=\"background: url(/bg.png)\"></div>",
        &ctx("https://site.example/page"),
    );

    assert!(out.contains(&format!(
        "href='{}'",
        wrap("https://site.example/style.css", ENDPOINT, REFERER)
    )));
    assert!(out.contains(&format!(
        "style=\"background: url({})\"",
        wrap("https://site.example/bg.png", ENDPOINT, REFERER)
    )));
}

#[test]
fn rewrite_segment_lines_but_not_comments() {
    let manifest = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nsegment001.ts\n#EXT-X-ENDLIST\n";
    let out = rewrite_manifest(manifest, &ctx("https://cdn.example.com/hls/index.m3u8"));
    let lines: Vec<&str> = out.split('\n').collect();

    assert_eq!(lines[0], "#EXTM3U");
    assert_eq!(lines[1], "#EXT-X-TARGETDURATION:6");
    assert_eq!(lines[2], "#EXTINF:6.0,");
    assert_eq!(
        lines[3],
        wrap("https://cdn.example.com/hls/segment001.ts", ENDPOINT, REFERER)
    );
    assert_eq!(lines[4], "#EXT-X-ENDLIST");
    assert!(out.ends_with('\n'));
}

#[test]
fn rewrite_key_uri_and_keep_carriage_returns() {
    let manifest = "#EXTM3U\r\n#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\r\nchunk-1.m4s?token=abc\r\n";
    let out = rewrite_manifest(manifest, &ctx("https://cdn.example.com/hls/index.m3u8"));
    let lines: Vec<&str> = out.split('\n').collect();

    assert_eq!(lines[0], "#EXTM3U\r");
    assert_eq!(
        lines[1],
        format!(
            "#EXT-X-KEY:METHOD=AES-128,URI=\"{}\"\r",
            wrap("https://cdn.example.com/hls/key.bin", ENDPOINT, REFERER)
        )
    );
    assert_eq!(
        lines[2],
        format!(
            "{}\r",
            wrap(
                "https://cdn.example.com/hls/chunk-1.m4s?token=abc",
                ENDPOINT,
                REFERER
            )
        )
    );
}

#[test]
fn leave_unknown_manifest_lines_untouched() {
    let manifest = "#EXTM3U\nnot-a-segment\n#EXT-X-PROGRAM-DATE-TIME:2024-01-01T00:00:00Z\n";
    let out = rewrite_manifest(manifest, &ctx("https://cdn.example.com/hls/index.m3u8"));

    assert_eq!(out, manifest);
}

#[test]
fn round_trip_wrap_and_unwrap() {
    let urls = [
        "https://cdn.example.com/a.png",
        "https://cdn.example.com/hls/seg.ts?token=a+b&exp=123#frag",
        "http://127.0.0.1:8080/path%20with%20space/x.m3u8",
        "https://site.example/dizi/ça%C4%9F/?sezon=1&bolum=2",
    ];

    for url in urls {
        let wrapped = wrap(url, ENDPOINT, REFERER);
        assert!(wrapped.starts_with(ENDPOINT));
        assert_eq!(unwrap(&wrapped).as_deref(), Some(url));
    }
}

#[test]
fn inject_the_shim_once() {
    let html = r#"<html><head><meta http-equiv="Content-Security-Policy" content="default-src 'self'"><base href="/old/"><title>x</title></head><body><img src="/a.png"></body></html>"#;
    let shim = "<script data-test-shim></script>";
    let ctx = ctx("https://cdn.example.com/embed/1");

    let once = rewrite_html(html, &ctx, shim, "data-test-shim");
    assert!(once.starts_with(
        "<html><head><base href=\"https://cdn.example.com/\"><script data-test-shim></script><title>"
    ));
    assert!(!once.contains("Content-Security-Policy"));
    assert!(!once.contains("/old/"));
    assert!(once.contains(&wrap("https://cdn.example.com/a.png", ENDPOINT, REFERER)));

    let twice = rewrite_html(&once, &ctx, shim, "data-test-shim");
    assert_eq!(twice, once);
    assert_eq!(twice.matches("data-test-shim").count(), 1);
}

#[test]
fn prepend_when_there_is_no_head() {
    assert_eq!(inject_into_head("<p>hi</p>", "<s>"), "<s><p>hi</p>");
    assert_eq!(
        inject_into_head("<HEAD lang=\"tr\"><title>", "<s>"),
        "<HEAD lang=\"tr\"><s><title>"
    );
    // <header> is not a head tag
    assert_eq!(inject_into_head("<header>x</header>", "<s>"), "<s><header>x</header>");
}
