use std::time::Duration;

use watchproxy::domain::source::ResolvedSource;
use watchproxy::server::services::resolution_cache_services::{
    ResolutionCacheService, ResolutionCacheServiceTrait,
};

fn source(page: &str) -> ResolvedSource {
    ResolvedSource {
        watch_page_url: page.to_string(),
        embedded_stream_url: Some(format!("{}/player", page)),
    }
}

#[test]
fn return_what_was_inserted() {
    let cache = ResolutionCacheService::new(4, Duration::from_secs(60));
    cache.insert("baba", source("https://site.example/film/baba"));

    assert_eq!(cache.get("baba"), Some(source("https://site.example/film/baba")));
    assert_eq!(cache.get("missing"), None);
    assert_eq!(cache.len(), 1);
}

#[test]
fn evict_the_oldest_entry_first() {
    let cache = ResolutionCacheService::new(2, Duration::from_secs(60));
    cache.insert("a", source("https://a"));
    cache.insert("b", source("https://b"));
    cache.insert("c", source("https://c"));

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("a"), None);
    assert!(cache.get("b").is_some());
    assert!(cache.get("c").is_some());
}

#[test]
fn replace_existing_keys_without_evicting() {
    let cache = ResolutionCacheService::new(2, Duration::from_secs(60));
    cache.insert("a", source("https://a"));
    cache.insert("b", source("https://b"));
    cache.insert("a", source("https://a2"));

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("a"), Some(source("https://a2")));
    assert!(cache.get("b").is_some());
}

#[test]
fn expire_entries_after_the_ttl() {
    let cache = ResolutionCacheService::new(4, Duration::from_millis(20));
    cache.insert("a", source("https://a"));

    std::thread::sleep(Duration::from_millis(60));

    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.len(), 0);
}

#[test]
fn store_nothing_with_zero_capacity() {
    let cache = ResolutionCacheService::new(0, Duration::from_secs(60));
    cache.insert("a", source("https://a"));

    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.capacity(), 0);
}

#[test]
fn clear_everything() {
    let cache = ResolutionCacheService::new(4, Duration::from_secs(60));
    cache.insert("a", source("https://a"));
    cache.insert("b", source("https://b"));
    cache.clear();

    assert_eq!(cache.len(), 0);
    assert_eq!(cache.get("a"), None);
}

#[test]
fn stay_bounded_under_concurrent_inserts() {
    let cache = std::sync::Arc::new(ResolutionCacheService::new(8, Duration::from_secs(60)));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    let key = format!("{}-{}", t, i);
                    cache.insert(&key, source(&format!("https://{}", key)));
                    cache.get(&key);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(cache.len() <= 8);
}
