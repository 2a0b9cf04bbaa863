use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tracing::info;
use url::Url;

use crate::config::AppConfig;

use super::{
    extractor_services::PlayerExtractorService,
    proxy_services::{ProxyService, RefererRule},
    resolution_cache_services::{DynResolutionCacheService, ResolutionCacheService},
    resolver_services::{DynSourceResolver, SourceResolverService},
};

/// everything the handlers need, handed to them through an `Extension`
#[derive(Clone)]
pub struct AppServices {
    pub resolver: DynSourceResolver,
    pub proxy: Arc<ProxyService>,
    pub cache: DynResolutionCacheService,
    pub config: Arc<AppConfig>,
}

impl AppServices {
    pub fn new(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        info!("starting app services...");

        let site = Url::parse(&config.site_url)
            .with_context(|| format!("SITE_URL '{}' is not a valid url", config.site_url))?;

        // one client for search, probes and the proxy so the connection pool is shared
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .connect_timeout(Duration::from_secs(config.upstream_timeout_secs))
            // idle bound per read, a stalled stream errors out but a long one keeps going
            .read_timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()
            .context("failed to build http client")?;

        let player_domains = config.player_domains();
        info!("known player domains: {}", player_domains.join(", "));

        let extractor = Arc::new(PlayerExtractorService::new(&player_domains)?);

        let cache = Arc::new(ResolutionCacheService::new(
            config.cache_capacity,
            Duration::from_secs(config.cache_ttl_secs),
        )) as DynResolutionCacheService;

        info!("extractor and cache ok, starting resolver and proxy...");

        let resolver = Arc::new(SourceResolverService::new(
            http.clone(),
            site,
            extractor,
            cache.clone(),
            Duration::from_secs(config.upstream_timeout_secs),
            Duration::from_secs(config.probe_timeout_secs),
        )) as DynSourceResolver;

        let rules = player_domains
            .iter()
            .map(|d| RefererRule::for_player_domain(d))
            .collect();

        let proxy = Arc::new(ProxyService::new(
            http,
            config.site_origin(),
            rules,
            Duration::from_secs(config.upstream_timeout_secs),
        ));

        Ok(Self {
            resolver,
            proxy,
            cache,
            config,
        })
    }

    /// same services with a different resolver, lets tests swap in a mock
    pub fn with_resolver(mut self, resolver: DynSourceResolver) -> Self {
        self.resolver = resolver;
        self
    }
}
