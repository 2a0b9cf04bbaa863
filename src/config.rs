#[derive(clap::ValueEnum, Clone, Debug, Copy)]
pub enum CargoEnv {
    Development,
    Production,
}

/// player hosts the extractor knows about, also used to pick spoofed referers
pub const DEFAULT_PLAYER_DOMAINS: &[&str] = &[
    "rapidvid.net",
    "vidmoly.to",
    "closeload.top",
    "hdplayersystem.live",
    "dzen.ru",
];

#[derive(clap::Parser, Clone, Debug)]
pub struct AppConfig {
    // production or development
    #[clap(long, env, value_enum)]
    pub cargo_env: CargoEnv,

    // port that the app will bind to
    #[clap(long, env, default_value = "5000")]
    pub port: u16,

    // the site that gets searched and probed for watch pages, e.g. https://www.example-films.com
    #[clap(long, env)]
    pub site_url: String,

    // name the frontend sends in the `site` field of a resolve call
    #[clap(long, env, default_value = "primary")]
    pub site_name: String,

    // address this service is reachable at from the client. if it's not set the proxy links are
    // built from the Host / X-Forwarded-Proto of each request
    #[clap(long, env)]
    pub public_url: Option<String>,

    // this should be either * for allowing everything, or a comma seperated list of domains like
    // example.com,something.com
    // only applies to the json routes, the proxy is always wide open
    #[clap(long, env, default_value = "*")]
    pub cors_origin: String,

    // time we wait for upstream headers on search and proxy fetches
    #[clap(long, env, default_value = "8")]
    pub upstream_timeout_secs: u64,

    // time per url-pattern / episode probe, keep it short the site is slow to fail
    #[clap(long, env, default_value = "4")]
    pub probe_timeout_secs: u64,

    #[clap(long, env, default_value = "5")]
    pub max_redirects: usize,

    // 0 turns the resolution cache off
    #[clap(long, env, default_value = "256")]
    pub cache_capacity: usize,

    #[clap(long, env, default_value = "1800")]
    pub cache_ttl_secs: u64,

    // comma seperated, overrides DEFAULT_PLAYER_DOMAINS
    #[clap(long, env, value_delimiter = ',')]
    pub player_domains: Vec<String>,

    #[clap(long, env, default_value = "512")]
    pub max_concurrent_requests: usize,

    // where the daily log lands in production
    #[clap(long, env, default_value = "logs")]
    pub log_dir: String,

    // optional sentry integration
    #[clap(long, env)]
    pub sentry_dsn: Option<String>,
}

impl AppConfig {
    /// configured player domains or the built in list when none were given
    pub fn player_domains(&self) -> Vec<String> {
        let configured: Vec<String> = self
            .player_domains
            .iter()
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        if configured.is_empty() {
            DEFAULT_PLAYER_DOMAINS.iter().map(|d| d.to_string()).collect()
        } else {
            configured
        }
    }

    /// scheme + host (+ port) of the tracked site without a trailing slash
    pub fn site_origin(&self) -> String {
        match url::Url::parse(&self.site_url) {
            Ok(url) => url.origin().ascii_serialization(),
            Err(_) => self.site_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for AppConfig {
    // used by the tests, real deployments go through clap
    fn default() -> Self {
        Self {
            cargo_env: CargoEnv::Development,
            port: 5000,
            site_url: "http://localhost:8080".to_string(),
            site_name: "primary".to_string(),
            public_url: None,
            cors_origin: "*".to_string(),
            upstream_timeout_secs: 8,
            probe_timeout_secs: 4,
            max_redirects: 5,
            cache_capacity: 256,
            cache_ttl_secs: 1800,
            player_domains: Vec::new(),
            max_concurrent_requests: 512,
            log_dir: "logs".to_string(),
            sentry_dsn: None,
        }
    }
}
