pub mod app_services;
pub mod extractor_services;
pub mod proxy_services;
pub mod resolution_cache_services;
pub mod resolver_services;

pub use app_services::AppServices;
pub use resolution_cache_services::DynResolutionCacheService;
pub use resolver_services::DynSourceResolver;
