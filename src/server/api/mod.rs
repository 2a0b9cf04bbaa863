pub mod health_controller;
pub mod proxy_controller;
pub mod resolve_controller;

pub use health_controller::HealthController;
pub use proxy_controller::ProxyController;
pub use resolve_controller::ResolveController;
