#![allow(dead_code)]

use std::sync::Arc;

use axum::{Router, body::Body, http::Request, response::Response};
use tokio::net::TcpListener;
use tower::ServiceExt;

use watchproxy::{AppConfig, ApplicationServer, server::services::AppServices};

pub const PUBLIC_URL: &str = "http://proxy.test";
pub const PROXY_ENDPOINT: &str = "http://proxy.test/api/v1/proxy";

/// serves `router` on a random local port, returns its base url without a trailing slash
pub async fn spawn_upstream(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}

/// an address nothing listens on
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    format!("http://{}", addr)
}

pub fn test_config(site_url: &str) -> AppConfig {
    AppConfig {
        site_url: site_url.to_string(),
        public_url: Some(PUBLIC_URL.to_string()),
        upstream_timeout_secs: 2,
        probe_timeout_secs: 2,
        ..AppConfig::default()
    }
}

pub fn test_services(site_url: &str) -> AppServices {
    AppServices::new(Arc::new(test_config(site_url))).unwrap()
}

pub async fn send(services: AppServices, request: Request<Body>) -> Response {
    ApplicationServer::router(services)
        .oneshot(request)
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
