use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;

use tracing::info;

use watchproxy::{AppConfig, ApplicationServer, Logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Arc::new(AppConfig::parse());

    // guards are kept alive to flush logs and maintain sentry connection
    let _guards = Logger::init(&config);

    info!(
        "logger and env prepped, tracking {} as '{}'...",
        config.site_url, config.site_name
    );

    // nothing persistent, the resolution cache lives and dies with the process
    ApplicationServer::serve(config)
        .await
        .context("server failed to start")?;

    Ok(())
}
