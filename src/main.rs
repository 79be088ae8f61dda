//! Exporter Demo CLI
//!
//! Serves synthetic metrics on `/metrics` until interrupted.

use std::sync::Arc;

use clap::Parser;
use exporter_demo::{
    config::Cli,
    generator::{self, Sampler},
    metrics::{ExporterMetrics, MetricsServer, MetricsServerConfig},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Exporter Demo v{}", exporter_demo::VERSION);

    let cli = Cli::parse();
    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let bind_addr = match config.server.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let mut sampler = Sampler::new(config.generator.seed);
    let metrics = match ExporterMetrics::new(&config.metrics, sampler.fork()) {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            error!("Failed to register metrics: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Interrupt received, shutting down");
        signal_token.cancel();
    }) {
        warn!("Failed to install signal handler: {}", e);
    }

    let generators = generator::spawn_all(
        Arc::clone(&metrics),
        &mut sampler,
        config.generator.interval(),
        &shutdown,
    );

    let server = MetricsServer::new(MetricsServerConfig { bind_addr }, metrics);
    if let Err(e) = server.run(shutdown.clone()).await {
        error!("Metrics server failed: {}", e);
        std::process::exit(1);
    }

    shutdown.cancel();
    generators.join().await;
    info!("Shutdown complete");
}
