//! Interceptor demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     HTTP request
//!     ──────────────▶ HttpLogLayer ──▶ axum router
//!                                        │
//!                       POST /greeter.v1.Greeter/SayHello
//!                                        │
//!                                        ▼
//!                 ┌──────────────── server chain ────────────────┐
//!                 │ correlation → api log → ctx log → validation │──▶ greet
//!                 └──────────────────────────────────────────────┘      │
//!                                                                        ▼
//!                 ┌──────────────── client chain ────────────────┐
//!                 │      retry → metadata forward → client log   │──▶ audit
//!                 └──────────────────────────────────────────────┘
//! ```
//!
//! Usage: `rpc-interceptors [config.toml]`

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;

use rpc_interceptors::config::{load_config, InterceptorConfig};
use rpc_interceptors::http::DemoServer;
use rpc_interceptors::observability::{init_logging, metrics};
use rpc_interceptors::{BackgroundTasks, InterceptorFactory, RequestClassifier, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => InterceptorConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!("rpc-interceptors v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.server.bind_address,
        max_retries = config.retry.max_retries,
        schemas = config.schemas.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let tasks = BackgroundTasks::new();
    let factory = InterceptorFactory::from_config(&config, tasks.clone())?;
    let classifier = Arc::new(RequestClassifier::new(Arc::new(config.classifier.clone())));

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    DemoServer::new(factory, classifier).run(listener, Shutdown::new()).await?;

    tasks.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
