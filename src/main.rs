//! Storage Dock
//!
//! Runs one dock process: a provisioner serving the configured storage
//! backends, or an attacher registering the local node.
//!
//! ```text
//!   config ──► registry ──┬─► discoverer.init ──► discover/report loop
//!                         └─► dock service ─────► backend metric loop
//!                                                   │
//!                      health (/healthz, /readyz) ◄─┤
//!                      metrics (/metrics)         ◄─┘
//! ```

use clap::Parser;
use hyper::{Body, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

use storage_dock::config::DEFAULT_DOCK_CONFIG_PATH;
use storage_dock::domain::model::DockType;
use storage_dock::{
    discover_and_report, AttachDockDiscoverer, BackendMetrics, DiscoveryContext,
    DiscoveryMetrics, DockConfig, DockDiscoverer, DockService, DriverRegistry, Error,
    ListOptions, MemoryStore, ProvisionDockDiscoverer, Result, StoreRef,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Storage Dock - serves storage backends to the provisioning control plane
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dock configuration file
    #[arg(long, env = "DOCK_CONFIG_FILE", default_value = DEFAULT_DOCK_CONFIG_PATH)]
    config_file: String,

    /// Dock role (provisioner, attacher)
    #[arg(long, env = "DOCK_TYPE", default_value = "provisioner")]
    dock_type: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let dock_type: DockType = args.dock_type.parse()?;
    let config = Arc::new(DockConfig::load(&args.config_file)?);

    info!("Starting Storage Dock");
    info!("  Version: {}", storage_dock::VERSION);
    info!("  Dock type: {}", dock_type);
    info!("  Config: {}", args.config_file);
    info!("  API endpoint: {}", config.api_endpoint);
    info!("  Discovery interval: {:?}", config.discovery_interval());

    let ready = Arc::new(AtomicBool::new(false));

    let health_addr = args.health_addr.clone();
    let health_ready = ready.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr, health_ready).await {
            error!("Health server error: {}", e);
        }
    });

    let metrics = DiscoveryMetrics::register(prometheus::default_registry())?;
    let metrics_addr = args.metrics_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr).await {
            error!("Metrics server error: {}", e);
        }
    });

    let store: StoreRef = Arc::new(MemoryStore::new());
    let registry = Arc::new(DriverRegistry::new());
    let service = Arc::new(DockService::new(
        config.clone(),
        registry.clone(),
        store.clone(),
    ));
    let mut discoverer: Box<dyn DockDiscoverer> = match dock_type {
        DockType::Provisioner => Box::new(
            ProvisionDockDiscoverer::new(config.clone(), registry, store.clone())
                .with_metrics(metrics.clone()),
        ),
        DockType::Attacher => Box::new(AttachDockDiscoverer::new(config.clone(), store.clone())),
    };
    discoverer.init().await?;
    ready.store(true, Ordering::SeqCst);
    info!("Dock initialized");

    let stop = CancellationToken::new();

    let backend_metrics = if dock_type == DockType::Provisioner {
        let samples = BackendMetrics::register(prometheus::default_registry())?;
        let (service, store, stop) = (service.clone(), store.clone(), stop.clone());
        let interval = config.discovery_interval();
        Some(tokio::spawn(async move {
            collect_backend_metrics(&service, &store, &samples, interval, &stop).await;
        }))
    } else {
        None
    };

    let (errors_tx, mut errors_rx) = mpsc::channel::<Error>(16);
    let ctx = DiscoveryContext::new(stop.clone(), errors_tx)
        .with_interval(config.discovery_interval())
        .with_metrics(metrics);

    let discovery = tokio::spawn(async move {
        discover_and_report(discoverer.as_mut(), &ctx).await;
    });

    // The channel closes once the loop has stopped and dropped its sender
    let drain = tokio::spawn(async move {
        while let Some(e) = errors_rx.recv().await {
            error!("Discovery error ({}): {}", e.kind(), e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    stop.cancel();

    if let Err(e) = discovery.await {
        error!("Discovery task failed: {}", e);
    }
    if let Err(e) = drain.await {
        error!("Error drain task failed: {}", e);
    }
    if let Some(task) = backend_metrics {
        if let Err(e) = task.await {
            error!("Backend metric task failed: {}", e);
        }
    }
    service.shutdown().await;

    info!("Dock shutdown complete");
    Ok(())
}

// =============================================================================
// Backend Metrics
// =============================================================================

/// Collect metrics of every provisioner dock once per interval until stopped
async fn collect_backend_metrics(
    service: &DockService,
    store: &StoreRef,
    samples: &BackendMetrics,
    interval: std::time::Duration,
    stop: &CancellationToken,
) {
    loop {
        let docks = store
            .list_docks(&ListOptions::default().filter("type", "provisioner"))
            .await;
        match docks {
            Ok(docks) => {
                for dock in docks {
                    match service.collect_metrics(&dock.id).await {
                        Ok(metrics) => samples.record(&dock.name, &metrics),
                        Err(
                            e @ (Error::NotImplemented { .. } | Error::BackendUnavailable { .. }),
                        ) => debug!("Dock {} reports no metrics: {}", dock.name, e),
                        Err(e) => warn!("Collect metrics of dock {} failed: {}", dock.name, e),
                    }
                }
            }
            Err(e) => warn!("List docks for metric collection failed: {}", e),
        }

        tokio::select! {
            _ = stop.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let directive = |d: &str| {
        d.parse::<Directive>()
            .map_err(|e| Error::Configuration(format!("invalid log directive {}: {}", d, e)))
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive(directive("hyper=warn")?)
        .add_directive(directive("reqwest=warn")?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

fn respond(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
}

// =============================================================================
// Health Server
// =============================================================================

async fn run_health_server(addr: &str, ready: Arc<AtomicBool>) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Request, Server};

    let make_svc = make_service_fn(move |_conn| {
        let ready = ready.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let ready = ready.clone();
                async move {
                    let response = match req.uri().path() {
                        "/healthz" | "/livez" => respond(StatusCode::OK, "ok"),
                        "/readyz" if ready.load(Ordering::SeqCst) => {
                            respond(StatusCode::OK, "ok")
                        }
                        "/readyz" => respond(StatusCode::SERVICE_UNAVAILABLE, "initializing"),
                        _ => respond(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid health server address: {}", e))
    })?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: &str) -> Result<()> {
    use hyper::header::CONTENT_TYPE;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{header::HeaderValue, Request, Server};
    use prometheus::{Encoder, TextEncoder};

    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let response = match req.uri().path() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let metric_families = prometheus::gather();
                    let mut buffer = Vec::new();
                    match encoder.encode(&metric_families, &mut buffer) {
                        Ok(()) => {
                            let mut response = respond(StatusCode::OK, buffer);
                            if let Ok(content_type) = HeaderValue::from_str(encoder.format_type())
                            {
                                response.headers_mut().insert(CONTENT_TYPE, content_type);
                            }
                            response
                        }
                        Err(e) => {
                            respond(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                        }
                    }
                }
                _ => respond(StatusCode::NOT_FOUND, "not found"),
            };
            Ok::<_, std::convert::Infallible>(response)
        }))
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid metrics server address: {}", e))
    })?;

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}
