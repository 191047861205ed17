//! Translator Hub - Main Entry Point
//!
//! Starts the REST server, advertises configured entities in the service
//! registry, and on shutdown closes every hub and withdraws the registrations.

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use translator_hub::api::{configure_routes, ApiState, AppState};
use translator_hub::config::Settings;
use translator_hub::discovery::{
    detect_node_ip, HttpDirectoryClient, RegistrationAdapter, RegistrationConfig,
};
use translator_hub::metrics::{init_metrics, metrics_endpoint};
use translator_hub::services::TranslatorService;
use translator_hub::spoke::{HttpSpokeConfig, HttpSpokeFactory, SpokeCatalog};
use translator_hub::translator::{HubRegistry, PortAllocator};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with RUST_LOG environment variable support
    // Default: info level for translator_hub, warn for everything else
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,translator_hub=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    // Load configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        warn!("Failed to load config: {}, using defaults", e);
        Settings::default()
    });

    info!("Starting Translator Hub v{}", translator_hub::VERSION);
    info!("HTTP: {}:{}", settings.server.host, settings.server.http_port);
    info!(
        "Hub ports: {}-{} on {}",
        settings.translator.port_range_start,
        settings.translator.port_range_end,
        settings.translator.bind_host
    );

    if settings.metrics.enabled {
        init_metrics();
    }

    // Hub registry with the HTTP spoke
    let bind_host: IpAddr = settings
        .translator
        .bind_host
        .parse()
        .context("translator.bind_host must be an IP address")?;
    let ports = PortAllocator::new(
        bind_host,
        settings.translator.port_range_start,
        settings.translator.port_range_end,
    )?;
    let http_spokes = HttpSpokeFactory::new(HttpSpokeConfig {
        connect_timeout: settings.translator.connect_timeout(),
        reply_timeout: settings.translator.reply_timeout(),
        ..Default::default()
    })?;
    let catalog = SpokeCatalog::new().with(Arc::new(http_spokes));
    info!("Spokes available for: {:?}", catalog.protocols());

    let registry = Arc::new(HubRegistry::new(
        ports,
        catalog,
        settings.translator.connect_timeout(),
    ));
    let service = TranslatorService::new(registry);

    let node_ip = match &settings.translator.outgoing_ip {
        Some(ip) => ip.clone(),
        None => detect_node_ip().await.to_string(),
    };
    info!("Outgoing IP: {}", node_ip);

    // Service registry
    let registration = if settings.service_registry.enabled {
        let client = HttpDirectoryClient::new(
            settings.service_registry.base_url(&settings.tls),
            Duration::from_millis(settings.service_registry.timeout_ms),
        )?;
        info!("Service registry: {}", client.base_url());

        let adapter = RegistrationAdapter::new(
            Arc::new(client),
            RegistrationConfig {
                source: settings.service_registry.source.clone(),
                node_address: node_ip.clone(),
                node_port: settings.server.http_port,
                secure: settings.tls.enabled,
            },
        );
        adapter.register_all(&settings.service_registry.entities).await;
        Some(adapter)
    } else {
        None
    };

    // Start HTTP server
    let app_state = AppState::new();
    let api_state = ApiState::new(service.clone(), node_ip);
    let metrics = settings.metrics.clone();
    let http_addr = format!("{}:{}", settings.server.host, settings.server.http_port);
    info!("Starting HTTP server on {}", http_addr);

    let server = HttpServer::new(move || {
        let app = App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(api_state.clone()))
            .wrap(TracingLogger::default())
            .configure(configure_routes);

        if metrics.enabled {
            app.route(&metrics.path, web::get().to(metrics_endpoint))
        } else {
            app
        }
    })
    .workers(settings.server.workers)
    .bind(&http_addr)
    .with_context(|| format!("failed to bind {}", http_addr))?
    .run();

    server.await?;

    // Graceful shutdown
    info!("Shutting down");
    service.remove_all_hubs().await;
    if let Some(adapter) = registration {
        adapter.unregister_all().await;
    }

    Ok(())
}
