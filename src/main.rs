//! Parkhub Server
//!
//! Parking slot reservation engine: slot holds, online/offline bookings,
//! the payment confirmation funnel, and live updates over WebSocket.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use parkhub_api::handlers::{configure_bookings, configure_slots, ws_handler};
use parkhub_core::AppConfig;
use parkhub_engine::{
    spawn_sweeper, ChangeNotifier, EngineSettings, ReservationEngine, RestCheckoutGateway,
};
use parkhub_store::{MemoryBookingStore, MemorySlotStore};
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "parkhub",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Configure API routes
fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Health check
            .route("/health", web::get().to(health_check))
            // Slot administration, holds and releases
            .configure(configure_slots)
            // Bookings and the payment funnel
            .configure(configure_bookings),
    );
}

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "parkhub={},parkhub_api={},parkhub_engine={},parkhub_store={},actix_web=info",
            log_level, log_level, log_level, log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Parkhub v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("configuration error: {}", e),
        )
    })?;

    let settings = EngineSettings::from_config(&config.booking, &config.gateway)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    let notifier = Arc::new(ChangeNotifier::new(config.booking.notifier_capacity));
    let gateway = Arc::new(RestCheckoutGateway::new(&config.gateway));
    let engine = Arc::new(ReservationEngine::new(
        Arc::new(MemorySlotStore::new()),
        Arc::new(MemoryBookingStore::new()),
        gateway,
        notifier,
        settings,
    ));

    // Background reclamation of lapsed checkout holds
    spawn_sweeper(engine.clone(), config.booking.sweep_interval_secs);

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    let cors_origins = config.server.cors_origins.clone();
    let engine_data = web::Data::from(engine);
    let config_data = web::Data::new(config);

    HttpServer::new(move || {
        // Clone cors_origins for each worker
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origins: Vec<&str> = cors_origins_inner.split(',').collect();
                if let Ok(origin_str) = origin.to_str() {
                    origins.iter().any(|o| o.trim() == origin_str)
                } else {
                    false
                }
            })
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(engine_data.clone())
            .app_data(config_data.clone())
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                let error_message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "error": "invalid_query",
                        "message": error_message
                    })),
                )
                .into()
            }))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_routes)
            // WebSocket endpoint for live updates
            .route("/ws", web::get().to(ws_handler))
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await
}
