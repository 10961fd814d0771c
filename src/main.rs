//! Lodging booking server
//!
//! Wires the PostgreSQL store, the payment provider and the notification
//! worker behind the HTTP API.

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use lodging_booking_server::auth::JwtConfig;
use lodging_booking_server::booking::BookingService;
use lodging_booking_server::config::Config;
use lodging_booking_server::notifications::{HttpNotifier, LogNotifier, Notifier};
use lodging_booking_server::payments::{PaymentGateway, PaymentProfileService, StripeGateway};
use lodging_booking_server::state::AppState;
use lodging_booking_server::store::PgStore;
use lodging_booking_server::tasks::{start_expiration_sweep, TaskQueue, TaskWorker};
use lodging_booking_server::{db, middleware, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_line_number(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "Starting booking server");

    let db_pool = db::create_pool(&config).await?;
    db::run_migrations(&db_pool).await?;

    let store = Arc::new(PgStore::new(db_pool.clone()));

    if config.stripe_api_key.is_empty() {
        tracing::warn!("STRIPE_API_KEY not set, payment provider calls will be rejected");
    }
    let gateway: Arc<dyn PaymentGateway> = Arc::new(StripeGateway::new(
        config.stripe_api_url.clone(),
        config.stripe_api_key.clone(),
    ));

    let notifier: Arc<dyn Notifier> = match &config.notification_webhook_url {
        Some(url) => {
            tracing::info!(endpoint = %url, "Emails relayed over HTTP");
            Arc::new(HttpNotifier::new(url.clone()))
        }
        None => {
            tracing::info!("NOTIFICATION_WEBHOOK_URL not set, emails are only logged");
            Arc::new(LogNotifier)
        }
    };

    let (task_queue, task_receiver) = TaskQueue::new();
    let worker = TaskWorker::new(
        task_receiver,
        store.clone(),
        store.clone(),
        store.clone(),
        notifier,
        config.default_from_email.clone(),
    );
    tokio::spawn(worker.run());

    let booking_service = Arc::new(BookingService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        gateway.clone(),
        task_queue,
        config.payment_expiration_minutes,
    ));
    let payment_profiles = Arc::new(PaymentProfileService::new(store.clone(), gateway));

    // Kept alive for the lifetime of the server
    let _sweep = match &config.expired_booking_sweep_cron {
        Some(cron) => Some(
            start_expiration_sweep(booking_service.clone(), cron)
                .await
                .context("failed to schedule the expired booking sweep")?,
        ),
        None => None,
    };

    let app_state = AppState::new(
        booking_service,
        payment_profiles,
        JwtConfig::new(config.jwt_secret.clone()),
        config.webhook_secret.clone(),
        config.default_page_size,
    );

    if app_state.webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set, payment webhooks will be rejected");
    }

    let health_db_pool = db_pool.clone();

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(move || health_check(health_db_pool.clone())))
        .merge(routes::api_router(app_state))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(configure_cors(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn root() -> &'static str {
    "Lodging Booking API Server"
}

/// Health check response
#[derive(serde::Serialize)]
struct HealthResponse {
    status: String,
    database: String,
    version: String,
}

async fn health_check(pool: sqlx::PgPool) -> axum::Json<HealthResponse> {
    let (status, database) = match db::check_health(&pool).await {
        Ok(()) => ("healthy", "connected".to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            ("unhealthy", e.health_label().to_string())
        }
    };

    axum::Json(HealthResponse {
        status: status.to_string(),
        database,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let allowed_origins = allowed_origins.unwrap_or_default();

    if allowed_origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
