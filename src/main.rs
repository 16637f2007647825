//! The binary entry point for the profile server.

use std::sync::Arc;
use std::time::Duration;

use app_core::config::Config;
use app_core::middleware::request_response_logger;
use app_core::storage::StorageService;
use app_core::storage::local::LocalStorageService;
use app_core::verifier::{FirebaseVerifier, ServiceAccount, TokenVerifier};
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::{Json, Router, middleware, routing};
use sea_orm::{ConnectOptions, Database};
use tokio::signal;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(fmt::format::FmtSpan::CLOSE),
        )
        .init();

    if let Err(err) = run().await {
        panic!("❌ Application failed to start: {err}");
    }
}

/// Initializes all dependencies and starts the web server.
async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration file, overlaid by APP_* environment variables.
    let config = Config::builder("config/config.yaml").build()?;

    // Initialize the SeaORM database connection pool.
    let mut db_opt = ConnectOptions::new(config.get::<String>("database.url")?);
    db_opt
        .min_connections(config.get_or("database.min_connections", 1)?)
        .max_connections(config.get_or("database.max_connections", 10)?)
        .connect_timeout(Duration::from_secs(config.get_or("database.connect_timeout_secs", 8)?))
        .acquire_timeout(Duration::from_secs(config.get_or("database.acquire_timeout_secs", 8)?))
        .idle_timeout(Duration::from_secs(config.get_or("database.idle_timeout_secs", 300)?))
        .sqlx_logging(config.get_or("database.sqlx_logging", false)?)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db_pool = Arc::new(Database::connect(db_opt).await?);

    if config.get_or("database.auto_migrate", false)? {
        profile::migrate(&db_pool).await?;
    }

    // Initialize the identity token verifier from the service-account bundle.
    let account = ServiceAccount::from_file(config.get::<String>("identity.credentials_path")?)?;
    let verifier: Arc<dyn TokenVerifier> =
        Arc::new(FirebaseVerifier::from_service_account(&account, config.get_or("identity.leeway_secs", 0)?));
    tracing::info!(
        project_id = %account.project_id,
        client_email = account.client_email.as_deref().unwrap_or("-"),
        "Token verifier ready"
    );

    // Initialize the storage service.
    let base_path: String = config.get("storage.local.base_path")?;
    let base_url: String = config.get("storage.local.base_url")?;
    let uploads_prefix = uploads_prefix(&base_url)?;
    let storage_service: Arc<dyn StorageService> =
        Arc::new(LocalStorageService::new(base_path.clone(), base_url.clone()));

    // Initialize profile module
    let profile_state = profile::new(profile::Dependency {
        db: db_pool.clone(),
        verifier,
        storage: storage_service,
    });

    // Create the Router and Middlewares
    let timeout = Duration::from_secs(config.get::<u64>("server.timeout_secs")?);
    let max_body_bytes = config.get_or("server.max_body_bytes", DEFAULT_MAX_BODY_BYTES)?;
    let app = build_app(
        profile::create_router(profile_state),
        &uploads_prefix,
        &base_path,
        max_body_bytes,
        timeout,
    );

    let server_address = config.get::<String>("server.address")?;
    let listener = tokio::net::TcpListener::bind(&server_address).await?;

    tracing::info!("🚀 listening on {}, serving uploads at {}", listener.local_addr()?, uploads_prefix);

    // Create a broadcast channel to signal shutdown to all application components.
    let (shutdown_tx, _) = broadcast::channel(1);
    spawn_shutdown_listener(shutdown_tx.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_tx.subscribe().recv().await.ok();
            tracing::info!("🛑 Server is shutting down gracefully...");
        })
        .await?;

    match Arc::try_unwrap(db_pool) {
        Ok(db) => db.close().await?,
        Err(_) => tracing::warn!("Database pool still shared at shutdown, leaving it to drop"),
    }

    Ok(())
}

/// Derives the route under which stored files are served from the public
/// base URL handed out in photo references. It must be a non-root path.
fn uploads_prefix(base_url: &str) -> Result<String, String> {
    let trimmed = base_url.trim().trim_end_matches('/');

    let invalid = !trimmed.starts_with('/')
        || trimmed.starts_with("//")
        || trimmed.contains(['{', '}', '*', '?', '#']);
    if invalid {
        return Err(format!("storage.local.base_url must be a non-root path such as /uploads, got {base_url:?}"));
    }

    Ok(trimmed.to_string())
}

/// Assembles the HTTP surface: feature routes, static uploads, liveness,
/// JSON fallbacks and the shared middleware stack.
fn build_app(routes: Router, uploads_prefix: &str, uploads_dir: &str, max_body_bytes: usize, timeout: Duration) -> Router {
    Router::new()
        .merge(routes)
        .nest_service(uploads_prefix, ServeDir::new(uploads_dir))
        .route(
            "/",
            routing::get(|| async { Json(serde_json::json!({"message": "Profile service is running"})) }),
        )
        .fallback(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"message": "Endpoint not found"})),
            )
        })
        .method_not_allowed_fallback(|| async {
            (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(serde_json::json!({"message": "Method not allowed"})),
            )
        })
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_response_logger))
                .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
                .layer(RequestDecompressionLayer::new())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)),
        )
}

/// Spawns a background task to listen for system shutdown signals.
fn spawn_shutdown_listener(shutdown_tx: broadcast::Sender<()>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                tracing::error!("Failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                },
                Err(err) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", err);
                    std::future::pending::<()>().await;
                },
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("🔻 Received SIGINT (Ctrl+C)")},
            _ = terminate => { tracing::info!("🔻 Received SIGTERM")},
        }

        // Send the shutdown signal to all parts of the application.
        if shutdown_tx.send(()).is_err() {
            tracing::error!("Failed to send shutdown signal");
        }
    });
}
