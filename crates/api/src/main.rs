use std::net::SocketAddr;
use std::sync::Arc;

use retinoscan_api::config::ServerConfig;
use retinoscan_api::router::build_app_router;
use retinoscan_api::state::AppState;
use retinoscan_cloud::CloudinaryStore;
use retinoscan_inference::ModelApiClient;
use retinoscan_pipeline::{AnalysisOrchestrator, PgAnalysisStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "retinoscan_api=debug,retinoscan_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        model_api = %config.model_api.base_url,
        upload_folder = %config.upload_folder,
        "Loaded server configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = retinoscan_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    retinoscan_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    retinoscan_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Collaborators ---
    let predictor = ModelApiClient::new(config.model_api.clone());
    if predictor.check_health().await {
        tracing::info!("Model API is healthy");
    } else {
        tracing::warn!("Model API is not reachable yet; submissions will fail until it is");
    }

    let orchestrator = AnalysisOrchestrator::new(
        Arc::new(PgAnalysisStore::new(pool.clone())),
        Arc::new(CloudinaryStore::new(config.cloudinary.clone())),
        Arc::new(predictor),
    )
    .with_upload_folder(config.upload_folder.clone());

    // --- App state ---
    let state = AppState::new(pool, config.clone(), orchestrator);

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
