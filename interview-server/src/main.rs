use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};

use interview_server::config::Config;
use interview_server::notifier::{HttpNotifier, LogOnlyNotifier, Notifier};
use interview_server::repository::SqliteRepository;
use interview_server::{app_router, AppState, RecordingLogger, SessionEngine};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!(
        "Starting interview session engine {}",
        interview_server::get_server_version()
    );

    let config = Config::from_env().context("Failed to load configuration from environment")?;

    // Initialize recording logger if enabled
    let recording_logger = if config.recording_enabled {
        match RecordingLogger::new(PathBuf::from(&config.recording_log_path)) {
            Ok(logger) => {
                info!(
                    "Recording enabled, logging to: {}",
                    config.recording_log_path
                );
                Some(logger)
            }
            Err(e) => {
                error!("Failed to initialize recording logger: {}", e);
                None
            }
        }
    } else {
        None
    };

    let db_path = config.database_path();
    info!("Using session database: {}", db_path.display());
    let repository = Arc::new(
        SqliteRepository::new(&db_path).context("Failed to initialize SQLite database")?,
    );

    let notifier: Arc<dyn Notifier> = match &config.notify_api {
        Some(api) => {
            info!("Sending notifications via {}", api.url);
            Arc::new(HttpNotifier::new(
                api.url.clone(),
                api.api_key.clone(),
                config.notify_request_timeout,
                recording_logger.clone(),
            )?)
        }
        None => {
            warn!("NOTIFY_API_URL/NOTIFY_API_KEY not set; notifications will only be logged");
            Arc::new(LogOnlyNotifier)
        }
    };

    if config.webhook_secret.is_none() {
        warn!("WEBHOOK_SECRET not set; callbacks are accepted without signature checks");
    }

    let engine = SessionEngine::new(repository.clone(), repository, notifier)
        .with_notify_template(config.notify_template.clone())
        .with_notify_timeout(config.notify_timeout);

    let app_state = Arc::new(AppState {
        engine,
        webhook_secret: config.webhook_secret.clone(),
        status_auth_token: config.status_auth_token.clone(),
        recording_logger,
    });

    let app = app_router(app_state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
