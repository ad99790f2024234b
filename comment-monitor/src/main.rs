use std::sync::Arc;

use comment_monitor::api::{ApiServer, ApiServerConfig, AppState};
use comment_monitor::config::AppConfig;
use comment_monitor::database::{self, CommentRepository, SqlxCommentRepository};
use comment_monitor::hub::BroadcastHub;
use comment_monitor::logging::init_logging;
use comment_monitor::monitor::MonitorController;
use comment_source::CommentSource;
use comment_source::bilibili::{BilibiliCommentClient, install_rustls_provider};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    // Keep the guard alive until exit so buffered file logs are flushed.
    let (logging, _log_guard) = init_logging(&config.log_dir)?;
    let shutdown = CancellationToken::new();
    logging.start_retention_cleanup(shutdown.child_token());

    install_rustls_provider();

    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;
    let repository: Arc<dyn CommentRepository> =
        Arc::new(SqlxCommentRepository::new(pool.clone(), pool.clone()));

    let default_credentials = config.default_credentials()?;
    let source: Arc<dyn CommentSource> = Arc::new(BilibiliCommentClient::default());
    let controller = Arc::new(
        MonitorController::new(source, Arc::clone(&repository), Arc::new(BroadcastHub::new()))
            .with_default_credentials(default_credentials),
    );

    let server_config =
        ApiServerConfig::from_env_or_default().with_static_dir(config.static_dir.clone());
    let server = ApiServer::new(
        server_config,
        AppState::new(Arc::clone(&controller), repository),
    )
    .with_cancel_token(shutdown.child_token());

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    tracing::info!("comment-monitor initialized successfully");
    let result = server.run().await;

    controller.shutdown().await;
    shutdown.cancel();
    pool.close().await;

    result?;
    Ok(())
}
