use std::time::Duration;

use clap::Parser; // for cli
use hippo::{AppState, Args, Settings, handlers};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// How long queued notifications may take to flush on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // parse cli arguments
    let args = Args::parse();
    let port = args.port;
    let settings = Settings::from(args);

    tracing::info!(
        cache_dir = %settings.cache_dir.display(),
        logs_dir = %settings.logs_dir.display(),
        threshold = ?settings.performance_logging_threshold,
        rate_limit = ?settings.rate_limit(),
        "Configuration loaded"
    );
    if settings.rate_limit().is_none() {
        tracing::info!("Slack webhook or rate limit not configured, notifications disabled");
    }

    let (state, worker) = AppState::start(settings)?;
    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Hippo running on http://localhost:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    // the router held the last sender, the worker now drains and exits
    if tokio::time::timeout(SHUTDOWN_GRACE, worker).await.is_err() {
        tracing::warn!("Notification worker did not finish in time, pending notifications lost");
    }

    Ok(())
}
