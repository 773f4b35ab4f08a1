use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod routes;
mod weather;

use config::Config;
use routes::{create_router, AppState};
use weather::{cache::ResponseCache, openweather::OpenWeatherClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_proxy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    if config.openweather_api_key.is_empty() {
        tracing::warn!("OPENWEATHER_API_KEY is not set; upstream requests will fail");
    }

    let weather_client = Arc::new(OpenWeatherClient::new(config.clone())?);

    // Lives for the whole process; dropped with the state on shutdown
    let cache = Arc::new(ResponseCache::from_config(&config));

    let config = Arc::new(config);

    let state = AppState {
        config: config.clone(),
        weather_client,
        cache,
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(
        "Weather proxy listening on http://{} (cache ttl {}s)",
        config.bind_addr(),
        config.cache_ttl_seconds
    );

    if config.open_browser {
        tokio::spawn(open_browser(format!("http://localhost:{}", config.port)));
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

async fn open_browser(url: String) {
    // Give the listener a moment before the page loads
    tokio::time::sleep(Duration::from_secs(1)).await;

    let program = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };

    match tokio::process::Command::new(program).arg(&url).status().await {
        Ok(status) if status.success() => tracing::debug!("Opened browser at {}", url),
        Ok(status) => tracing::warn!("{} exited with {}", program, status),
        Err(e) => tracing::warn!("Could not open browser: {}", e),
    }
}
