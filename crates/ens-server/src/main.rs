mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use ens_api::auth::{AppState, AppStateInner};
use ens_api::notifier::{LogNotifier, Notifier, TelegramNotifier};
use ens_api::tokens::TokenService;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ens_server=debug,ens_api=debug,ens_db=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = ens_db::Database::open(&config.db_path)?;

    let notifier: Box<dyn Notifier> = match &config.telegram_bot_token {
        Some(token) => {
            info!("Telegram delivery enabled via {}", config.telegram_api_url);
            Box::new(TelegramNotifier::new(&config.telegram_api_url, token)?)
        }
        None => {
            info!("ENS_TELEGRAM_BOT_TOKEN not set, notifications are only logged");
            Box::new(LogNotifier)
        }
    };

    let tokens = TokenService::new(&config.jwt_secret, config.access_ttl_secs, config.refresh_ttl_secs)
        .context("invalid token TTL configuration")?;

    if config.telegram_webhook_secret.is_none() {
        warn!("ENS_TELEGRAM_WEBHOOK_SECRET not set, /telegram/update accepts unsigned updates");
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens,
        notifier,
        webhook_secret: config.telegram_webhook_secret,
    });

    let app = ens_api::router(state);

    info!("ENS listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
