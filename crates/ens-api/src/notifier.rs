use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

/// Delivery channel for a single notification message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, telegram_id: i64, text: &str) -> anyhow::Result<()>;
}

/// Used when no bot token is configured: every message is "delivered" to
/// the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, telegram_id: i64, text: &str) -> anyhow::Result<()> {
        info!("Notification for telegram chat {} ({} bytes)", telegram_id, text.len());
        Ok(())
    }
}

/// Telegram Bot API `sendMessage`.
pub struct TelegramNotifier {
    http: reqwest::Client,
    api_url: String,
    bot_token: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

impl TelegramNotifier {
    pub fn new(api_url: &str, bot_token: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("building Telegram HTTP client")?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, telegram_id: i64, text: &str) -> anyhow::Result<()> {
        // The URL carries the bot token, so it never goes into error context.
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);

        self.http
            .post(url)
            .json(&SendMessage {
                chat_id: telegram_id,
                text,
            })
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("sendMessage request failed: {}", e.without_url()))?
            .error_for_status()
            .map_err(|e| anyhow::anyhow!("sendMessage rejected: {}", e.without_url()))?;

        Ok(())
    }
}
