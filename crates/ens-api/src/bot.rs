//! Telegram bot commands, delivered by the Bot API webhook. A chat opts in
//! to notifications with `/send_notifications` and out with
//! `/stop_notifications`; anything else gets the help text.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::{debug, warn};

use ens_types::api::TelegramUpdate;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::Payload;

/// Header Telegram echoes the `secret_token` given to `setWebhook` in.
pub const WEBHOOK_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

pub const HELP_MESSAGE: &str = "This is the notifier bot of the emergency notification system. \
     Use /send_notifications or /stop_notifications to accept or reject notifications from other users";
pub const SUBSCRIBED: &str = "Success! Now you will receive notifications from other users";
pub const ALREADY_SUBSCRIBED: &str = "You are already subscribed to notifications";
pub const UNSUBSCRIBED: &str = "Stopped notifications";
pub const NOT_SUBSCRIBED: &str = "You aren't subscribed to notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    SendNotifications,
    StopNotifications,
}

impl BotCommand {
    /// `/name` or `/name@botname`, optionally followed by arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.split_once('@').map_or(word, |(name, _)| name);
        match name {
            "/start" => Some(BotCommand::Start),
            "/help" => Some(BotCommand::Help),
            "/send_notifications" => Some(BotCommand::SendNotifications),
            "/stop_notifications" => Some(BotCommand::StopNotifications),
            _ => None,
        }
    }
}

/// Apply whatever `text` asks for on behalf of `chat_id` and return the reply.
pub async fn handle_command(state: &AppState, chat_id: i64, text: &str) -> Result<&'static str, ApiError> {
    let reply = match BotCommand::parse(text) {
        None | Some(BotCommand::Start) | Some(BotCommand::Help) => HELP_MESSAGE,
        Some(BotCommand::SendNotifications) => {
            if state.run_db(move |db| db.activate_contact(chat_id)).await? {
                SUBSCRIBED
            } else {
                ALREADY_SUBSCRIBED
            }
        }
        Some(BotCommand::StopNotifications) => {
            if state.run_db(move |db| db.deactivate_contact(chat_id)).await? {
                UNSUBSCRIBED
            } else {
                NOT_SUBSCRIBED
            }
        }
    };
    Ok(reply)
}

/// Webhook endpoint. When a webhook secret is configured, updates without
/// the matching header are refused with 401.
pub async fn telegram_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(update): Payload<TelegramUpdate>,
) -> Result<StatusCode, ApiError> {
    if let Some(expected) = &state.webhook_secret {
        let given = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if given != Some(expected.as_str()) {
            return Err(ApiError::Unauthenticated);
        }
    }

    let Some(message) = update.message else {
        debug!("Ignoring telegram update {} without a message", update.update_id);
        return Ok(StatusCode::OK);
    };

    let chat_id = message.chat.id;
    let reply = handle_command(&state, chat_id, message.text.as_deref().unwrap_or_default()).await?;

    if let Err(e) = state.notifier.send(chat_id, reply).await {
        warn!("Reply to telegram chat {} failed: {:#}", chat_id, e);
    }
    Ok(StatusCode::OK)
}
