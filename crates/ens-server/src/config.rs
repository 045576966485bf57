use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub telegram_bot_token: Option<String>,
    pub telegram_api_url: String,
    pub telegram_webhook_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = var("ENS_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("ENS_JWT_SECRET is unset or still a placeholder; set it in your .env file and restart");
        }

        let host = var("ENS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&var, "ENS_PORT", 8080)?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            db_path: var("ENS_DB_PATH").unwrap_or_else(|| "ens.db".into()).into(),
            addr,
            access_ttl_secs: parse_or(&var, "ENS_ACCESS_TOKEN_TTL_SECS", 3600)?,
            refresh_ttl_secs: parse_or(&var, "ENS_REFRESH_TOKEN_TTL_SECS", 30 * 24 * 3600)?,
            telegram_bot_token: var("ENS_TELEGRAM_BOT_TOKEN").filter(|t| !t.is_empty()),
            telegram_api_url: var("ENS_TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.into()),
            telegram_webhook_secret: var("ENS_TELEGRAM_WEBHOOK_SECRET").filter(|s| !s.is_empty()),
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value {:?}", key, raw)),
        None => Ok(default),
    }
}
