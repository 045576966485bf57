#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use ens_api::auth::{AppState, AppStateInner};
use ens_api::notifier::Notifier;
use ens_api::tokens::TokenService;
use ens_db::Database;

pub const SECRET: &str = "integration-test-secret";

type SendHook = Box<dyn Fn(i64) + Send>;

/// Records every message instead of sending it. Chats listed in `failing`
/// report an error.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<(i64, String)>>>,
    pub failing: Vec<i64>,
    pub hook: Arc<Mutex<Option<SendHook>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Chats that received `text`, in delivery order.
    pub fn chats_sent(&self, text: &str) -> Vec<i64> {
        self.sent()
            .into_iter()
            .filter(|(_, t)| t == text)
            .map(|(chat, _)| chat)
            .collect()
    }

    /// Run `hook` with the chat id at the start of every send.
    pub fn on_send(&self, hook: impl Fn(i64) + Send + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, telegram_id: i64, text: &str) -> anyhow::Result<()> {
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(telegram_id);
        }
        if self.failing.contains(&telegram_id) {
            anyhow::bail!("chat {} unreachable", telegram_id);
        }
        self.sent.lock().unwrap().push((telegram_id, text.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub notifier: RecordingNotifier,
}

pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn str(&self, key: &str) -> String {
        self.body[key]
            .as_str()
            .unwrap_or_else(|| panic!("no string field {key} in {}", self.body))
            .to_string()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default())
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        Self::build(notifier, TokenService::new(SECRET, 3600, 7200).unwrap(), None)
    }

    /// Sessions opened by this app lapse `refresh_ttl_secs` after login.
    pub fn with_ttls(access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        let tokens = TokenService::new(SECRET, access_ttl_secs, refresh_ttl_secs).unwrap();
        Self::build(RecordingNotifier::default(), tokens, None)
    }

    /// Webhook updates must carry `secret` in the Telegram secret header.
    pub fn with_webhook_secret(secret: &str) -> Self {
        let tokens = TokenService::new(SECRET, 3600, 7200).unwrap();
        Self::build(RecordingNotifier::default(), tokens, Some(secret.to_string()))
    }

    fn build(notifier: RecordingNotifier, tokens: TokenService, webhook_secret: Option<String>) -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            tokens,
            notifier: Box::new(notifier.clone()),
            webhook_secret,
        });
        let router = ens_api::router(state.clone());
        Self {
            state,
            router,
            notifier,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<&str>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        self.send(builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        Reply { status, body }
    }

    pub async fn request_with_header(
        &self,
        method: Method,
        uri: &str,
        (name, value): (&str, &str),
        body: &str,
    ) -> Reply {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(name, value)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// POSTs a Telegram update carrying `text` from `chat_id` to the webhook.
    pub async fn bot_message(&self, chat_id: i64, text: &str) -> Reply {
        let update = serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 7,
                "date": 0,
                "chat": { "id": chat_id, "type": "private" },
                "text": text,
            },
        });
        self.post("/telegram/update", None, &update.to_string()).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> Reply {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: &str) -> Reply {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Option<&str>) -> Reply {
        self.request(Method::PUT, uri, Some(token), body).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Reply {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Signs up a user and returns its access token.
    pub async fn signup(&self, name: &str) -> String {
        let reply = self
            .post(
                "/user/create",
                None,
                &format!(r#"{{"name":"{name}","password":"pw-{name}"}}"#),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "signup failed: {}", reply.body);
        reply.str("access_token")
    }

    /// Draft and confirm in one go; returns the confirmed entity body.
    pub async fn create_confirmed(&self, resource: &str, token: &str, body: &str) -> Value {
        let draft = self.post(&format!("/{resource}/create"), Some(token), body).await;
        assert_eq!(draft.status, StatusCode::OK, "draft failed: {}", draft.body);
        let draft_id = draft.str("draft_id");

        let entity = self
            .put(&format!("/{resource}/confirmCreation?draft_id={draft_id}"), token, None)
            .await;
        assert_eq!(entity.status, StatusCode::OK, "confirm failed: {}", entity.body);
        entity.body
    }

    pub fn count(&self, table: &str) -> i64 {
        self.state
            .db
            .with_conn(|conn| Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?))
            .unwrap()
    }

    /// Every row of `table` rendered as text, for before/after comparisons.
    pub fn snapshot(&self, table: &str) -> Vec<String> {
        self.state
            .db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(&format!("SELECT * FROM {table} ORDER BY rowid"))?;
                let width = stmt.column_count();
                let rows = stmt
                    .query_map([], |row| {
                        let mut cells = Vec::with_capacity(width);
                        for i in 0..width {
                            let cell: rusqlite::types::Value = row.get(i)?;
                            cells.push(format!("{cell:?}"));
                        }
                        Ok(cells.join("|"))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .unwrap()
    }
}
