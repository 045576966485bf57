use axum::{
    Json, Router, middleware,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use ens_db::{Groups, Recipients, Templates};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{bot, groups, notifications, workflow};

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/user/create", post(auth::create_user))
        .route("/user/login", post(auth::login))
        .route("/user/refreshToken", put(auth::refresh_token))
        .route("/telegram/update", post(bot::telegram_update));

    let protected_routes = Router::new()
        .route("/user", delete(auth::delete_user))
        .route("/user/modifyUser", put(auth::modify_user))
        // Recipients
        .route("/recipients", get(workflow::get::<Recipients>))
        .route("/recipients/all", get(workflow::get_all::<Recipients>))
        .route("/recipients/create", post(workflow::create::<Recipients>))
        .route("/recipients/confirmCreation", put(workflow::confirm::<Recipients>))
        .route("/recipients/modifyRecipient", put(workflow::modify::<Recipients>))
        .route("/recipients/deleteRecipient", delete(workflow::delete::<Recipients>))
        // Templates
        .route("/templates", get(workflow::get::<Templates>))
        .route("/templates/all", get(workflow::get_all::<Templates>))
        .route("/templates/create", post(workflow::create::<Templates>))
        .route("/templates/confirmCreation", put(workflow::confirm::<Templates>))
        .route("/templates/modifyTemplate", put(workflow::modify::<Templates>))
        .route("/templates/deleteTemplate", delete(workflow::delete::<Templates>))
        // Groups
        .route("/groups", get(workflow::get::<Groups>))
        .route("/groups/all", get(workflow::get_all::<Groups>))
        .route("/groups/active", get(groups::get_active))
        .route("/groups/create", post(workflow::create::<Groups>))
        .route("/groups/confirmCreation", put(workflow::confirm::<Groups>))
        .route("/groups/modifyGroup", put(workflow::modify::<Groups>))
        .route("/groups/deleteGroup", delete(workflow::delete::<Groups>))
        .route("/groups/recipients", get(groups::get_recipients))
        .route("/groups/addRecipient", put(groups::add_recipient))
        .route("/groups/deleteRecipient", delete(groups::delete_recipient))
        // Notifications
        .route("/notifications", get(notifications::get_notification))
        .route("/notifications/all", get(notifications::get_all))
        .route("/notifications/pending", get(notifications::get_pending))
        .route("/notifications/createBatch", post(notifications::create_batch))
        .route("/notifications/sendBatch", put(notifications::send_batch))
        .route(
            "/notifications/cancelNotification",
            delete(notifications::cancel_notification),
        )
        // Auth runs before any extractor, so a bad token wins over a bad id.
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
