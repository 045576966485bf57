pub mod auth;
pub mod bot;
pub mod error;
pub mod extract;
pub mod groups;
pub mod middleware;
pub mod notifications;
pub mod notifier;
pub mod routes;
pub mod tokens;
pub mod workflow;

pub use auth::{AppState, AppStateInner};
pub use routes::router;
