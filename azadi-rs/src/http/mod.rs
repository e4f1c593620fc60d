//! HTTP layer: Axum router, handlers, and responses.
//!
//! Exposes the relay endpoint (`/dns-query`), the settings API
//! (`/set-doh-address`, `/reset-doh-address`), and the session-gated panel.

mod auth;
mod error;
mod handlers;
mod pages;
mod state;

#[cfg(test)]
mod tests;

pub use handlers::router;
pub use state::AppState;
