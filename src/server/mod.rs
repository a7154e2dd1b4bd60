//! SQLShield HTTP server.
//!
//! Exposes the detection pipeline over a small JSON API:
//! - Query classification (`POST /check`)
//! - Decision log counters (`GET /stats`)
//! - Liveness (`GET /health`)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sqlshield::server::{create_router, AppState, ServerConfig};
//!
//! let state = Arc::new(AppState::new(ServerConfig::default(), detector, log));
//! let router = create_router(state);
//! axum::serve(listener, router).await?;
//! ```

mod config;
mod handlers;
mod state;

pub use config::ServerConfig;
pub use handlers::{create_router, CheckRequest, HealthResponse};
pub use state::AppState;
