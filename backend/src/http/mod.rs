//! HTTP server module.
//!
//! An axum REST API over the service layer. Identity comes from the
//! `x-user-id` / `x-user-role` headers set by the upstream auth gateway.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                               │
//! │  - Identity headers, JSON in/out                          │
//! │  - CORS, compression, tracing                             │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Service Layer (services/)                                │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Repository Layer (db/)                                   │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use auth::{AuthUser, ROLE_HEADER, USER_ID_HEADER};
pub use error::{ApiError, AppError};
pub use router::{create_router, create_router_with_origins};
pub use state::AppState;
