//! HTTP API for labbook.
//!
//! Exposes the credential endpoints under `/auth` and the booking and user
//! administration endpoints behind bearer token authentication.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
