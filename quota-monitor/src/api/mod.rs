//! HTTP API.
//!
//! Thin routing over the refresh service: account CRUD, manual refresh,
//! health and live log filter control.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, ApiServerConfig, AppState};
