//! Storefront client: configuration, backend calls with retries, and the
//! local collections, assembled behind [`Storefront`].

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod auth;
pub mod config;
pub mod storefront;
pub mod telemetry;

pub use api::{ApiError, ApiResult, AuthStatus, BackendClient, CustomerSummary};
pub use auth::{AuthFailure, AuthSession};
pub use config::{AppConfig, ConfigLoader};
pub use storefront::{Storefront, StorefrontError};
pub use telemetry::init_tracing;
