//! # Appointments API client
//!
//! Outbound HTTP pipeline for the appointments portal. Every call the
//! administrator and customer portals make to the REST backend goes through
//! [`ApiClient::api`], which wraps the transport in an ordered interceptor
//! chain:
//!
//! - **Authentication**: attaches `Authorization: Bearer <token>` when the
//!   current session carries an access token
//! - **Logging**: one masked line per request and one per response, paired
//!   by a correlation id and timed from the start of the call
//! - **Fail-safe logging**: masking and formatting never fail the call
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use appointments_api::prelude::*;
//!
//! # async fn run() -> Result<(), ApiError> {
//! let sessions = Arc::new(StaticSessionProvider::new(Some(Session::with_token("jwt"))));
//! let client = ApiClient::new(Config::from_env(), sessions)?;
//!
//! let response = client.get("/rooms").await?;
//! if response.is_success() {
//!     let rooms: serde_json::Value = response.json()?;
//!     println!("{rooms}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! - `APPOINTMENTS_API_URL`: backend base URL (required for calls)
//! - `APPOINTMENTS_API_PREFIX`: optional path prefix such as `/api/v1`
//! - `APPOINTMENTS_API_DEBUG`: `true`/`1`/`yes` for verbose tracing
//! - `APPOINTMENTS_API_TIMEOUT_SECS`: optional transport timeout
//!
//! ## Architecture
//!
//! - `utils`: path/query extraction, masking, timestamps, correlation ids
//! - `signature`: request/response signatures, endpoint classification, log line templates
//! - `logger`: masked request/response logger and log sinks
//! - `body_capture`: safe response body capture for logging
//! - `auth`: session provider contract and bearer-token interceptor
//! - `interceptor`: the interceptor chain and HTTP transport
//! - `client`: API entry point and per-call logging interceptors
//! - `config`, `error`, `telemetry`: ambient configuration, errors and subscriber setup

pub mod auth;
pub mod body_capture;
pub mod client;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod logger;
pub mod prelude;
pub mod signature;
pub mod telemetry;
pub mod utils;

pub use client::ApiClient;
pub use config::Config;
pub use error::ApiError;
pub use interceptor::FetchInterceptor;
