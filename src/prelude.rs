//! Convenience re-exports for easy importing
//!
//! Import everything you need with:
//! ```rust
//! use appointments_api::prelude::*;
//! ```

pub use crate::auth::{Session, SessionProvider, StaticSessionProvider};
pub use crate::client::{ApiClient, ApiOptions};
pub use crate::config::{Config, MaskingConfig};
pub use crate::error::ApiError;
pub use crate::interceptor::{ApiResponse, CacheMode, FetchInterceptor};
pub use crate::logger::{LogSink, MemorySink, TracingSink};
