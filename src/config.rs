//! Configuration management for the appointments API client
//!
//! Handles loading environment variables with fail-soft behavior.
//! A missing base URL never panics: the client still constructs, and every
//! call returns [`ApiError::MissingConfig`] until the variable is provided.

use std::sync::Arc;
use std::time::Duration;

use crate::error::ApiError;

/// Header names whose values are masked in request logs
pub const DEFAULT_SENSITIVE_HEADERS: &[&str] = &["authorization", "access_token"];

/// Query parameter names whose values are masked in logged paths
pub const DEFAULT_SENSITIVE_QUERY_PARAMS: &[&str] = &[
    "token",
    "password",
    "apiKey",
    "api_key",
    "secret",
    "refresh_token",
];

/// JSON body field names whose values are masked in logged bodies
pub const DEFAULT_SENSITIVE_BODY_FIELDS: &[&str] = &[
    "password",
    "token",
    "refresh_token",
    "access_token",
    "apiKey",
    "api_key",
    "secret",
    "authorization",
    "bearer",
];

/// Lists of sensitive names, matched against keys as case-insensitive substrings.
///
/// `"token"` therefore also masks `refresh_token`, `X-Token-Id` and `csrfToken`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskingConfig {
    pub sensitive_headers: Vec<String>,
    pub sensitive_query_params: Vec<String>,
    pub sensitive_body_fields: Vec<String>,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        fn owned(names: &[&str]) -> Vec<String> {
            names.iter().map(|n| n.to_string()).collect()
        }

        Self {
            sensitive_headers: owned(DEFAULT_SENSITIVE_HEADERS),
            sensitive_query_params: owned(DEFAULT_SENSITIVE_QUERY_PARAMS),
            sensitive_body_fields: owned(DEFAULT_SENSITIVE_BODY_FIELDS),
        }
    }
}

/// Configuration for the appointments API client
///
/// Loaded from environment variables:
/// - `APPOINTMENTS_API_URL`: Base URL of the backend (e.g., https://api.example.com)
/// - `APPOINTMENTS_API_PREFIX`: Optional path prefix inserted before every path (e.g., /api/v1)
/// - `APPOINTMENTS_API_DEBUG`: Optional flag ("true"/"1"/"yes") for verbose tracing
/// - `APPOINTMENTS_API_TIMEOUT_SECS`: Optional transport timeout in seconds
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether calls can be made (base URL present)
    pub active: bool,

    /// Base URL for the backend
    pub base_url: Option<String>,

    /// Path prefix placed between the base URL and each request path
    pub path_prefix: Option<String>,

    /// Whether debug logging is enabled
    pub debug: bool,

    /// Transport timeout; none by default
    pub request_timeout: Option<Duration>,

    /// Sensitive names used by the logging interceptors
    pub masking: MaskingConfig,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Missing `APPOINTMENTS_API_URL` disables outbound calls and emits a
    /// warning; it never panics.
    pub fn from_env() -> Self {
        // Required for calls; absence disables the client, it never panics
        let base_url = non_empty_var("APPOINTMENTS_API_URL");
        let path_prefix = non_empty_var("APPOINTMENTS_API_PREFIX");

        // Debug mode (default: false)
        let debug = match std::env::var("APPOINTMENTS_API_DEBUG") {
            Ok(val) => matches!(val.to_lowercase().as_str(), "true" | "1" | "yes"),
            Err(_) => false,
        };

        // Optional transport timeout in whole seconds
        let request_timeout = match non_empty_var("APPOINTMENTS_API_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    tracing::warn!(value = %raw, "ignoring invalid APPOINTMENTS_API_TIMEOUT_SECS");
                    None
                }
            },
            None => None,
        };

        let active = base_url.is_some();

        if !active {
            tracing::warn!(
                "API client DISABLED: APPOINTMENTS_API_URL environment variable is missing"
            );
        } else if debug {
            tracing::debug!(
                base_url = base_url.as_deref().unwrap_or_default(),
                prefix = path_prefix.as_deref().unwrap_or_default(),
                "API client initialized (DEBUG MODE ACTIVE)"
            );
        }

        Self {
            active,
            base_url,
            path_prefix,
            debug,
            request_timeout,
            masking: MaskingConfig::default(),
        }
    }

    /// Create configuration with explicit values (useful for testing)
    pub fn new(base_url: Option<String>, path_prefix: Option<String>) -> Self {
        Self {
            active: base_url.is_some(),
            base_url,
            path_prefix,
            debug: false,
            request_timeout: None,
            masking: MaskingConfig::default(),
        }
    }

    /// Replace the masking lists
    pub fn with_masking(mut self, masking: MaskingConfig) -> Self {
        self.masking = masking;
        self
    }

    /// Set a transport timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Get base URL (returns error if missing)
    pub fn get_base_url(&self) -> Result<&str, ApiError> {
        self.base_url.as_deref().ok_or(ApiError::MissingConfig)
    }

    /// Prefix normalized to `/segment` form, or empty when unset
    pub fn normalized_prefix(&self) -> String {
        match self.path_prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(p) if !p.is_empty() => format!("/{p}"),
            _ => String::new(),
        }
    }

    /// Wrap config in Arc for thread-safe sharing
    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
