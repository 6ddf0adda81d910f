//! Request/response signatures and single-line log message formatting
//!
//! A signature is the minimal description of one outbound call that is safe
//! to print. Log metadata (category and module) is derived from the path
//! alone and is only used to make lines easier to scan.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use reqwest::Method;

use crate::utils::{format_timestamp, rebuild_path_with_masked_params, QueryParams};

const AUTH_KEYWORDS: &[&str] = &[
    "auth", "login", "logout", "signin", "signup", "session", "password",
];
const LOOKUP_KEYWORDS: &[&str] = &["lookup", "search", "/cep", "/cnpj", "/cpf", "zipcode"];
const INTEGRATION_KEYWORDS: &[&str] = &["integration", "webhook", "external", "callback"];
const SYSTEM_KEYWORDS: &[&str] = &["health", "system", "config", "metrics", "version"];

/// Coarse classification of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    Authentication,
    Lookup,
    Integration,
    System,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Authentication => "authentication",
            LogCategory::Lookup => "lookup",
            LogCategory::Integration => "integration",
            LogCategory::System => "system",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application module an endpoint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogModule {
    Auth,
    Lookup,
    System,
    Unknown,
}

impl LogModule {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogModule::Auth => "auth",
            LogModule::Lookup => "lookup",
            LogModule::System => "system",
            LogModule::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LogModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogMetadata {
    pub category: LogCategory,
    pub module: LogModule,
}

impl LogMetadata {
    /// Infer both labels from the request path
    pub fn infer(path: &str) -> Self {
        Self {
            category: infer_category(path),
            module: infer_module(path),
        }
    }
}

/// Describes an outbound request for logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature {
    pub method: Method,
    /// Path, possibly including a query string
    pub path: String,
    pub query_params: Option<QueryParams>,
    pub request_id: Option<String>,
}

impl RequestSignature {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query_params: None,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_query_params(mut self, params: QueryParams) -> Self {
        self.query_params = Some(params);
        self
    }

    /// Path as it should appear in a log line
    ///
    /// When query parameters are attached, the query string is rebuilt from
    /// them (so masked values replace the raw ones).
    pub fn display_path(&self) -> String {
        match &self.query_params {
            Some(params) => rebuild_path_with_masked_params(&self.path, params),
            None => self.path.clone(),
        }
    }
}

/// Describes a completed request for logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSignature {
    pub request: RequestSignature,
    pub status_code: u16,
    /// Time elapsed since the call started
    pub duration: Option<Duration>,
}

impl ResponseSignature {
    pub fn new(request: RequestSignature, status_code: u16) -> Self {
        Self {
            request,
            status_code,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status_code < 400
    }
}

fn matches_any(path: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| path.contains(kw))
}

/// Classify an endpoint path; falls back to [`LogCategory::System`]
pub fn infer_category(path: &str) -> LogCategory {
    let path = path.to_lowercase();
    if matches_any(&path, AUTH_KEYWORDS) {
        LogCategory::Authentication
    } else if matches_any(&path, LOOKUP_KEYWORDS) {
        LogCategory::Lookup
    } else if matches_any(&path, INTEGRATION_KEYWORDS) {
        LogCategory::Integration
    } else {
        LogCategory::System
    }
}

/// Module owning an endpoint path; falls back to [`LogModule::Unknown`]
pub fn infer_module(path: &str) -> LogModule {
    let path = path.to_lowercase();
    if matches_any(&path, AUTH_KEYWORDS) {
        LogModule::Auth
    } else if matches_any(&path, LOOKUP_KEYWORDS) {
        LogModule::Lookup
    } else if matches_any(&path, INTEGRATION_KEYWORDS) {
        // no integration module exists
        LogModule::Unknown
    } else if matches_any(&path, SYSTEM_KEYWORDS) {
        LogModule::System
    } else {
        LogModule::Unknown
    }
}

/// `[ts] [category] [module] REQUEST METHOD path | RequestId: id`
pub fn format_request_log_message(
    signature: &RequestSignature,
    metadata: Option<LogMetadata>,
) -> String {
    let metadata = metadata.unwrap_or_else(|| LogMetadata::infer(&signature.path));
    let mut line = format!(
        "[{}] [{}] [{}] REQUEST {} {}",
        format_timestamp(Utc::now()),
        metadata.category,
        metadata.module,
        signature.method,
        signature.display_path(),
    );
    if let Some(id) = &signature.request_id {
        line.push_str(&format!(" | RequestId: {id}"));
    }
    line
}

/// `[ts] [category] [module] RESPONSE [OK|ERROR] METHOD path | Status: code [Nms] | RequestId: id`
pub fn format_response_log_message(
    signature: &ResponseSignature,
    metadata: Option<LogMetadata>,
) -> String {
    let request = &signature.request;
    let metadata = metadata.unwrap_or_else(|| LogMetadata::infer(&request.path));
    let marker = if signature.is_success() { "OK" } else { "ERROR" };

    let mut line = format!(
        "[{}] [{}] [{}] RESPONSE [{}] {} {} | Status: {}",
        format_timestamp(Utc::now()),
        metadata.category,
        metadata.module,
        marker,
        request.method,
        request.display_path(),
        signature.status_code,
    );
    if let Some(duration) = signature.duration {
        line.push_str(&format!(" [{}ms]", duration.as_millis()));
    }
    if let Some(id) = &request.request_id {
        line.push_str(&format!(" | RequestId: {id}"));
    }
    line
}
