//! Masked request/response logging
//!
//! [`RequestLogger`] writes exactly one line per request and one per
//! response. Both lines carry the same correlation id so interleaved calls
//! can be told apart in the sink. Query parameters, headers and bodies are
//! masked before anything reaches the sink.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::body_capture::{truncate_body, MAX_BODY_SIZE};
use crate::config::MaskingConfig;
use crate::signature::{
    format_request_log_message, format_response_log_message, LogMetadata, RequestSignature,
    ResponseSignature,
};
use crate::utils::{
    extract_query_params, generate_request_id, mask_body_fields, mask_headers, mask_query_params,
    QueryParams,
};

/// Target used for lines written by [`TracingSink`]
pub const HTTP_LOG_TARGET: &str = "appointments_api::http";

/// Severity of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
}

/// Destination for composed log lines
pub trait LogSink: Send + Sync {
    fn emit(&self, level: LogLevel, line: &str);
}

/// Writes lines through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, level: LogLevel, line: &str) {
        match level {
            LogLevel::Info => tracing::info!(target: HTTP_LOG_TARGET, "{}", line),
            LogLevel::Warn => tracing::warn!(target: HTTP_LOG_TARGET, "{}", line),
        }
    }
}

/// Keeps lines in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, line)| line).collect()
    }

    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LogSink for MemorySink {
    fn emit(&self, level: LogLevel, line: &str) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push((level, line.to_string()));
    }
}

/// Optional extras for a request line
#[derive(Debug, Clone, Default)]
pub struct RequestLogDetails {
    pub headers: Option<BTreeMap<String, String>>,
    /// A `Value::String` is treated as an already-serialized body
    pub body: Option<Value>,
    pub sensitive_headers: Option<Vec<String>>,
    pub sensitive_query_params: Option<Vec<String>>,
    pub sensitive_body_fields: Option<Vec<String>>,
    pub metadata: Option<LogMetadata>,
}

/// Optional extras for a response line
#[derive(Debug, Clone, Default)]
pub struct ResponseLogDetails {
    pub body: Option<Value>,
    pub sensitive_query_params: Option<Vec<String>>,
    pub sensitive_body_fields: Option<Vec<String>>,
    pub metadata: Option<LogMetadata>,
}

pub struct RequestLogger {
    sink: Arc<dyn LogSink>,
    defaults: MaskingConfig,
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl RequestLogger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            defaults: MaskingConfig::default(),
        }
    }

    /// Use `masking` whenever a call's details do not name their own lists
    pub fn with_defaults(mut self, masking: MaskingConfig) -> Self {
        self.defaults = masking;
        self
    }

    /// Emit the request line and return the new correlation id.
    ///
    /// The caller passes the returned id into the matching
    /// [`RequestLogger::response_log`] call.
    pub fn request_log(
        &self,
        signature: &RequestSignature,
        details: Option<&RequestLogDetails>,
    ) -> String {
        let request_id = generate_request_id();
        let empty = RequestLogDetails::default();
        let details = details.unwrap_or(&empty);

        let query_names = details
            .sensitive_query_params
            .as_deref()
            .unwrap_or(self.defaults.sensitive_query_params.as_slice());
        let masked = RequestSignature {
            query_params: masked_query(signature, query_names),
            request_id: Some(request_id.clone()),
            ..signature.clone()
        };

        let metadata = details
            .metadata
            .unwrap_or_else(|| LogMetadata::infer(&signature.path));
        let mut line = format_request_log_message(&masked, Some(metadata));

        if let Some(headers) = &details.headers {
            let header_names = details
                .sensitive_headers
                .as_deref()
                .unwrap_or(self.defaults.sensitive_headers.as_slice());
            let headers = mask_headers(headers, header_names);
            let rendered = serde_json::to_string(&headers).unwrap_or_default();
            line.push_str(&format!(" | Headers: {rendered}"));
        }

        if let Some(body) = &details.body {
            let body_names = details
                .sensitive_body_fields
                .as_deref()
                .unwrap_or(self.defaults.sensitive_body_fields.as_slice());
            line.push_str(&format!(" | Body: {}", render_body(body, body_names)));
        }

        self.sink.emit(LogLevel::Info, &line);
        request_id
    }

    /// Emit the response line for a call started with [`RequestLogger::request_log`]
    pub fn response_log(&self, signature: &ResponseSignature, details: Option<&ResponseLogDetails>) {
        let empty = ResponseLogDetails::default();
        let details = details.unwrap_or(&empty);

        let query_names = details
            .sensitive_query_params
            .as_deref()
            .unwrap_or(self.defaults.sensitive_query_params.as_slice());
        let masked = ResponseSignature {
            request: RequestSignature {
                query_params: masked_query(&signature.request, query_names),
                ..signature.request.clone()
            },
            ..signature.clone()
        };

        let metadata = details
            .metadata
            .unwrap_or_else(|| LogMetadata::infer(&signature.request.path));
        let mut line = format_response_log_message(&masked, Some(metadata));

        if let Some(body) = &details.body {
            let body_names = details
                .sensitive_body_fields
                .as_deref()
                .unwrap_or(self.defaults.sensitive_body_fields.as_slice());
            line.push_str(&format!(" | Body: {}", render_body(body, body_names)));
        }

        let level = if signature.is_success() {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };
        self.sink.emit(level, &line);
    }
}

fn masked_query(
    signature: &RequestSignature,
    sensitive_names: &[String],
) -> Option<QueryParams> {
    let params = signature
        .query_params
        .clone()
        .or_else(|| extract_query_params(&signature.path));
    mask_query_params(params.as_ref(), sensitive_names)
}

/// Masked body text, capped at [`MAX_BODY_SIZE`] after masking
fn render_body(body: &Value, sensitive_names: &[String]) -> String {
    let rendered = match mask_body_fields(body, sensitive_names) {
        Value::String(text) => text,
        other => serde_json::to_string(&other).unwrap_or_default(),
    };
    truncate_body(&rendered, MAX_BODY_SIZE)
}
