//! Response body capture for the logging interceptor
//!
//! Reads a copy of the buffered response body so it can be masked and
//! logged. Only text-based content types are captured, and capture
//! failures are reported as "no body" rather than as errors.

use serde_json::Value;

use crate::interceptor::ApiResponse;

/// Maximum body size to capture (10KB)
pub const MAX_BODY_SIZE: usize = 10 * 1024;

const TRUNCATED_SUFFIX: &str = "...[truncated]";

/// Why a body was not captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSkip {
    /// Empty body
    Empty,
    /// Binary or missing content type
    NotText,
    /// Body is not valid UTF-8
    InvalidUtf8,
    /// Declared JSON that failed to parse
    MalformedJson(String),
}

/// Captures the response body for logging
///
/// JSON bodies come back as parsed values so their fields can be masked;
/// other text bodies come back as `Value::String`, truncated to
/// [`MAX_BODY_SIZE`].
pub fn capture_response_body(response: &ApiResponse) -> Result<Value, CaptureSkip> {
    if response.body.is_empty() {
        return Err(CaptureSkip::Empty);
    }

    let content_type = response.content_type().map(str::to_lowercase);
    if !should_capture_body(content_type.as_deref()) {
        return Err(CaptureSkip::NotText);
    }

    let text = std::str::from_utf8(&response.body).map_err(|_| CaptureSkip::InvalidUtf8)?;

    if content_type.as_deref().is_some_and(|ct| ct.contains("json")) {
        return serde_json::from_str::<Value>(text)
            .map_err(|e| CaptureSkip::MalformedJson(e.to_string()));
    }

    Ok(Value::String(truncate_body(text, MAX_BODY_SIZE)))
}

/// Checks if a body should be captured based on Content-Type
///
/// Returns true for text-based formats only (JSON, XML, form data, plain text)
pub fn should_capture_body(content_type: Option<&str>) -> bool {
    let content_type = match content_type {
        Some(ct) => ct.to_lowercase(),
        None => return false, // No content-type, assume binary
    };

    content_type.contains("json")
        || content_type.contains("application/xml")
        || content_type.contains("application/x-www-form-urlencoded")
        || content_type.contains("text/")
        || content_type.contains("application/graphql")
}

/// Truncate text to at most `max_len` bytes on a char boundary
pub fn truncate_body(body: &str, max_len: usize) -> String {
    if body.len() <= max_len {
        return body.to_string();
    }
    let mut end = max_len;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &body[..end], TRUNCATED_SUFFIX)
}
