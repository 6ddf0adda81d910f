//! Utility functions for building safe log lines
//!
//! Path and query extraction, sensitive-value masking, correlation ids and
//! timestamps. Every function here is total: malformed input degrades to the
//! original value, `None`, or an empty result instead of an error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use url::{form_urlencoded, Url};
use uuid::Uuid;

/// Replacement string used for every masked value.
pub const MASK: &str = "****";

/// America/Sao_Paulo has been fixed at UTC-03:00 since DST was abolished in 2019.
const SAO_PAULO_OFFSET_HOURS: i64 = 3;

/// Ordered query parameter map.
///
/// Keeps insertion order for display. Inserting an existing key replaces
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Generate a unique correlation id for pairing request and response lines
///
/// Uses UUID v4.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Format a timestamp in Sao Paulo local time as `DD/MM/YYYY HH:MM:SS.mmm`
pub fn format_timestamp(date: DateTime<Utc>) -> String {
    let local = date.naive_utc() - chrono::Duration::hours(SAO_PAULO_OFFSET_HOURS);
    local.format("%d/%m/%Y %H:%M:%S%.3f").to_string()
}

/// Current time, formatted with [`format_timestamp`]
pub fn current_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Return `pathname + search` of an absolute URL.
///
/// Input that does not parse as a URL (e.g. an already-relative path) is
/// returned unchanged.
pub fn extract_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) if !query.is_empty() => format!("{}?{}", parsed.path(), query),
            _ => parsed.path().to_string(),
        },
        Err(_) => url.to_string(),
    }
}

/// Everything before the first `?`
pub fn extract_path_without_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(before, _)| before)
}

/// Parse the query string of a path into decoded key/value pairs.
///
/// Only the segment between the first and second `?` is read. Pairs without
/// `=` or with an empty key are skipped. Returns `None` when there is no
/// query, no usable pair, or a component has a malformed `%` escape or
/// does not decode to UTF-8.
pub fn extract_query_params(path: &str) -> Option<QueryParams> {
    let query = path.split('?').nth(1)?;
    if query.is_empty() {
        return None;
    }

    let mut params = QueryParams::new();
    for pair in query.split('&') {
        let Some((raw_key, raw_value)) = pair.split_once('=') else {
            continue;
        };
        if raw_key.is_empty() {
            continue;
        }
        let key = decode_component(raw_key)?;
        let value = decode_component(raw_value)?;
        params.insert(key, value);
    }

    if params.is_empty() {
        None
    } else {
        Some(params)
    }
}

/// Strict percent-decoding: every `%` must start a two-hex-digit escape and
/// the result must be UTF-8.
fn decode_component(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    for (i, _) in raw.match_indices('%') {
        // `%` at the end or followed by anything but two hex digits
        let escape = bytes.get(i + 1..i + 3)?;
        if !escape.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
    }
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// True when any sensitive name is a case-insensitive substring of `key`
pub fn is_sensitive_key(key: &str, sensitive_names: &[String]) -> bool {
    let key = key.to_lowercase();
    sensitive_names
        .iter()
        .any(|name| key.contains(&name.to_lowercase()))
}

/// Replace the values of sensitive query parameters with [`MASK`]
pub fn mask_query_params(
    params: Option<&QueryParams>,
    sensitive_names: &[String],
) -> Option<QueryParams> {
    params.map(|params| {
        params
            .iter()
            .map(|(k, v)| {
                let value = if is_sensitive_key(k, sensitive_names) {
                    MASK
                } else {
                    v
                };
                (k.to_string(), value.to_string())
            })
            .collect()
    })
}

/// Replace the values of sensitive headers with [`MASK`]
pub fn mask_headers(
    headers: &BTreeMap<String, String>,
    sensitive_names: &[String],
) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            let value = if is_sensitive_key(k, sensitive_names) {
                MASK.to_string()
            } else {
                v.clone()
            };
            (k.clone(), value)
        })
        .collect()
}

/// Mask sensitive fields of a JSON body.
///
/// A string body is treated as serialized JSON: it is parsed, masked and
/// serialized back into a string, or returned unchanged if it does not parse.
/// Any other value is masked recursively and returned as a value.
pub fn mask_body_fields(body: &Value, sensitive_names: &[String]) -> Value {
    match body {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed) => {
                let masked = mask_value(&parsed, sensitive_names);
                match serde_json::to_string(&masked) {
                    Ok(serialized) => Value::String(serialized),
                    Err(_) => body.clone(),
                }
            }
            // not JSON, log as-is
            Err(_) => body.clone(),
        },
        other => mask_value(other, sensitive_names),
    }
}

fn mask_value(value: &Value, sensitive_names: &[String]) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| mask_value(item, sensitive_names))
                .collect(),
        ),
        Value::Object(fields) => {
            let mut masked = Map::with_capacity(fields.len());
            for (key, field) in fields {
                // Sensitive keys hide the whole subtree, nested or not
                let field = if is_sensitive_key(key, sensitive_names) {
                    Value::String(MASK.to_string())
                } else {
                    mask_value(field, sensitive_names)
                };
                masked.insert(key.clone(), field);
            }
            Value::Object(masked)
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
    }
}

/// Rebuild `path` with only the masked parameters as its query string.
///
/// Parameters of the original query that are absent from `masked_params`
/// are dropped.
pub fn rebuild_path_with_masked_params(path: &str, masked_params: &QueryParams) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in masked_params.iter() {
        serializer.append_pair(k, v);
    }
    format!(
        "{}?{}",
        extract_path_without_query(path),
        serializer.finish()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_generate_request_id() {
        let id1 = generate_request_id();
        let id2 = generate_request_id();

        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36);
        assert!(Uuid::parse_str(&id1).is_ok());
    }

    #[test]
    fn test_format_timestamp_sao_paulo() {
        let date = Utc.with_ymd_and_hms(2024, 1, 15, 13, 30, 5).unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(format_timestamp(date), "15/01/2024 10:30:05.042");
    }

    #[test]
    fn test_format_timestamp_crosses_midnight() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 1, 0, 0).unwrap();
        assert_eq!(format_timestamp(date), "29/02/2024 22:00:00.000");
    }

    #[test]
    fn test_current_timestamp_is_single_line() {
        let ts = current_timestamp();
        assert!(!ts.contains('\n'));
        assert_eq!(ts.len(), "DD/MM/YYYY HH:MM:SS.mmm".len());
    }

    #[test]
    fn test_extract_path_with_query() {
        assert_eq!(
            extract_path("https://api.example.com/api/customers?page=2&limit=10#top"),
            "/api/customers?page=2&limit=10"
        );
    }

    #[test]
    fn test_extract_path_without_query_string() {
        assert_eq!(extract_path("http://localhost:3333/rooms"), "/rooms");
        assert_eq!(extract_path("http://localhost:3333/rooms?"), "/rooms");
    }

    #[test]
    fn test_extract_path_unparseable_passthrough() {
        assert_eq!(extract_path("/customers?token=x"), "/customers?token=x");
        assert_eq!(extract_path("not a url"), "not a url");
    }

    #[test]
    fn test_extract_path_without_query() {
        assert_eq!(extract_path_without_query("/x?a=1?b=2"), "/x");
        assert_eq!(extract_path_without_query("/x"), "/x");
    }

    #[test]
    fn test_extract_query_params_decodes() {
        let params = extract_query_params("/search?name=Jo%C3%A3o%20Silva&city=S%C3%A3o+Paulo").unwrap();
        assert_eq!(params.get("name"), Some("João Silva"));
        // '+' is not a space outside form decoding
        assert_eq!(params.get("city"), Some("São+Paulo"));
    }

    #[test]
    fn test_extract_query_params_splits_on_first_equals() {
        let params = extract_query_params("/x?filter=a=b&empty=").unwrap();
        assert_eq!(params.get("filter"), Some("a=b"));
        assert_eq!(params.get("empty"), Some(""));
    }

    #[test]
    fn test_extract_query_params_skips_malformed_pairs() {
        let params = extract_query_params("/x?flag&=orphan&page=1").unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("page"), Some("1"));
        assert!(!params.contains_key("flag"));
    }

    #[test]
    fn test_extract_query_params_none_cases() {
        assert_eq!(extract_query_params("/x"), None);
        assert_eq!(extract_query_params("/x?"), None);
        assert_eq!(extract_query_params("/x?flag&other"), None);
        // invalid UTF-8 after decoding
        assert_eq!(extract_query_params("/x?a=%FF"), None);
    }

    #[test]
    fn test_extract_query_params_malformed_escape_is_none() {
        assert_eq!(extract_query_params("/x?token=abc&q=%ZZ"), None);
        assert_eq!(extract_query_params("/x?q=100%"), None);
        assert_eq!(extract_query_params("/x?q=%4"), None);
        assert_eq!(extract_query_params("/x?%zz=1"), None);

        // well-formed escapes still decode
        let params = extract_query_params("/x?q=100%25&name=Jo%C3%A3o").unwrap();
        assert_eq!(params.get("q"), Some("100%"));
        assert_eq!(params.get("name"), Some("João"));
    }

    #[test]
    fn test_extract_query_params_round_trips_extract_path() {
        let url = "https://api.example.com/rooms/5/available-times?date=2024-05-01&duration=30";
        let params = extract_query_params(&extract_path(url)).unwrap();
        assert_eq!(params.get("date"), Some("2024-05-01"));
        assert_eq!(params.get("duration"), Some("30"));
    }

    #[test]
    fn test_mask_query_params_case_insensitive_substring() {
        let params: QueryParams = [("accessToken", "abc"), ("page", "1"), ("API_KEY", "k")]
            .into_iter()
            .collect();
        let masked = mask_query_params(Some(&params), &names(&["token", "api_key"])).unwrap();

        assert_eq!(masked.get("accessToken"), Some(MASK));
        assert_eq!(masked.get("API_KEY"), Some(MASK));
        assert_eq!(masked.get("page"), Some("1"));
    }

    #[test]
    fn test_mask_query_params_none_passthrough() {
        assert_eq!(mask_query_params(None, &names(&["token"])), None);
    }

    #[test]
    fn test_mask_headers() {
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer abc".to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        let masked = mask_headers(&headers, &names(&["authorization"]));
        assert_eq!(masked["Authorization"], MASK);
        assert_eq!(masked["Content-Type"], "application/json");
        // input untouched
        assert_eq!(headers["Authorization"], "Bearer abc");
    }

    #[test]
    fn test_mask_body_fields_object() {
        let body = json!({"email": "a@b.com", "password": "p@ss"});
        let masked = mask_body_fields(&body, &names(&["password"]));

        assert_eq!(masked, json!({"email": "a@b.com", "password": "****"}));
        assert_eq!(body["password"], "p@ss");
    }

    #[test]
    fn test_mask_body_fields_nested_and_arrays() {
        let body = json!({
            "user": {"name": "Ana", "credentials": {"refresh_token": "r1"}},
            "items": [{"apiKey": "k1", "id": 1}, "plain", null],
            "auth": {"token": {"nested": true}}
        });
        let masked = mask_body_fields(&body, &names(&["token", "apikey", "auth"]));

        assert_eq!(masked["user"]["name"], "Ana");
        assert_eq!(masked["user"]["credentials"]["refresh_token"], MASK);
        assert_eq!(masked["items"][0]["apiKey"], MASK);
        assert_eq!(masked["items"][0]["id"], 1);
        assert_eq!(masked["items"][1], "plain");
        assert_eq!(masked["items"][2], Value::Null);
        // whole object replaced when the key itself matches
        assert_eq!(masked["auth"], MASK);
    }

    #[test]
    fn test_mask_body_fields_json_string() {
        let body = Value::String(r#"{"email":"a@b.com","password":"p@ss"}"#.to_string());
        let masked = mask_body_fields(&body, &names(&["password"]));

        let Value::String(serialized) = masked else {
            panic!("string body must stay a string");
        };
        let reparsed: Value = serde_json::from_str(&serialized).unwrap();
        assert_eq!(reparsed, json!({"email": "a@b.com", "password": "****"}));
    }

    #[test]
    fn test_mask_body_fields_unparsable_string() {
        let body = Value::String("password=hunter2".to_string());
        assert_eq!(mask_body_fields(&body, &names(&["password"])), body);
    }

    #[test]
    fn test_mask_body_fields_primitives_and_null() {
        let sensitive = names(&["password"]);
        assert_eq!(mask_body_fields(&Value::Null, &sensitive), Value::Null);
        assert_eq!(mask_body_fields(&json!(42), &sensitive), json!(42));
        assert_eq!(mask_body_fields(&json!([true]), &sensitive), json!([true]));
    }

    #[test]
    fn test_mask_body_fields_idempotent() {
        let sensitive = names(&["password", "token"]);
        let body = json!({"password": {"old": "a"}, "list": [{"token": 1}]});
        let once = mask_body_fields(&body, &sensitive);
        let twice = mask_body_fields(&once, &sensitive);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_rebuild_path_drops_unmasked_keys() {
        // Only keys present in the masked map survive, by contract
        let masked: QueryParams = [("token", MASK)].into_iter().collect();
        assert_eq!(
            rebuild_path_with_masked_params("/x?token=abc&name=john", &masked),
            "/x?token=****"
        );
    }

    #[test]
    fn test_rebuild_path_encodes_values() {
        let masked: QueryParams = [("q", "São Paulo"), ("page", "2")].into_iter().collect();
        assert_eq!(
            rebuild_path_with_masked_params("/customers", &masked),
            "/customers?q=S%C3%A3o+Paulo&page=2"
        );
    }

    #[test]
    fn test_query_params_insert_overwrites_in_place() {
        let mut params = QueryParams::new();
        params.insert("a", "1");
        params.insert("b", "2");
        params.insert("a", "3");

        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }
}
