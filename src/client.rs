//! API entry point used by every feature to reach the backend
//!
//! Each call to [`ApiClient::api`]:
//! 1. Builds the absolute URL from the configured base URL and prefix
//! 2. Constructs a fresh [`FetchInterceptor`]
//! 3. Registers the authentication interceptor, then the logging pair
//! 4. Runs the chain and returns the response untouched
//!
//! No status-code handling happens here; callers inspect the response.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::auth::{authentication_interceptor, SessionProvider};
use crate::body_capture::capture_response_body;
use crate::config::{Config, MaskingConfig};
use crate::error::ApiError;
use crate::interceptor::{
    request_interceptor, response_interceptor, ApiResponse, CacheHints, CacheMode,
    FetchInterceptor, RequestInterceptor, RequestOptions, ResponseInterceptor, ReqwestTransport,
    Transport,
};
use crate::logger::{LogSink, RequestLogDetails, RequestLogger, ResponseLogDetails, TracingSink};
use crate::signature::{RequestSignature, ResponseSignature};
use crate::utils::extract_path;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Fetch-style options accepted by [`ApiClient::api`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiOptions {
    pub method: Option<Method>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub cache: Option<CacheMode>,
    pub next: Option<CacheHints>,
}

impl ApiOptions {
    pub fn get() -> Self {
        Self::with_method(Method::GET)
    }

    pub fn delete() -> Self {
        Self::with_method(Method::DELETE)
    }

    pub fn post_json<T: Serialize + ?Sized>(body: &T) -> Result<Self, ApiError> {
        Self::with_method(Method::POST).json(body)
    }

    pub fn put_json<T: Serialize + ?Sized>(body: &T) -> Result<Self, ApiError> {
        Self::with_method(Method::PUT).json(body)
    }

    pub fn patch_json<T: Serialize + ?Sized>(body: &T) -> Result<Self, ApiError> {
        Self::with_method(Method::PATCH).json(body)
    }

    pub fn with_method(method: Method) -> Self {
        Self {
            method: Some(method),
            ..Default::default()
        }
    }

    /// Serialize `body` as the JSON request body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_string(body)?);
        Ok(self)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn cache(mut self, mode: CacheMode) -> Self {
        self.cache = Some(mode);
        self
    }

    /// Cache tags used by the caller to invalidate results of this call
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.next
            .get_or_insert_with(CacheHints::default)
            .tags
            .extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn revalidate(mut self, seconds: u64) -> Self {
        self.next.get_or_insert_with(CacheHints::default).revalidate = Some(seconds);
        self
    }

    fn into_request_options(self) -> RequestOptions {
        let mut options = RequestOptions {
            method: self.method,
            headers: BTreeMap::new(),
            body: self.body,
            cache: self.cache,
            next: self.next,
        };
        // Default first, caller headers override it
        options.set_header("Content-Type", JSON_CONTENT_TYPE);
        for (name, value) in self.headers {
            options.set_header(name, value);
        }
        options
    }
}

/// What the logging interceptors write
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub masking: MaskingConfig,
    pub log_headers: bool,
    pub log_request_body: bool,
    pub log_response_body: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            masking: MaskingConfig::default(),
            log_headers: true,
            log_request_body: true,
            log_response_body: true,
        }
    }
}

#[derive(Debug, Clone)]
struct TracedRequest {
    request_id: String,
    method: Method,
    path: String,
}

/// Start time and correlation data for one call
///
/// Shared by the request- and response-phase logging interceptors of a
/// single pipeline.
#[derive(Debug)]
struct CallTrace {
    started_at: Instant,
    request: OnceLock<TracedRequest>,
}

impl CallTrace {
    fn start() -> Self {
        Self {
            started_at: Instant::now(),
            request: OnceLock::new(),
        }
    }
}

/// Build the request/response logging pair for one call.
///
/// The start instant is captured here, so create the pair right before
/// the chain runs.
pub fn create_logging_interceptor(
    options: LoggingOptions,
    sink: Arc<dyn LogSink>,
) -> (RequestInterceptor, ResponseInterceptor) {
    let trace = Arc::new(CallTrace::start());
    let logger = Arc::new(RequestLogger::new(sink).with_defaults(options.masking.clone()));
    let options = Arc::new(options);

    let on_request = {
        let trace = trace.clone();
        let logger = logger.clone();
        let options = options.clone();
        request_interceptor(move |url, request_options| {
            log_request(&trace, &logger, &options, &url, request_options.as_ref());
            async move { Ok((url, request_options)) }
        })
    };

    let on_response = response_interceptor(move |response| {
        log_response(&trace, &logger, &options, &response);
        async move { Ok(response) }
    });

    (on_request, on_response)
}

fn log_request(
    trace: &CallTrace,
    logger: &RequestLogger,
    options: &LoggingOptions,
    url: &str,
    request_options: Option<&RequestOptions>,
) {
    let method = request_options
        .map(RequestOptions::method)
        .unwrap_or(Method::GET);
    let path = extract_path(url);

    let details = RequestLogDetails {
        headers: request_options
            .filter(|_| options.log_headers)
            .map(|o| o.headers.clone()),
        body: request_options
            .filter(|_| options.log_request_body)
            .and_then(|o| o.body.clone())
            .map(Value::String),
        ..Default::default()
    };

    let signature = RequestSignature::new(method.clone(), path.clone());
    let request_id = logger.request_log(&signature, Some(&details));
    // First write wins so the response line always matches the first request line
    if trace
        .request
        .set(TracedRequest {
            request_id,
            method,
            path,
        })
        .is_err()
    {
        tracing::debug!("logging interceptor reused; keeping the first correlation id");
    }
}

fn log_response(
    trace: &CallTrace,
    logger: &RequestLogger,
    options: &LoggingOptions,
    response: &ApiResponse,
) {
    let duration = trace.started_at.elapsed();
    // No request-phase record when only the response interceptor was registered
    let request = match trace.request.get() {
        Some(traced) => RequestSignature::new(traced.method.clone(), traced.path.clone())
            .with_request_id(traced.request_id.clone()),
        None => RequestSignature::new(Method::GET, extract_path(&response.url)),
    };

    let body = if options.log_response_body {
        match capture_response_body(response) {
            Ok(body) => Some(body),
            Err(reason) => {
                tracing::debug!(?reason, "response body not logged");
                None
            }
        }
    } else {
        None
    };

    let signature = ResponseSignature::new(request, response.status).with_duration(duration);
    let details = ResponseLogDetails {
        body,
        ..Default::default()
    };
    logger.response_log(&signature, Some(&details));
}

/// Client for the appointments backend
///
/// Cheap to clone; every call builds its own pipeline, so concurrent calls
/// share nothing but the transport and the log sink.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    sessions: Arc<dyn SessionProvider>,
    sink: Arc<dyn LogSink>,
}

impl ApiClient {
    /// Client with the `reqwest` transport and `tracing` log sink
    pub fn new(config: Config, sessions: Arc<dyn SessionProvider>) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Self::with_parts(
            config,
            Arc::new(transport),
            sessions,
            Arc::new(TracingSink),
        ))
    }

    pub fn with_parts(
        config: Config,
        transport: Arc<dyn Transport>,
        sessions: Arc<dyn SessionProvider>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            config: config.into_arc(),
            transport,
            sessions,
            sink,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `base_url + prefix + path`, rejected when it is not an absolute URL
    pub fn build_url(&self, path: &str) -> Result<String, ApiError> {
        let base = self.config.get_base_url()?.trim_end_matches('/');
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let url = format!("{base}{}{path}", self.config.normalized_prefix());

        Url::parse(&url).map_err(|e| ApiError::InvalidUrl(format!("{url}: {e}")))?;
        Ok(url)
    }

    /// Call the backend at `path` through the auth + logging pipeline
    pub async fn api(&self, path: &str, options: ApiOptions) -> Result<ApiResponse, ApiError> {
        let url = self.build_url(path)?;
        if self.config.debug {
            tracing::debug!(%url, method = ?options.method, "dispatching API call");
        }

        let logging = LoggingOptions {
            masking: self.config.masking.clone(),
            ..Default::default()
        };

        let mut chain = FetchInterceptor::new(self.transport.clone());
        chain.use_request_interceptor(authentication_interceptor(self.sessions.clone()));
        let (on_request, on_response) = create_logging_interceptor(logging, self.sink.clone());
        chain.use_request_interceptor(on_request);
        chain.use_response_interceptor(on_response);

        chain
            .intercept_fetch(url, Some(options.into_request_options()))
            .await
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.api(path, ApiOptions::get()).await
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ApiResponse, ApiError> {
        self.api(path, ApiOptions::post_json(body)?).await
    }

    pub async fn put<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ApiResponse, ApiError> {
        self.api(path, ApiOptions::put_json(body)?).await
    }

    pub async fn patch<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ApiResponse, ApiError> {
        self.api(path, ApiOptions::patch_json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.api(path, ApiOptions::delete()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Session, StaticSessionProvider};
    use crate::interceptor::tests::RecordingTransport;
    use crate::logger::MemorySink;
    use serde_json::json;

    fn client_with(
        session: Option<Session>,
        response: ApiResponse,
    ) -> (ApiClient, Arc<RecordingTransport>, Arc<MemorySink>) {
        let transport = Arc::new(RecordingTransport::responding(response));
        let sink = Arc::new(MemorySink::new());
        let client = ApiClient::with_parts(
            Config::new(Some("http://backend.local/".to_string()), Some("api".to_string())),
            transport.clone(),
            Arc::new(StaticSessionProvider::new(session)),
            sink.clone(),
        );
        (client, transport, sink)
    }

    #[test]
    fn test_build_url() {
        let (client, _, _) = client_with(None, ApiResponse::new(200, ""));
        assert_eq!(client.build_url("/rooms").unwrap(), "http://backend.local/api/rooms");
        assert_eq!(client.build_url("rooms/1").unwrap(), "http://backend.local/api/rooms/1");
    }

    #[tokio::test]
    async fn test_relative_base_url_is_rejected_before_any_call() {
        let transport = Arc::new(RecordingTransport::responding(ApiResponse::new(200, "")));
        let client = ApiClient::with_parts(
            Config::new(Some("backend.local".to_string()), None),
            transport.clone(),
            Arc::new(StaticSessionProvider::anonymous()),
            Arc::new(MemorySink::new()),
        );

        assert!(matches!(client.build_url("/rooms"), Err(ApiError::InvalidUrl(_))));
        let result = client.get("/rooms").await;
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_base_url_fails_before_any_call() {
        let transport = Arc::new(RecordingTransport::responding(ApiResponse::new(200, "")));
        let client = ApiClient::with_parts(
            Config::new(None, None),
            transport.clone(),
            Arc::new(StaticSessionProvider::anonymous()),
            Arc::new(MemorySink::new()),
        );

        let result = client.get("/rooms").await;
        assert!(matches!(result, Err(ApiError::MissingConfig)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_api_injects_token_and_logs_pair() {
        let response = ApiResponse::new(201, r#"{"id":"c1","password":"x"}"#)
            .with_header("content-type", "application/json");
        let (client, transport, sink) = client_with(Some(Session::with_token("jwt-1")), response);

        let body = json!({"name": "Ana", "password": "p@ss"});
        let res = client.post("/customers?token=secret123", &body).await.unwrap();
        assert_eq!(res.status, 201);
        assert_eq!(res.json::<Value>().unwrap()["password"], "x");

        let calls = transport.calls();
        let (url, options) = &calls[0];
        assert_eq!(url, "http://backend.local/api/customers?token=secret123");
        let options = options.as_ref().unwrap();
        assert_eq!(options.header("authorization"), Some("Bearer jwt-1"));
        assert_eq!(options.header("content-type"), Some(JSON_CONTENT_TYPE));
        assert_eq!(options.method(), Method::POST);

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        let request_line = &lines[0];
        assert!(request_line.contains("REQUEST POST /api/customers?token=****"));
        assert!(request_line.contains(r#""Authorization":"****""#));
        assert!(request_line.contains(r#""password":"****""#));
        assert!(!request_line.contains("jwt-1"));
        assert!(!request_line.contains("p@ss"));
        assert!(!request_line.contains("secret123"));

        let response_line = &lines[1];
        assert!(response_line.contains("RESPONSE [OK] POST /api/customers?token=****"));
        assert!(response_line.contains("Status: 201"));
        assert!(response_line.contains(r#"| Body: {"id":"c1","password":"****"}"#));

        let id = request_line.split("RequestId: ").nth(1).unwrap();
        let id = id.split(' ').next().unwrap();
        assert!(response_line.contains(&format!("RequestId: {id}")));
    }

    #[tokio::test]
    async fn test_anonymous_call_has_no_authorization() {
        let (client, transport, _) = client_with(None, ApiResponse::new(200, ""));
        client.get("/rooms/5/available-times?date=2024-05-01").await.unwrap();

        let options = transport.calls()[0].1.clone().unwrap();
        assert!(options.header("authorization").is_none());
    }

    #[tokio::test]
    async fn test_unparsable_response_body_still_logs_line() {
        let response =
            ApiResponse::new(500, "<html>gateway</html>").with_header("content-type", "application/json");
        let (client, _, sink) = client_with(None, response);

        let res = client.get("/logs").await.unwrap();
        assert_eq!(res.status, 500);

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("[ERROR]"));
        assert!(lines[1].contains("Status: 500"));
        assert!(!lines[1].contains("Body:"));
    }

    #[tokio::test]
    async fn test_caller_headers_and_cache_hints_pass_through() {
        let (client, transport, _) = client_with(None, ApiResponse::new(200, ""));
        let options = ApiOptions::get()
            .header("content-type", "text/plain")
            .header("X-Portal", "admin")
            .tags(["rooms"])
            .revalidate(60)
            .cache(CacheMode::NoStore);
        client.api("/rooms", options).await.unwrap();

        let sent = transport.calls()[0].1.clone().unwrap();
        assert_eq!(sent.header("Content-Type"), Some("text/plain"));
        assert_eq!(sent.header("x-portal"), Some("admin"));
        assert_eq!(sent.cache, Some(CacheMode::NoStore));
        let hints = sent.next.unwrap();
        assert_eq!(hints.tags, vec!["rooms".to_string()]);
        assert_eq!(hints.revalidate, Some(60));
    }

    #[tokio::test]
    async fn test_transport_failure_logs_request_only() {
        let transport = Arc::new(RecordingTransport::default());
        let sink = Arc::new(MemorySink::new());
        let client = ApiClient::with_parts(
            Config::new(Some("http://backend.local".to_string()), None),
            transport,
            Arc::new(StaticSessionProvider::anonymous()),
            sink.clone(),
        );

        assert!(client.delete("/appointments/9").await.is_err());
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("REQUEST DELETE /appointments/9"));
    }

    #[tokio::test]
    async fn test_logging_pair_measures_duration_from_creation() {
        let sink = Arc::new(MemorySink::new());
        let (on_request, on_response) =
            create_logging_interceptor(LoggingOptions::default(), sink.clone());

        tokio::time::sleep(std::time::Duration::from_millis(15)).await;
        on_request("http://backend.local/health".to_string(), None).await.unwrap();
        on_response(ApiResponse::new(204, "")).await.unwrap();

        let lines = sink.lines();
        assert!(lines[0].contains("REQUEST GET /health"));
        let millis: u128 = lines[1]
            .split(" [")
            .find_map(|part| part.split_once("ms]").and_then(|(ms, _)| ms.parse().ok()))
            .unwrap();
        assert!(millis >= 15);
    }

    #[tokio::test]
    async fn test_concurrent_calls_get_distinct_ids() {
        let (client, _, sink) = client_with(None, ApiResponse::new(200, ""));
        let (a, b) = tokio::join!(client.get("/rooms"), client.get("/customers"));
        a.unwrap();
        b.unwrap();

        let ids: std::collections::HashSet<String> = sink
            .lines()
            .iter()
            .filter_map(|line| line.split("RequestId: ").nth(1))
            .filter_map(|rest| rest.split(' ').next().map(str::to_string))
            .collect();
        assert_eq!(sink.lines().len(), 4);
        assert_eq!(ids.len(), 2);
    }
}
