//! Interceptor chain wrapped around a single HTTP call
//!
//! [`FetchInterceptor`] runs its request interceptors in registration order,
//! performs the network call through a [`Transport`], then runs its response
//! interceptors in registration order. Errors are never swallowed here:
//! whatever an interceptor or the transport returns as `Err` reaches the
//! caller unchanged.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Transforms the outgoing URL and options
pub type RequestInterceptor = Box<
    dyn Fn(
            String,
            Option<RequestOptions>,
        ) -> BoxFuture<'static, Result<(String, Option<RequestOptions>), ApiError>>
        + Send
        + Sync,
>;

/// Transforms the response returned by the transport
pub type ResponseInterceptor =
    Box<dyn Fn(ApiResponse) -> BoxFuture<'static, Result<ApiResponse, ApiError>> + Send + Sync>;

/// Box an async closure as a [`RequestInterceptor`]
pub fn request_interceptor<F, Fut>(f: F) -> RequestInterceptor
where
    F: Fn(String, Option<RequestOptions>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(String, Option<RequestOptions>), ApiError>> + Send + 'static,
{
    Box::new(move |url: String, options: Option<RequestOptions>| f(url, options).boxed())
}

/// Box an async closure as a [`ResponseInterceptor`]
pub fn response_interceptor<F, Fut>(f: F) -> ResponseInterceptor
where
    F: Fn(ApiResponse) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ApiResponse, ApiError>> + Send + 'static,
{
    Box::new(move |response: ApiResponse| f(response).boxed())
}

/// Fetch-style cache mode hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Default,
    NoStore,
    Reload,
    NoCache,
    ForceCache,
    OnlyIfCached,
}

/// Cache invalidation hints consumed by the caller's cache layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheHints {
    pub tags: Vec<String>,
    /// Seconds before a cached result goes stale
    pub revalidate: Option<u64>,
}

/// Options for one outbound request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// `GET` when unset
    pub method: Option<Method>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub cache: Option<CacheMode>,
    pub next: Option<CacheHints>,
}

impl RequestOptions {
    pub fn method(&self) -> Method {
        self.method.clone().unwrap_or(Method::GET)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any existing header with the same name in any case
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }
}

/// Fully buffered HTTP response
///
/// The body is held as [`Bytes`], so cloning the response to inspect its
/// body leaves the caller's copy intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    /// Header names are lowercase
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    pub url: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
            url: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Performs the actual network call
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        options: Option<&RequestOptions>,
    ) -> Result<ApiResponse, ApiError>;
}

/// [`Transport`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(
        &self,
        url: &str,
        options: Option<&RequestOptions>,
    ) -> Result<ApiResponse, ApiError> {
        let method = options.map(RequestOptions::method).unwrap_or(Method::GET);
        let mut request = self.client.request(method, url);

        if let Some(options) = options {
            for (name, value) in &options.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &options.body {
                request = request.body(body.clone());
            }
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(ApiResponse {
            status,
            headers,
            body,
            url: final_url,
        })
    }
}

/// Ordered request/response interceptor pipeline around one [`Transport`]
///
/// Interceptors cannot be removed once registered; build a fresh instance
/// per call.
pub struct FetchInterceptor {
    transport: Arc<dyn Transport>,
    request_interceptors: Vec<RequestInterceptor>,
    response_interceptors: Vec<ResponseInterceptor>,
}

impl FetchInterceptor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
        }
    }

    pub fn use_request_interceptor(&mut self, interceptor: RequestInterceptor) {
        self.request_interceptors.push(interceptor);
    }

    pub fn use_response_interceptor(&mut self, interceptor: ResponseInterceptor) {
        self.response_interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.request_interceptors.len() + self.response_interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run request interceptors, the network call, then response interceptors.
    ///
    /// An interceptor returning `None` options keeps the previous options.
    pub async fn intercept_fetch(
        &self,
        url: impl Into<String>,
        options: Option<RequestOptions>,
    ) -> Result<ApiResponse, ApiError> {
        let mut url = url.into();
        let mut options = options;

        // Registration order; errors propagate and stop the chain
        for interceptor in &self.request_interceptors {
            let (next_url, next_options) = interceptor(url, options.clone()).await?;
            url = next_url;
            // `None` keeps the options from the previous step
            if next_options.is_some() {
                options = next_options;
            }
        }

        let mut response = self.transport.fetch(&url, options.as_ref()).await?;

        // Each response interceptor sees the previous one's output
        for interceptor in &self.response_interceptors {
            response = interceptor(response).await?;
        }

        Ok(response)
    }
}
