//! Bearer-token injection for outbound calls
//!
//! The session itself belongs to the identity provider; this module only
//! asks "is there a session, and does it carry an access token?".

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::interceptor::{request_interceptor, RequestInterceptor, RequestOptions};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Option<String>,
    pub role: Option<String>,
    pub access_token: Option<String>,
}

/// Session issued by the identity provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
}

impl Session {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            user: SessionUser {
                access_token: Some(token.into()),
                ..Default::default()
            },
        }
    }

    /// Access token, if present and non-empty
    pub fn access_token(&self) -> Option<&str> {
        self.user
            .access_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

/// Source of the current session
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_session(&self) -> Option<Session>;
}

/// Always returns the same session (or none)
#[derive(Debug, Clone, Default)]
pub struct StaticSessionProvider {
    session: Option<Session>,
}

impl StaticSessionProvider {
    pub fn new(session: Option<Session>) -> Self {
        Self { session }
    }

    pub fn anonymous() -> Self {
        Self { session: None }
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn current_session(&self) -> Option<Session> {
        self.session.clone()
    }
}

/// Attach `Authorization: Bearer <token>` when the current session has a token.
///
/// Without a session or token the inputs are returned untouched.
pub async fn authenticate(
    provider: &dyn SessionProvider,
    url: String,
    options: Option<RequestOptions>,
) -> (String, Option<RequestOptions>) {
    let session = provider.current_session().await;
    let Some(token) = session.as_ref().and_then(Session::access_token) else {
        return (url, options);
    };

    let mut options = options.unwrap_or_default();
    options.set_header("Authorization", format!("Bearer {token}"));
    (url, Some(options))
}

/// Request interceptor wrapping [`authenticate`]
pub fn authentication_interceptor(provider: Arc<dyn SessionProvider>) -> RequestInterceptor {
    request_interceptor(move |url, options| {
        let provider = provider.clone();
        async move { Ok(authenticate(provider.as_ref(), url, options).await) }
    })
}
