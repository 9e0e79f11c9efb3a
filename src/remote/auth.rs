//! Credentials handed to the HTTP backends by the host's auth layer.

use std::future::Future;
use std::sync::RwLock;

use tracing::info;

use crate::error::{NotesyncError, Result};

#[derive(Clone, PartialEq, Eq)]
pub enum AuthHeader {
    Bearer(String),
    Basic { username: String, password: String },
    Anonymous,
}

impl AuthHeader {
    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            AuthHeader::Bearer(token) => request.bearer_auth(token),
            AuthHeader::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            AuthHeader::Anonymous => request,
        }
    }
}

impl std::fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthHeader::Bearer(_) => write!(f, "Bearer(***)"),
            AuthHeader::Basic { username, .. } => write!(f, "Basic({}, ***)", username),
            AuthHeader::Anonymous => write!(f, "Anonymous"),
        }
    }
}

/// Source of the header attached to backend requests.
///
/// `refresh` is called at most once per failed request, after the backend
/// rejected the header returned by `current`.
pub trait Credentials: Send + Sync {
    fn current(&self) -> Result<AuthHeader>;
    fn refresh(&self) -> Result<AuthHeader>;
}

/// Fixed credentials. Refreshing hands back the same header.
#[derive(Debug, Clone)]
pub struct StaticCredentials(AuthHeader);

impl StaticCredentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self(AuthHeader::Bearer(token.into()))
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self(AuthHeader::Basic {
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn anonymous() -> Self {
        Self(AuthHeader::Anonymous)
    }
}

impl Credentials for StaticCredentials {
    fn current(&self) -> Result<AuthHeader> {
        Ok(self.0.clone())
    }

    fn refresh(&self) -> Result<AuthHeader> {
        Ok(self.0.clone())
    }
}

type TokenRefresher = Box<dyn Fn() -> Result<String> + Send + Sync>;

/// A bearer token the host can renew, e.g. by running an OAuth refresh grant.
pub struct RefreshableToken {
    token: RwLock<String>,
    refresher: TokenRefresher,
}

impl RefreshableToken {
    pub fn new(
        token: impl Into<String>,
        refresher: impl Fn() -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            token: RwLock::new(token.into()),
            refresher: Box::new(refresher),
        }
    }
}

impl Credentials for RefreshableToken {
    fn current(&self) -> Result<AuthHeader> {
        let token = self
            .token
            .read()
            .map_err(|_| NotesyncError::Auth("token lock poisoned".to_string()))?;
        Ok(AuthHeader::Bearer(token.clone()))
    }

    fn refresh(&self) -> Result<AuthHeader> {
        let fresh = (self.refresher)()?;
        let mut token = self
            .token
            .write()
            .map_err(|_| NotesyncError::Auth("token lock poisoned".to_string()))?;
        *token = fresh.clone();
        Ok(AuthHeader::Bearer(fresh))
    }
}

/// Run `op` with the current credentials; on `Auth`, refresh once and retry.
pub(crate) async fn with_auth_retry<T, F, Fut>(credentials: &dyn Credentials, mut op: F) -> Result<T>
where
    F: FnMut(AuthHeader) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op(credentials.current()?).await {
        Err(NotesyncError::Auth(reason)) => {
            info!(reason = %reason, "Credentials rejected, refreshing once");
            let fresh = credentials.refresh()?;
            op(fresh).await
        }
        other => other,
    }
}
