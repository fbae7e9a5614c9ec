use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::sync::Arc;

/// Supplies the primary bearer token for backend requests
///
/// Returning `None` is allowed: the request then goes out unauthenticated and
/// the backend decides whether to reject it.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn bearer_token(&self) -> Option<String>;
}

/// Fixed token, e.g. from the command line
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Token slot that can be filled or cleared after construction
///
/// Shared between the gateway and [`super::AdminSession`]; until a token is
/// installed, requests go out unauthenticated.
#[derive(Clone, Default)]
pub struct SharedToken {
    inner: Arc<ArcSwapOption<String>>,
}

impl SharedToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let shared = Self::new();
        shared.set(Some(token.into()));
        shared
    }

    pub fn set(&self, token: Option<String>) {
        self.inner.store(token.map(Arc::new));
    }

    pub fn clear(&self) {
        self.inner.store(None);
    }

    pub fn get(&self) -> Option<String> {
        self.inner.load_full().map(|t| (*t).clone())
    }

    pub fn is_set(&self) -> bool {
        self.inner.load().is_some()
    }
}

#[async_trait]
impl TokenSource for SharedToken {
    async fn bearer_token(&self) -> Option<String> {
        self.get()
    }
}
