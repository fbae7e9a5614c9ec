use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::backend::CameraBackend;
use super::retry::RetryPolicy;
use super::types::{
    endpoints, AuthInfo, CameraDebug, CommandAck, HealthResponse, LoginRequest, LoginResponse,
    Snapshot, StreamStatus, StreamingToken,
};
use crate::auth::TokenSource;
use crate::config::ApiConfig;
use crate::error::{AppError, Result};

/// HTTP client for the camera backend
///
/// Every call goes through the same [`RetryPolicy`]. A bearer token is
/// fetched from the injected [`TokenSource`] per request; without one,
/// requests go out unauthenticated.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, tokens: Option<Arc<dyn TokenSource>>) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "Invalid backend URL: {}",
                config.base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("ptt-cam/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            retry: RetryPolicy::from_config(config),
            tokens,
        })
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match self.bearer_token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and turn non-2xx responses into errors
    async fn send(builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(AppError::from_status(
            status.as_u16(),
            error_message(&body, status.canonical_reason().unwrap_or("request failed")),
        ))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = Self::send(self.request(Method::GET, path).await).await?;
        Ok(response.json::<T>().await?)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let mut builder = self.request(Method::POST, path).await;
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = Self::send(builder).await?;
        Ok(response.json::<T>().await?)
    }

    async fn post_ack(&self, path: &str) -> Result<CommandAck> {
        let response = Self::send(self.request(Method::POST, path).await).await?;
        // Some backends answer with an empty body or plain text
        let body = response.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or_else(|_| CommandAck {
            message: Some(body).filter(|b| !b.trim().is_empty()),
        }))
    }

    /// `GET /camera/debug`
    pub async fn camera_debug(&self) -> Result<CameraDebug> {
        self.retry
            .run("camera debug", move || self.get_json(endpoints::CAMERA_DEBUG))
            .await
    }
}

#[async_trait]
impl CameraBackend for ApiClient {
    async fn health(&self) -> Result<HealthResponse> {
        self.retry
            .run("health check", move || self.get_json(endpoints::HEALTH))
            .await
    }

    async fn stream_status(&self) -> Result<StreamStatus> {
        self.retry
            .run("stream status", move || self.get_json(endpoints::CAMERA_STATUS))
            .await
    }

    async fn start_stream(&self) -> Result<CommandAck> {
        let ack = self
            .retry
            .run("start stream", move || self.post_ack(endpoints::CAMERA_START))
            .await?;
        debug!("Start stream acknowledged: {:?}", ack.message);
        Ok(ack)
    }

    async fn stop_stream(&self) -> Result<CommandAck> {
        self.retry
            .run("stop stream", move || self.post_ack(endpoints::CAMERA_STOP))
            .await
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        self.retry
            .run("snapshot", move || async move {
                let response =
                    Self::send(self.request(Method::GET, endpoints::CAMERA_SNAPSHOT).await)
                        .await?;
                let content_type = response
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("image/jpeg")
                    .to_string();
                let data = response.bytes().await?;
                Ok(Snapshot::new(content_type, data))
            })
            .await
    }

    async fn streaming_token(&self) -> Result<StreamingToken> {
        self.retry
            .run("streaming token", move || {
                self.post_json::<StreamingToken, ()>(endpoints::STREAMING_TOKEN, None)
            })
            .await
    }

    async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        };
        let body = &body;
        self.retry
            .run("login", move || self.post_json(endpoints::AUTH_LOGIN, Some(body)))
            .await
    }

    async fn auth_info(&self) -> Result<AuthInfo> {
        self.retry
            .run("auth info", move || self.get_json(endpoints::AUTH_INFO))
            .await
    }

    async fn bearer_token(&self) -> Option<String> {
        match &self.tokens {
            Some(source) => source.bearer_token().await,
            None => None,
        }
    }

    fn feed_url(&self) -> String {
        self.url(endpoints::CAMERA_FEED)
    }
}

/// Pull a readable message out of an error body
///
/// Understands `{"detail": "..."}` and `{"message": "..."}`, falls back to
/// the raw text, then to `fallback` for empty bodies.
fn error_message(body: &str, fallback: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message", "error"] {
            match value.get(key) {
                Some(serde_json::Value::String(s)) => return s.clone(),
                Some(other) if !other.is_null() => return other.to_string(),
                _ => {}
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::assert_ok;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String, tokens: Option<Arc<dyn TokenSource>>) -> ApiClient {
        let config = ApiConfig {
            base_url,
            retry_attempts: 3,
            retry_delay_ms: 5,
            timeout_ms: 2000,
        };
        ApiClient::new(&config, tokens).unwrap()
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"detail":"Not authenticated"}"#, "x"), "Not authenticated");
        assert_eq!(error_message(r#"{"message":"busy"}"#, "x"), "busy");
        assert_eq!(error_message("plain failure\n", "x"), "plain failure");
        assert_eq!(error_message("", "Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let config = ApiConfig {
            base_url: "camera.local".to_string(),
            ..ApiConfig::default()
        };
        assert!(matches!(ApiClient::new(&config, None), Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_status_retries_server_errors() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/camera/status",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err((StatusCode::SERVICE_UNAVAILABLE, "warming up"))
                    } else {
                        Ok(Json(serde_json::json!({
                            "streaming": true,
                            "camera_available": true,
                            "camera_index": 0,
                            "resolution": [1280, 720],
                            "fps": 30.0
                        })))
                    }
                }
            }),
        );

        let api = client(serve(router).await, None);
        let status = api.stream_status().await.unwrap();
        assert!(status.is_live());
        assert_eq!(status.resolution, Some((1280, 720)));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_last_error() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/camera/start",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(serde_json::json!({"detail": "capture device missing"})),
                    )
                }
            }),
        );

        let api = client(serve(router).await, None);
        let err = api.start_stream().await.unwrap_err();
        assert!(
            matches!(err, AppError::Backend { status: 500, ref message } if message == "capture device missing")
        );
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/camera/snapshot",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::UNAUTHORIZED
                }
            }),
        );

        let api = client(serve(router).await, None);
        assert!(matches!(api.snapshot().await, Err(AppError::Unauthorized)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bearer_token_attached_when_available() {
        let router = Router::new().route(
            "/auth/info",
            get(|headers: HeaderMap| async move {
                let authenticated = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer admin-token");
                Json(serde_json::json!({
                    "authenticated": authenticated,
                    "user_id": if authenticated { Some("admin") } else { None },
                }))
            }),
        );
        let base = serve(router).await;

        let anonymous = client(base.clone(), None);
        let info = anonymous.auth_info().await.unwrap();
        assert!(!info.authenticated);

        let tokens: Arc<dyn TokenSource> = Arc::new(StaticToken::new("admin-token"));
        let authed = client(base, Some(tokens));
        let info = authed.auth_info().await.unwrap();
        assert!(info.authenticated);
        assert_eq!(info.user_id.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_snapshot_keeps_content_type() {
        let router = Router::new().route(
            "/camera/snapshot",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![1u8, 2, 3, 4]) }),
        );

        let api = client(serve(router).await, None);
        let snap = api.snapshot().await.unwrap();
        assert_eq!(snap.content_type, "image/png");
        assert_eq!(&snap.data[..], &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_login_and_token_endpoints() {
        let router = Router::new()
            .route(
                "/auth/login",
                post(|Json(req): Json<LoginRequest>| async move {
                    if req.identifier == "admin" && req.password == "secret" {
                        Ok(Json(serde_json::json!({
                            "access_token": "bearer-1",
                            "token_type": "bearer",
                            "expires_in": 3600
                        })))
                    } else {
                        Err((StatusCode::UNAUTHORIZED, "bad credentials"))
                    }
                }),
            )
            .route(
                "/camera/streaming-token",
                post(|| async { Json(serde_json::json!({"token": "stream-1", "expires_in": 300})) }),
            )
            .route("/camera/stop", post(|| async { "" }))
            .route(
                "/health",
                get(|| async { Json(serde_json::json!({"status": "healthy"})) }),
            );

        let api = client(serve(router).await, None);
        let login = assert_ok!(api.login("admin", "secret").await);
        assert_eq!(login.access_token, "bearer-1");
        assert_eq!(login.expires_in, Some(3600));
        assert!(matches!(
            api.login("admin", "wrong").await,
            Err(AppError::Unauthorized)
        ));

        let token = api.streaming_token().await.unwrap();
        assert_eq!(token.token, "stream-1");

        let ack = api.stop_stream().await.unwrap();
        assert_eq!(ack.message, None);

        let (sample, healthy) = api.probe_latency().await;
        assert!(healthy);
        assert!(!sample.is_failed());
        assert!(api.feed_url().ends_with("/camera/feed"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // Nothing listens on port 9 of localhost in the test environment
        let api = client("http://127.0.0.1:9".to_string(), None).with_retry(RetryPolicy::none());
        let err = api.health().await.unwrap_err();
        assert!(err.is_transient());

        let (sample, healthy) = api.probe_latency().await;
        assert!(sample.is_failed());
        assert!(!healthy);
    }
}
