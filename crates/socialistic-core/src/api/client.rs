//! API client for the socialistic REST API.
//!
//! Every request carries the stored access token as a bearer credential.
//! A 401 triggers one refresh of the access token followed by one replay of
//! the original request; the replay is marked [`Attempt::Retry`] and never
//! refreshes again.

use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::auth::SessionStorage;
use crate::config::Config;
use crate::models::auth::{RefreshRequest, RefreshResponse};
use crate::models::{
    AuthResponse, LoginCredentials, NewPost, Page, Post, ProgrammingLanguage, RegisterData, User,
    UserPatch,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds, used when no config is given.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Capacity of the client event channel. Events are rare (one per expired session).
const EVENT_CHANNEL_CAPACITY: usize = 16;

const LOGIN_PATH: &str = "/auth/login/";
const REGISTER_PATH: &str = "/auth/register/";
const LOGOUT_PATH: &str = "/auth/logout/";
const REFRESH_PATH: &str = "/auth/token/refresh/";
const ME_PATH: &str = "/users/me/";
const POSTS_PATH: &str = "/posts/";
const LANGUAGES_PATH: &str = "/programming-languages/";

/// Notifications pushed to the view layer outside the request/response flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// Refresh failed or was impossible; credentials were purged and the
    /// user has to sign in again.
    SessionExpired,
}

/// Whether a request is the original send or the single replay after a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    Retry,
}

/// A replayable request description.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: String,
    query: Vec<(&'static str, String)>,
    body: Option<Value>,
    attempt: Attempt,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            attempt: Attempt::Initial,
        }
    }

    pub fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode request body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// A 401 on this request may trigger a refresh.
    pub fn may_refresh(&self) -> bool {
        self.attempt == Attempt::Initial
    }

    /// The replay sent after a successful refresh.
    pub fn retry(&self) -> Self {
        Self {
            attempt: Attempt::Retry,
            ..self.clone()
        }
    }
}

/// API client for socialistic.
/// Clone is cheap - reqwest::Client and the session storage are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    storage: SessionStorage,
    events: broadcast::Sender<ClientEvent>,
}

impl ApiClient {
    /// Create a new API client for `base_url` (e.g. `http://localhost:8000/api`).
    pub fn new(base_url: &str, storage: SessionStorage) -> Result<Self> {
        Self::with_timeout(base_url, storage, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, storage: SessionStorage, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            storage,
            events,
        })
    }

    pub fn from_config(config: &Config, storage: SessionStorage) -> Result<Self> {
        Self::with_timeout(
            &config.api_base_url(),
            storage,
            Duration::from_secs(config.request_timeout_secs()),
        )
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Subscribe to [`ClientEvent`]s.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Request pipeline =====

    /// Send one request, attaching the currently stored access token.
    async fn dispatch(&self, request: &ApiRequest) -> Result<(Response, bool), ApiError> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        let token = self.storage.access_token()?;
        let authenticated = token.is_some();
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, url = %request.url, attempt = ?request.attempt, authenticated, "Sending request");
        let response = builder.send().await?;
        Ok((response, authenticated))
    }

    /// Run a request through the refresh protocol and return a successful response.
    async fn execute(&self, request: ApiRequest) -> Result<Response, ApiError> {
        let (response, authenticated) = self.dispatch(&request).await?;
        if response.status() != StatusCode::UNAUTHORIZED || !request.may_refresh() {
            return Self::check_response(response).await;
        }

        let Some(refresh) = self.storage.refresh_token()? else {
            let err = Self::check_response(response).await;
            if authenticated {
                warn!(url = %request.url, "Access token rejected and no refresh token stored");
                self.expire_session();
            }
            return err;
        };

        match self.refresh_access_token(&refresh).await {
            Ok(()) => {
                let (response, _) = self.dispatch(&request.retry()).await?;
                Self::check_response(response).await
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.expire_session();
                Err(ApiError::SessionExpired)
            }
        }
    }

    /// Exchange the refresh token for a new access token and persist it.
    async fn refresh_access_token(&self, refresh: &str) -> Result<(), ApiError> {
        let url = self.url(REFRESH_PATH);
        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest { refresh })
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let body: RefreshResponse = Self::parse(response, &url).await?;

        self.storage.set_access_token(&body.access)?;
        // Servers that rotate refresh tokens hand back a new one
        if let Some(ref rotated) = body.refresh {
            self.storage.set_refresh_token(rotated)?;
        }
        info!("Access token refreshed");
        Ok(())
    }

    /// Purge credentials and tell the view layer to return to sign-in.
    fn expire_session(&self) {
        if let Err(e) = self.storage.clear() {
            error!(error = %e, "Failed to clear session after auth failure");
        }
        // No subscribers is fine
        let _ = self.events.send(ClientEvent::SessionExpired);
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(%status, "Request rejected");
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e)))
    }

    async fn request_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let url = request.url.clone();
        let response = self.execute(request).await?;
        Self::parse(response, &url).await
    }

    async fn request_empty(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.execute(request).await?;
        Ok(())
    }

    fn get(&self, path: &str) -> ApiRequest {
        ApiRequest::new(Method::GET, self.url(path))
    }

    fn post(&self, path: &str) -> ApiRequest {
        ApiRequest::new(Method::POST, self.url(path))
    }

    fn delete(&self, path: &str) -> ApiRequest {
        ApiRequest::new(Method::DELETE, self.url(path))
    }

    fn patch(&self, path: &str) -> ApiRequest {
        ApiRequest::new(Method::PATCH, self.url(path))
    }

    // ===== Auth =====

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse, ApiError> {
        debug!(email = %credentials.email, "Logging in");
        self.request_json(self.post(LOGIN_PATH).json(credentials)?).await
    }

    pub async fn register(&self, data: &RegisterData) -> Result<AuthResponse, ApiError> {
        debug!(username = %data.username, "Registering");
        self.request_json(self.post(REGISTER_PATH).json(data)?).await
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.request_json(self.get(ME_PATH)).await
    }

    /// Revoke the refresh token server-side, then clear local credentials.
    /// Local credentials are cleared even when the server call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let refresh = self.storage.refresh_token().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read refresh token, skipping remote logout");
            None
        });
        let remote = match refresh {
            Some(refresh) => match self.post(LOGOUT_PATH).json(&RefreshRequest { refresh: &refresh }) {
                Ok(request) => self.request_empty(request).await,
                Err(e) => Err(e),
            },
            None => Ok(()),
        };
        if let Err(ref e) = remote {
            warn!(error = %e, "Remote logout failed");
        }

        let cleared = self.storage.clear();
        remote?;
        cleared?;
        Ok(())
    }

    // ===== Posts =====

    pub async fn posts(&self, page: u32) -> Result<Page<Post>, ApiError> {
        self.request_json(self.get(POSTS_PATH).query("page", page)).await
    }

    pub async fn create_post(&self, post: &NewPost) -> Result<Post, ApiError> {
        self.request_json(self.post(POSTS_PATH).json(post)?).await
    }

    pub async fn like_post(&self, post_id: i64) -> Result<(), ApiError> {
        self.request_empty(self.post(&format!("/posts/{}/like/", post_id))).await
    }

    pub async fn unlike_post(&self, post_id: i64) -> Result<(), ApiError> {
        self.request_empty(self.delete(&format!("/posts/{}/like/", post_id))).await
    }

    pub async fn programming_languages(&self) -> Result<Vec<ProgrammingLanguage>, ApiError> {
        let page: Page<ProgrammingLanguage> = self.request_json(self.get(LANGUAGES_PATH)).await?;
        Ok(page.results)
    }

    // ===== Users =====

    pub async fn user(&self, user_id: i64) -> Result<User, ApiError> {
        self.request_json(self.get(&format!("/users/{}/", user_id))).await
    }

    pub async fn update_profile(&self, patch: &UserPatch) -> Result<User, ApiError> {
        self.request_json(self.patch(ME_PATH).json(patch)?).await
    }

    pub async fn follow(&self, user_id: i64) -> Result<(), ApiError> {
        self.request_empty(self.post(&format!("/users/{}/follow/", user_id))).await
    }

    pub async fn unfollow(&self, user_id: i64) -> Result<(), ApiError> {
        self.request_empty(self.delete(&format!("/users/{}/follow/", user_id))).await
    }

    pub async fn user_posts(&self, user_id: i64, page: u32) -> Result<Page<Post>, ApiError> {
        self.request_json(self.get(&format!("/users/{}/posts/", user_id)).query("page", page))
            .await
    }

    pub async fn followers(&self, user_id: i64) -> Result<Page<User>, ApiError> {
        self.request_json(self.get(&format!("/users/{}/followers/", user_id))).await
    }

    pub async fn following(&self, user_id: i64) -> Result<Page<User>, ApiError> {
        self.request_json(self.get(&format!("/users/{}/following/", user_id))).await
    }

    /// Follow a page's absolute `next` link. `None` on the last page.
    pub async fn next_page<T: DeserializeOwned>(&self, page: &Page<T>) -> Result<Option<Page<T>>, ApiError> {
        match page.next.as_deref() {
            Some(next) if !next.is_empty() => {
                let request = ApiRequest::new(Method::GET, next);
                self.request_json(request).await.map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::{SessionStore, StoreKey};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.uri(), SessionStorage::in_memory()).unwrap()
    }

    fn signed_in(server: &MockServer, access: &str, refresh: Option<&str>) -> ApiClient {
        let api = client_for(server);
        api.storage().set_access_token(access).unwrap();
        if let Some(refresh) = refresh {
            api.storage().set_refresh_token(refresh).unwrap();
        }
        api
    }

    #[test]
    fn test_retry_marker() {
        let request = ApiRequest::new(Method::GET, "http://localhost/users/me/");
        assert_eq!(request.attempt(), Attempt::Initial);
        assert!(request.may_refresh());

        let retry = request.retry();
        assert_eq!(retry.attempt(), Attempt::Retry);
        assert!(!retry.may_refresh());
        assert!(!retry.retry().may_refresh());
    }

    #[tokio::test]
    async fn test_bearer_token_attached_when_stored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .and(header("authorization", "Bearer a1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "username": "ada"})))
            .expect(1)
            .mount(&server)
            .await;

        let api = signed_in(&server, "a1", Some("r1"));
        let user = api.current_user().await.unwrap();
        assert_eq!(user.username, "ada");
        server.verify().await;
    }

    #[tokio::test]
    async fn test_no_token_sends_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/programming-languages/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1, "next": null, "previous": null,
                "results": [{"id": 1, "name": "Rust", "icon": null}]
            })))
            .mount(&server)
            .await;

        let api = client_for(&server);
        let languages = api.programming_languages().await.unwrap();
        assert_eq!(languages[0].name, "Rust");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_refresh_then_replay_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .and(header("authorization", "Bearer old"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is expired"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .and(body_json(json!({"refresh": "r1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "a2"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .and(header("authorization", "Bearer a2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "ada"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/posts/"))
            .and(query_param("page", "1"))
            .and(header("authorization", "Bearer a2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 0, "results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let api = signed_in(&server, "old", Some("r1"));
        let user = api.current_user().await.unwrap();
        assert_eq!(user.username, "ada");
        assert_eq!(api.storage().access_token().unwrap().as_deref(), Some("a2"));

        // The next unrelated request uses the refreshed token
        let page = api.posts(1).await.unwrap();
        assert!(page.is_empty());
        server.verify().await;
    }

    #[tokio::test]
    async fn test_replay_failure_is_returned_without_second_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "nope"})))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "a2"})))
            .expect(1)
            .mount(&server)
            .await;

        let api = signed_in(&server, "old", Some("r1"));
        let mut events = api.subscribe();
        let err = api.current_user().await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(err.payload().detail(), Some("nope"));
        // The refresh itself worked, so the session is kept
        assert_eq!(api.storage().access_token().unwrap().as_deref(), Some("a2"));
        assert!(events.try_recv().is_err());
        server.verify().await;
    }

    #[tokio::test]
    async fn test_failed_refresh_purges_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is invalid or expired"})))
            .expect(1)
            .mount(&server)
            .await;

        let api = signed_in(&server, "old", Some("r1"));
        api.storage()
            .save_user(&User { username: "ada".to_string(), ..Default::default() })
            .unwrap();
        let mut events = api.subscribe();

        let err = api.current_user().await.unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired));
        assert_eq!(api.storage().load().unwrap(), crate::auth::Session::default());
        assert_eq!(events.try_recv().unwrap(), ClientEvent::SessionExpired);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_unreachable_refresh_purges_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        // Answers long after the client has given up
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access": "a2"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let api = ApiClient::with_timeout(&server.uri(), SessionStorage::in_memory(), Duration::from_millis(200))
            .unwrap();
        api.storage().set_access_token("old").unwrap();
        api.storage().set_refresh_token("r1").unwrap();
        api.storage()
            .save_user(&User { username: "ada".to_string(), ..Default::default() })
            .unwrap();
        let mut events = api.subscribe();

        let err = api.current_user().await.unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired));
        assert_eq!(api.storage().load().unwrap(), crate::auth::Session::default());
        assert_eq!(events.try_recv().unwrap(), ClientEvent::SessionExpired);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .and(header("authorization", "Bearer old"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .and(body_json(json!({"refresh": "r1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "a2", "refresh": "r2"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .and(header("authorization", "Bearer a2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "ada"})))
            .mount(&server)
            .await;

        let api = signed_in(&server, "old", Some("r1"));
        api.current_user().await.unwrap();

        assert_eq!(api.storage().access_token().unwrap().as_deref(), Some("a2"));
        assert_eq!(api.storage().refresh_token().unwrap().as_deref(), Some("r2"));
        server.verify().await;
    }

    #[tokio::test]
    async fn test_missing_refresh_token_surfaces_original_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "never"})))
            .expect(0)
            .mount(&server)
            .await;

        let api = signed_in(&server, "old", None);
        let mut events = api.subscribe();

        let err = api.current_user().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.payload().detail(), Some("expired"));
        assert!(api.storage().access_token().unwrap().is_none());
        assert_eq!(events.try_recv().unwrap(), ClientEvent::SessionExpired);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_anonymous_401_does_not_expire_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "detail": "No active account found with the given credentials"
            })))
            .mount(&server)
            .await;

        let api = client_for(&server);
        let mut events = api.subscribe();
        let err = api
            .login(&LoginCredentials::new("ada@example.com", "wrong"))
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_validation_error_is_propagated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/register/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "email": ["user with this email already exists."]
            })))
            .mount(&server)
            .await;

        let api = client_for(&server);
        let err = api
            .register(&RegisterData {
                username: "ada".to_string(),
                email: "ada@example.com".to_string(),
                password: "pw".to_string(),
                full_name: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        let fields = err.payload().field_errors();
        assert_eq!(fields[0].0, "email");
    }

    #[tokio::test]
    async fn test_network_failure_uses_unknown_payload() {
        // Nothing listens on the discard port
        let api = ApiClient::new("http://127.0.0.1:9", SessionStorage::in_memory()).unwrap();
        let err = api.posts(1).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(err.payload(), crate::api::error::ErrorPayload::unknown());
    }

    #[tokio::test]
    async fn test_logout_clears_storage_when_remote_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout/"))
            .and(body_json(json!({"refresh": "r1"})))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let api = signed_in(&server, "a1", Some("r1"));
        assert!(api.logout().await.is_err());
        assert_eq!(api.storage().load().unwrap(), crate::auth::Session::default());
        server.verify().await;
    }

    /// Writes succeed, reads fail (e.g. a locked keychain).
    struct UnreadableStore(crate::auth::MemoryStore);

    impl SessionStore for UnreadableStore {
        fn get(&self, _key: StoreKey) -> anyhow::Result<Option<String>> {
            Err(anyhow::anyhow!("keychain locked"))
        }

        fn set(&self, key: StoreKey, value: &str) -> anyhow::Result<()> {
            self.0.set(key, value)
        }

        fn remove(&self, key: StoreKey) -> anyhow::Result<()> {
            self.0.remove(key)
        }
    }

    #[tokio::test]
    async fn test_logout_purges_even_when_tokens_are_unreadable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(UnreadableStore(crate::auth::MemoryStore::new()));
        let api = ApiClient::new(&server.uri(), SessionStorage::new(store.clone())).unwrap();
        api.storage().set_access_token("a1").unwrap();
        api.storage().set_refresh_token("r1").unwrap();

        api.logout().await.unwrap();
        for key in StoreKey::ALL {
            assert!(store.0.get(key).unwrap().is_none());
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn test_like_and_follow_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts/7/like/"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/posts/7/like/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users/3/follow/"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/users/3/follow/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = signed_in(&server, "a1", Some("r1"));
        api.like_post(7).await.unwrap();
        api.unlike_post(7).await.unwrap();
        api.follow(3).await.unwrap();
        api.unfollow(3).await.unwrap();
        server.verify().await;
    }

    #[tokio::test]
    async fn test_create_post_and_next_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts/"))
            .and(body_json(json!({"content": "hello", "programming_language_id": 2})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 9, "content": "hello", "author": {"username": "ada"}, "likes_count": 0
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/posts/"))
            .and(query_param("cursor", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next": null, "previous": null, "results": [{"id": 1, "content": "older"}]
            })))
            .mount(&server)
            .await;

        let api = signed_in(&server, "a1", Some("r1"));
        let post = api.create_post(&NewPost::new("hello").with_language(2)).await.unwrap();
        assert_eq!(post.id, 9);

        let first: Page<Post> = Page {
            next: Some(format!("{}/posts/?cursor=abc", server.uri())),
            ..Default::default()
        };
        let second = api.next_page(&first).await.unwrap().unwrap();
        assert_eq!(second.results[0].content, "older");
        assert!(api.next_page(&second).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_profile_sends_partial_body() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/users/me/"))
            .and(body_json(json!({"bio": "new bio"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "username": "ada", "bio": "new bio"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = signed_in(&server, "a1", Some("r1"));
        let patch = UserPatch {
            bio: Some("new bio".to_string()),
            ..Default::default()
        };
        let user = api.update_profile(&patch).await.unwrap();
        assert_eq!(user.bio.as_deref(), Some("new bio"));
        server.verify().await;
    }
}
