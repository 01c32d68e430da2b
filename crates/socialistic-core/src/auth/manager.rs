//! Session manager: the single source of truth for who is signed in.
//!
//! The manager is constructed once per process with [`SessionManager::init`],
//! which reconciles the persisted session with the server. It lives until the
//! process exits; only an explicit logout (or a failed token refresh) ends
//! the session.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, ClientEvent};
use crate::models::{AuthResponse, LoginCredentials, RegisterData, User, UserPatch};

use super::SessionStorage;

/// Authentication state exposed to the view layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub is_loading: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Owns the in-memory session and mirrors it into [`SessionStorage`].
///
/// Operations are not serialized against each other: two overlapping logins
/// race and the last one to finish wins.
#[derive(Clone)]
pub struct SessionManager {
    api: ApiClient,
    storage: SessionStorage,
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionManager {
    /// Build the manager and run the startup reconciliation.
    ///
    /// Without a stored access token this resolves immediately with no user.
    /// Otherwise the current user is fetched; any failure purges the stored
    /// credentials.
    pub async fn init(api: ApiClient) -> Self {
        let (state, _) = watch::channel(SessionState {
            user: None,
            is_loading: true,
        });
        let manager = Self {
            storage: api.storage().clone(),
            api,
            state: Arc::new(state),
        };
        manager.watch_client_events();
        manager.bootstrap().await;
        manager
    }

    async fn bootstrap(&self) {
        let token = match self.storage.access_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read stored access token");
                None
            }
        };

        if token.is_none() {
            debug!("No stored session");
            self.state.send_modify(|s| s.is_loading = false);
            return;
        }

        // Any failure here, transient or not, is treated as an invalid session
        let user = match self.api.current_user().await {
            Ok(user) => {
                if let Err(e) = self.storage.save_user(&user) {
                    warn!(error = %e, "Failed to persist user snapshot");
                }
                info!(username = %user.username, "Session restored");
                Some(user)
            }
            Err(e) => {
                warn!(error = %e, "Stored session rejected, clearing credentials");
                if let Err(e) = self.storage.clear() {
                    warn!(error = %e, "Failed to clear stored session");
                }
                None
            }
        };

        self.state.send_modify(|s| {
            s.user = user;
            s.is_loading = false;
        });
    }

    /// Drop the in-memory user whenever the client gives up on the session.
    fn watch_client_events(&self) {
        let mut events = self.api.subscribe();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => Self::apply_event(&state, event),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Client events lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    fn apply_event(state: &watch::Sender<SessionState>, event: ClientEvent) {
        match event {
            ClientEvent::SessionExpired => {
                info!("Session expired, signing out");
                state.send_if_modified(|s| s.user.take().is_some());
            }
        }
    }

    // ===== State access =====

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    /// Receiver that is notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // ===== Actions =====

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<User, ApiError> {
        self.establish(self.api.login(credentials)).await
    }

    pub async fn register(&self, data: &RegisterData) -> Result<User, ApiError> {
        self.establish(self.api.register(data)).await
    }

    /// Shared tail of login and register. On failure the previous state is kept.
    async fn establish<F>(&self, request: F) -> Result<User, ApiError>
    where
        F: Future<Output = Result<AuthResponse, ApiError>>,
    {
        self.state.send_modify(|s| s.is_loading = true);

        let result = match request.await {
            Ok(auth) => match self.storage.save_login(&auth) {
                Ok(()) => {
                    info!(username = %auth.user.username, "Signed in");
                    Ok(auth.user)
                }
                Err(e) => Err(ApiError::from(e)),
            },
            Err(e) => {
                debug!(error = %e, "Sign-in rejected");
                Err(e)
            }
        };

        self.state.send_modify(|s| {
            if let Ok(ref user) = result {
                s.user = Some(user.clone());
            }
            s.is_loading = false;
        });
        result
    }

    /// Sign out. Local credentials and the in-memory user are cleared even
    /// when the server call fails; that failure is still returned.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.state.send_modify(|s| s.is_loading = true);

        // The client purges stored credentials whatever the server says
        let remote = self.api.logout().await;

        self.state.send_modify(|s| {
            s.user = None;
            s.is_loading = false;
        });
        info!("Signed out");
        remote
    }

    /// Merge a confirmed profile change into the current user and persist it.
    /// Returns the merged user, or `None` when nobody is signed in.
    pub fn update_user(&self, patch: &UserPatch) -> Result<Option<User>> {
        let mut merged = None;
        self.state.send_if_modified(|s| match s.user {
            Some(ref mut user) => {
                user.apply(patch);
                merged = Some(user.clone());
                true
            }
            None => false,
        });

        if let Some(ref user) = merged {
            self.storage.save_user(user)?;
        }
        Ok(merged)
    }

    /// Replace the current user with a full profile from the server and
    /// persist it. Returns `false` when nobody is signed in.
    pub fn replace_user(&self, user: User) -> Result<bool> {
        let replaced = self.state.send_if_modified(|s| match s.user {
            Some(ref mut current) => {
                *current = user.clone();
                true
            }
            None => false,
        });

        if replaced {
            self.storage.save_user(&user)?;
        }
        Ok(replaced)
    }
}
