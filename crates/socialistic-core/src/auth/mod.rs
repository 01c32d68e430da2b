//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `SessionStore`: durable key-value storage (file, keychain or memory)
//! - `SessionStorage`: typed access to the stored tokens and user snapshot
//! - `SessionManager`: in-memory session state and the login/logout actions
//!
//! Sessions persist until an explicit logout or a failed token refresh.

pub mod manager;
pub mod store;

pub use manager::{SessionManager, SessionState};
pub use store::{FileStore, KeyringStore, MemoryStore, Session, SessionStorage, SessionStore, StoreKey};
