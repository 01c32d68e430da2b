//! Core library for the socialistic developer network client.
//!
//! - `api`: HTTP client with bearer auth and single-refresh token handling
//! - `auth`: persistent session store and the session manager
//! - `models`: users, posts, languages, pages
//! - `feed` / `profile`: optimistic local projections for the view layer
//! - `cache`: on-disk cache for slowly-changing data
//! - `config`: application configuration

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod feed;
pub mod models;
pub mod profile;

pub use api::{ApiClient, ApiError, ClientEvent};
pub use auth::{SessionManager, SessionState, SessionStorage};
pub use config::Config;
