//! REST API client module for the socialistic service.
//!
//! This module provides the `ApiClient` for the auth, user, post and
//! programming-language endpoints.
//!
//! The API uses JWT bearer token authentication. Expired access tokens are
//! refreshed once per request using the stored refresh token.

pub mod client;
pub mod error;

pub use client::{ApiClient, ApiRequest, Attempt, ClientEvent};
pub use error::{ApiError, ErrorPayload};
pub use reqwest::StatusCode;
