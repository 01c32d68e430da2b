//! Data models mirrored from the socialistic API.
//!
//! - `User`, `UserPatch`, `Skill`: profiles and partial profile updates
//! - `Post`, `NewPost`, `ProgrammingLanguage`: feed content
//! - `AuthTokens`, `AuthResponse`, `LoginCredentials`, `RegisterData`: auth payloads
//! - `Page`: paginated list envelope

pub mod auth;
pub mod page;
pub mod post;
pub mod user;

pub use auth::{AuthResponse, AuthTokens, LoginCredentials, RegisterData};
pub use page::Page;
pub use post::{NewPost, Post, ProgrammingLanguage};
pub use user::{Skill, User, UserPatch};
