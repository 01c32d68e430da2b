use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// A post in the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(default)]
pub struct Post {
    pub id: i64,
    pub author: User,
    pub content: String,
    pub code_snippet: Option<String>,
    pub programming_language: Option<ProgrammingLanguage>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub likes_count: u32,
    pub comments_count: u32,
    pub is_liked: bool,
}

impl Post {
    /// Local like, applied before the server confirms.
    pub fn apply_like(&mut self) {
        self.is_liked = true;
        self.likes_count = self.likes_count.saturating_add(1);
    }

    /// Local unlike: inverse of [`Post::apply_like`].
    pub fn apply_unlike(&mut self) {
        self.is_liked = false;
        self.likes_count = self.likes_count.saturating_sub(1);
    }

    pub fn language_name(&self) -> Option<&str> {
        self.programming_language.as_ref().map(|l| l.name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(default)]
pub struct ProgrammingLanguage {
    pub id: i64,
    pub name: String,
    pub icon: Option<String>,
}

/// Body of `POST /posts/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct NewPost {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub programming_language_id: Option<i64>,
}

impl NewPost {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, snippet: impl Into<String>) -> Self {
        self.code_snippet = Some(snippet.into());
        self
    }

    pub fn with_language(mut self, language_id: i64) -> Self {
        self.programming_language_id = Some(language_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_then_unlike_restores_counts() {
        let mut post = Post {
            id: 7,
            likes_count: 5,
            is_liked: false,
            ..Default::default()
        };

        post.apply_like();
        assert_eq!(post.likes_count, 6);
        assert!(post.is_liked);

        post.apply_unlike();
        assert_eq!(post.likes_count, 5);
        assert!(!post.is_liked);
    }

    #[test]
    fn test_unlike_never_underflows() {
        let mut post = Post::default();
        post.apply_unlike();
        assert_eq!(post.likes_count, 0);
    }

    #[test]
    fn test_parse_post() {
        let json = r#"{
            "id": 3,
            "author": {"id": 1, "username": "ada", "full_name": "Ada"},
            "content": "hello",
            "code_snippet": "fn main() {}",
            "programming_language": {"id": 2, "name": "Rust", "icon": null},
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z",
            "likes_count": 4,
            "comments_count": 1,
            "is_liked": true
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.author.username, "ada");
        assert_eq!(post.language_name(), Some("Rust"));
        assert_eq!(post.likes_count, 4);
        assert!(post.created_at.is_some());
    }

    #[test]
    fn test_new_post_omits_absent_fields() {
        let body = serde_json::to_value(NewPost::new("hi")).unwrap();
        assert_eq!(body, serde_json::json!({"content": "hi"}));

        let body = serde_json::to_value(NewPost::new("hi").with_code("x").with_language(4)).unwrap();
        assert_eq!(body["code_snippet"], "x");
        assert_eq!(body["programming_language_id"], 4);
    }
}
