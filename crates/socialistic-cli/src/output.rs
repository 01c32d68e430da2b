//! Plain-text rendering of posts, users and errors.

use chrono::{DateTime, Local, Utc};

use socialistic_core::api::ApiError;
use socialistic_core::models::{Post, ProgrammingLanguage, User};
use socialistic_core::profile::ProfileView;

const SNIPPET_INDENT: &str = "    | ";

fn timestamp(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

pub fn user_line(user: &User) -> String {
    if user.full_name.trim().is_empty() {
        format!("#{} @{}", user.id, user.username)
    } else {
        format!("#{} {} (@{})", user.id, user.full_name, user.username)
    }
}

pub fn post(post: &Post) -> String {
    let mut out = format!(
        "[{}] {} - {}",
        post.id,
        post.author.display_name(),
        timestamp(post.created_at)
    );
    if let Some(lang) = post.language_name() {
        out.push_str(&format!(" [{}]", lang));
    }
    out.push('\n');
    out.push_str(post.content.trim_end());
    out.push('\n');

    if let Some(ref snippet) = post.code_snippet {
        for line in snippet.lines() {
            out.push_str(SNIPPET_INDENT);
            out.push_str(line);
            out.push('\n');
        }
    }

    let heart = if post.is_liked { "♥" } else { "♡" };
    out.push_str(&format!("{} {}  💬 {}", heart, post.likes_count, post.comments_count));
    out
}

pub fn posts(posts: &[Post]) -> String {
    if posts.is_empty() {
        return "No posts yet.".to_string();
    }
    posts.iter().map(post).collect::<Vec<_>>().join("\n\n")
}

pub fn profile(view: &ProfileView) -> String {
    let user = &view.user;
    let mut lines = vec![user_line(user)];
    if !user.email.is_empty() && view.is_own_profile {
        lines.push(user.email.clone());
    }
    if let Some(ref bio) = user.bio {
        if !bio.trim().is_empty() {
            lines.push(bio.trim().to_string());
        }
    }
    if let Some(ref github) = user.github_profile {
        lines.push(format!("GitHub: {}", github));
    }
    if let Some(ref so) = user.stackoverflow_profile {
        lines.push(format!("Stack Overflow: {}", so));
    }
    if !user.skills.is_empty() {
        let skills: Vec<&str> = user.skills.iter().map(|s| s.name.as_str()).collect();
        lines.push(format!("Skills: {}", skills.join(", ")));
    }

    let mut counts = format!("{} followers, {} following", user.followers_count, user.following_count);
    if view.is_own_profile {
        counts.push_str(" (you)");
    } else if user.is_followed() {
        counts.push_str(" - following");
    }
    lines.push(counts);

    format!("{}\n\n{}", lines.join("\n"), posts(view.posts.posts()))
}

pub fn languages(languages: &[ProgrammingLanguage]) -> String {
    languages
        .iter()
        .map(|l| format!("{:>4}  {}", l.id, l.name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Message for a failed command. API rejections show the server's own
/// wording, one line per invalid field.
pub fn error_message(err: &anyhow::Error) -> String {
    let Some(api_err) = err.downcast_ref::<ApiError>() else {
        return format!("Error: {:#}", err);
    };

    match api_err {
        ApiError::Rejected { .. } => {
            let payload = api_err.payload();
            let fields = payload.field_errors();
            if payload.detail().is_some() || payload.get_message().is_some() || fields.is_empty() {
                format!("Error: {}", payload)
            } else {
                let mut out = "Error:".to_string();
                for (field, messages) in fields {
                    out.push_str(&format!("\n  {}: {}", field, messages.join(" ")));
                }
                out
            }
        }
        ApiError::Network(e) => format!("Error: could not reach the server ({})", e),
        other => format!("Error: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socialistic_core::api::StatusCode;

    fn rejected(status: u16, body: &str) -> ApiError {
        ApiError::from_status(StatusCode::from_u16(status).unwrap(), body)
    }

    #[test]
    fn test_post_with_snippet() {
        let p = Post {
            id: 3,
            author: User {
                username: "ada".to_string(),
                ..Default::default()
            },
            content: "Look at this\n".to_string(),
            code_snippet: Some("fn main() {}\n".to_string()),
            programming_language: Some(ProgrammingLanguage {
                id: 1,
                name: "Rust".to_string(),
                icon: None,
            }),
            likes_count: 2,
            is_liked: true,
            ..Default::default()
        };
        let text = post(&p);
        assert!(text.starts_with("[3] ada - "));
        assert!(text.contains("[Rust]"));
        assert!(text.contains("    | fn main() {}"));
        assert!(text.ends_with("♥ 2  💬 0"));
    }

    #[test]
    fn test_user_line_prefers_full_name() {
        let mut user = User {
            id: 2,
            username: "grace".to_string(),
            ..Default::default()
        };
        assert_eq!(user_line(&user), "#2 @grace");
        user.full_name = "Grace Hopper".to_string();
        assert_eq!(user_line(&user), "#2 Grace Hopper (@grace)");
    }

    #[test]
    fn test_error_message_lists_field_errors() {
        let err = anyhow::Error::new(rejected(
            400,
            r#"{"email": ["user with this email already exists."], "username": ["too short"]}"#,
        ));
        assert_eq!(
            error_message(&err),
            "Error:\n  email: user with this email already exists.\n  username: too short"
        );
    }

    #[test]
    fn test_error_message_detail_and_fallback() {
        let err = anyhow::Error::new(rejected(401, r#"{"detail": "No active account found"}"#));
        assert_eq!(error_message(&err), "Error: No active account found");

        let err = anyhow::Error::new(rejected(500, ""));
        assert_eq!(error_message(&err), "Error: An unknown error occurred");

        let err = anyhow::anyhow!("Not signed in");
        assert_eq!(error_message(&err), "Error: Not signed in");
    }
}
