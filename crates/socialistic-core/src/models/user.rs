use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user profile as returned by the API.
///
/// Every field is defaulted on deserialization; list endpoints and auth
/// responses do not always carry the full profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub github_profile: Option<String>,
    pub stackoverflow_profile: Option<String>,
    pub skills: Vec<Skill>,
    pub followers_count: u32,
    pub following_count: u32,
    #[serde(alias = "is_followed", skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Name to show in listings, falling back to the username.
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }

    /// Whether this profile belongs to the signed-in user.
    pub fn is_own_profile(&self, current: Option<&User>) -> bool {
        current.is_some_and(|me| !me.username.is_empty() && me.username == self.username)
    }

    /// Shallow-merge the present fields of `patch` into this user.
    pub fn apply(&mut self, patch: &UserPatch) {
        if let Some(ref username) = patch.username {
            self.username = username.clone();
        }
        if let Some(ref full_name) = patch.full_name {
            self.full_name = full_name.clone();
        }
        if let Some(ref bio) = patch.bio {
            self.bio = Some(bio.clone());
        }
        if let Some(ref image) = patch.profile_image {
            self.profile_image = Some(image.clone());
        }
        if let Some(ref github) = patch.github_profile {
            self.github_profile = Some(github.clone());
        }
        if let Some(ref stackoverflow) = patch.stackoverflow_profile {
            self.stackoverflow_profile = Some(stackoverflow.clone());
        }
        if let Some(ref skills) = patch.skills {
            self.skills = skills.clone();
        }
        if let Some(count) = patch.followers_count {
            self.followers_count = count;
        }
        if let Some(count) = patch.following_count {
            self.following_count = count;
        }
        if let Some(following) = patch.is_following {
            self.is_following = Some(following);
        }
    }

    /// Local follow: bump the follower count and mark as followed.
    pub fn apply_follow(&mut self) {
        self.is_following = Some(true);
        self.followers_count = self.followers_count.saturating_add(1);
    }

    /// Local unfollow: inverse of [`User::apply_follow`].
    pub fn apply_unfollow(&mut self) {
        self.is_following = Some(false);
        self.followers_count = self.followers_count.saturating_sub(1);
    }

    pub fn is_followed(&self) -> bool {
        self.is_following.unwrap_or(false)
    }
}

/// A partial user. Absent fields are neither sent nor merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(default)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stackoverflow_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<Skill>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub following_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(default)]
pub struct Skill {
    pub id: i64,
    pub name: String,
    pub category: String,
}
