//! Local projection of a post list with optimistic likes.
//!
//! Likes are applied to the local copy before the server answers. The
//! projection is allowed to drift from the server (for example when other
//! users like the same post) until the next [`Feed::reload`]. A rejected
//! like/unlike is rolled back exactly.

use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{Page, Post};

/// Which list a feed was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    All,
    User(i64),
}

/// A local like/unlike that has been applied but not yet confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeChange {
    Liked(i64),
    Unliked(i64),
}

impl LikeChange {
    pub fn post_id(&self) -> i64 {
        match self {
            LikeChange::Liked(id) | LikeChange::Unliked(id) => *id,
        }
    }
}

/// A [`LikeChange`] together with the post's state before it was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingLike {
    pub change: LikeChange,
    likes_count: u32,
    is_liked: bool,
}

#[derive(Debug, Clone)]
pub struct Feed {
    source: FeedSource,
    start_page: u32,
    posts: Vec<Post>,
    last: Page<Post>,
}

impl Feed {
    pub fn from_page(source: FeedSource, page: u32, data: Page<Post>) -> Self {
        Self {
            source,
            start_page: page,
            posts: data.results.clone(),
            last: Page {
                results: Vec::new(),
                ..data
            },
        }
    }

    pub async fn load(api: &ApiClient, page: u32) -> Result<Self, ApiError> {
        let data = api.posts(page).await?;
        Ok(Self::from_page(FeedSource::All, page, data))
    }

    pub async fn load_user(api: &ApiClient, user_id: i64, page: u32) -> Result<Self, ApiError> {
        let data = api.user_posts(user_id, page).await?;
        Ok(Self::from_page(FeedSource::User(user_id), page, data))
    }

    /// Replace the local projection with server truth, starting again from
    /// the first loaded page.
    pub async fn reload(&mut self, api: &ApiClient) -> Result<(), ApiError> {
        let fresh = match self.source {
            FeedSource::All => Self::load(api, self.start_page).await?,
            FeedSource::User(id) => Self::load_user(api, id, self.start_page).await?,
        };
        *self = fresh;
        Ok(())
    }

    /// Append the next page. Returns `false` when there was nothing more.
    pub async fn load_more(&mut self, api: &ApiClient) -> Result<bool, ApiError> {
        match api.next_page(&self.last).await? {
            Some(next) => {
                debug!(added = next.results.len(), "Feed extended");
                self.posts.extend(next.results.iter().cloned());
                self.last = Page {
                    results: Vec::new(),
                    ..next
                };
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn get(&self, post_id: i64) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == post_id)
    }

    pub fn has_more(&self) -> bool {
        self.last.has_next()
    }

    pub fn total(&self) -> Option<u64> {
        self.last.count
    }

    /// Put a freshly created post at the top.
    pub fn prepend(&mut self, post: Post) {
        self.posts.insert(0, post);
    }

    /// Apply a like (or unlike, if already liked) locally.
    pub fn begin_toggle(&mut self, post_id: i64) -> Option<PendingLike> {
        let post = self.posts.iter_mut().find(|p| p.id == post_id)?;
        let (likes_count, is_liked) = (post.likes_count, post.is_liked);
        let change = if is_liked {
            post.apply_unlike();
            LikeChange::Unliked(post_id)
        } else {
            post.apply_like();
            LikeChange::Liked(post_id)
        };
        Some(PendingLike {
            change,
            likes_count,
            is_liked,
        })
    }

    /// Undo a change made by [`Feed::begin_toggle`], restoring the counts
    /// it saw verbatim.
    pub fn revert(&mut self, pending: PendingLike) {
        if let Some(post) = self.posts.iter_mut().find(|p| p.id == pending.change.post_id()) {
            post.likes_count = pending.likes_count;
            post.is_liked = pending.is_liked;
        }
    }

    /// Toggle a like: local change first, then the server call.
    /// `Ok(None)` when the post is not in this feed.
    pub async fn toggle_like(&mut self, api: &ApiClient, post_id: i64) -> Result<Option<LikeChange>, ApiError> {
        let Some(pending) = self.begin_toggle(post_id) else {
            return Ok(None);
        };

        let confirmed = match pending.change {
            LikeChange::Liked(id) => api.like_post(id).await,
            LikeChange::Unliked(id) => api.unlike_post(id).await,
        };

        if let Err(e) = confirmed {
            warn!(post_id, error = %e, "Like not accepted, rolling back");
            self.revert(pending);
            return Err(e);
        }
        Ok(Some(pending.change))
    }
}
