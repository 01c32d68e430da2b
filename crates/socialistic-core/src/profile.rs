//! Profile page state: a user, their posts, and follow/edit actions.

use tracing::{debug, warn};

use crate::api::ApiError;
use crate::auth::SessionManager;
use crate::feed::Feed;
use crate::models::{User, UserPatch};

#[derive(Debug, Clone)]
pub struct ProfileView {
    pub user: User,
    pub posts: Feed,
    pub is_own_profile: bool,
}

impl ProfileView {
    /// Load a profile and its first page of posts.
    ///
    /// The signed-in user's own profile is taken from the session instead of
    /// being fetched again.
    pub async fn load(session: &SessionManager, user_id: i64) -> Result<Self, ApiError> {
        let api = session.api();
        let me = session.current_user().filter(|me| me.id == user_id && me.id != 0);

        let (user, posts) = match me {
            Some(me) => (me, Feed::load_user(api, user_id, 1).await?),
            None => futures::try_join!(api.user(user_id), Feed::load_user(api, user_id, 1))?,
        };

        let is_own_profile = user.is_own_profile(session.current_user().as_ref());
        debug!(user_id, is_own_profile, posts = posts.posts().len(), "Profile loaded");
        Ok(Self {
            user,
            posts,
            is_own_profile,
        })
    }

    /// Follow or unfollow, updating the local counts first.
    /// Returns the new follow state, or `None` on one's own profile.
    pub async fn toggle_follow(&mut self, session: &SessionManager) -> Result<Option<bool>, ApiError> {
        if self.is_own_profile {
            return Ok(None);
        }

        let prior = (self.user.followers_count, self.user.is_following);
        let following = !self.user.is_followed();
        if following {
            self.user.apply_follow();
        } else {
            self.user.apply_unfollow();
        }

        let api = session.api();
        let confirmed = if following {
            api.follow(self.user.id).await
        } else {
            api.unfollow(self.user.id).await
        };

        if let Err(e) = confirmed {
            warn!(user_id = self.user.id, error = %e, "Follow change rejected, rolling back");
            (self.user.followers_count, self.user.is_following) = prior;
            return Err(e);
        }
        Ok(Some(following))
    }

    /// Send a profile edit. The server's answer replaces the session user
    /// as a whole, so fields it cleared are cleared locally too.
    pub async fn save(&mut self, session: &SessionManager, patch: &UserPatch) -> Result<User, ApiError> {
        let updated = session.api().update_profile(patch).await?;
        session.replace_user(updated.clone())?;
        self.user = updated.clone();
        Ok(updated)
    }
}
