use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("failed to update subscription")]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    AuthorNotFound,
    /// A new edge was written.
    Followed,
    /// Edge already present, or the viewer targeted themselves.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    AuthorNotFound,
    Unfollowed,
    Unchanged,
}

/// Creates and removes follow edges on behalf of the signed-in viewer.
#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    pub async fn follow(
        &self,
        viewer: &UserRecord,
        username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let Some(author) = self.users.find_by_username(username).await? else {
            return Ok(FollowOutcome::AuthorNotFound);
        };

        if author.id == viewer.id {
            return Ok(FollowOutcome::Unchanged);
        }

        if self.follows.follow(viewer.id, author.id).await? {
            info!(
                target = "yatube::follows",
                user = %viewer.username,
                author = %author.username,
                "follow created"
            );
            Ok(FollowOutcome::Followed)
        } else {
            Ok(FollowOutcome::Unchanged)
        }
    }

    pub async fn unfollow(
        &self,
        viewer: &UserRecord,
        username: &str,
    ) -> Result<UnfollowOutcome, FollowError> {
        let Some(author) = self.users.find_by_username(username).await? else {
            return Ok(UnfollowOutcome::AuthorNotFound);
        };

        if self.follows.unfollow(viewer.id, author.id).await? {
            info!(
                target = "yatube::follows",
                user = %viewer.username,
                author = %author.username,
                "follow removed"
            );
            Ok(UnfollowOutcome::Unfollowed)
        } else {
            Ok(UnfollowOutcome::Unchanged)
        }
    }
}
