//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::pagination::PageWindow;
use crate::domain::entities::{
    CommentEntry, CommentRecord, GroupRecord, PostEntry, PostRecord, UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which posts a listing covers. Every scope is ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

#[derive(Debug, Clone)]
pub struct CreateUserCommand {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    pub description: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub text: String,
    pub author_id: i64,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// Editable post fields. The publication timestamp is not among them.
#[derive(Debug, Clone)]
pub struct UpdatePostCommand {
    pub id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentCommand {
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn create_user(&self, command: CreateUserCommand) -> Result<UserRecord, RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    async fn create_group(&self, command: CreateGroupCommand) -> Result<GroupRecord, RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostEntry>, RepoError>;

    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError>;

    async fn find_post(&self, id: i64) -> Result<Option<PostEntry>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, command: CreatePostCommand) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, command: UpdatePostCommand) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Comments of a post in creation order.
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentEntry>, RepoError>;

    async fn create_comment(
        &self,
        command: CreateCommentCommand,
    ) -> Result<CommentRecord, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError>;

    /// Returns `true` when a new edge was written.
    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError>;

    /// Returns `true` when an edge was removed.
    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
