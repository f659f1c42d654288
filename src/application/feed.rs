//! Read-side listings: feed, group, profile, post detail and follow feed.

use std::sync::Arc;

use thiserror::Error;

use crate::application::pagination::{Page, PageParam, Paginator};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostScope, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{PostEntry, UserRecord};
use crate::domain::posts::truncate_chars;
use crate::presentation::views::{
    AuthorView, CommentView, GroupPageContext, GroupView, PaginationView, PostCard,
    PostDetailContext, PostListContext, ProfileContext, profile_href,
};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to load listing")]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
    paginator: Paginator,
    title_symbols: usize,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
        paginator: Paginator,
        title_symbols: usize,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            comments,
            follows,
            paginator,
            title_symbols,
        }
    }

    pub async fn index(&self, page: PageParam) -> Result<PostListContext, FeedError> {
        let page = self.load_page(PostScope::All, page).await?;
        Ok(list_context(page))
    }

    /// `None` when no group has the slug.
    pub async fn group(
        &self,
        slug: &str,
        page: PageParam,
    ) -> Result<Option<GroupPageContext>, FeedError> {
        let Some(group) = self.groups.find_by_slug(slug).await? else {
            return Ok(None);
        };

        let list = list_context(self.load_page(PostScope::Group(group.id), page).await?);
        Ok(Some(GroupPageContext {
            group: GroupView::from(&group),
            posts: list.posts,
            pagination: list.pagination,
        }))
    }

    /// `None` when no user has the username.
    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<&UserRecord>,
        page: PageParam,
    ) -> Result<Option<ProfileContext>, FeedError> {
        let Some(author) = self.users.find_by_username(username).await? else {
            return Ok(None);
        };

        let page = self.load_page(PostScope::Author(author.id), page).await?;
        let post_count = page.meta.count;

        let following = match viewer {
            Some(viewer) => self.follows.is_following(viewer.id, author.id).await?,
            None => false,
        };
        let can_follow = viewer.is_some_and(|viewer| viewer.id != author.id);

        let list = list_context(page);
        Ok(Some(ProfileContext {
            author: AuthorView {
                username: author.username.clone(),
                display_name: author.display_name(),
                href: profile_href(&author.username),
            },
            post_count,
            following,
            can_follow,
            posts: list.posts,
            pagination: list.pagination,
        }))
    }

    /// `None` when the post does not exist.
    pub async fn post_detail(
        &self,
        post_id: i64,
        viewer: Option<&UserRecord>,
    ) -> Result<Option<PostDetailContext>, FeedError> {
        let Some(entry) = self.posts.find_post(post_id).await? else {
            return Ok(None);
        };

        let author_post_count = match entry.post.author_id {
            Some(author_id) => self.posts.count_posts(PostScope::Author(author_id)).await?,
            None => 0,
        };
        let comments = self.comments.list_for_post(post_id).await?;
        let can_edit = viewer.is_some_and(|viewer| entry.post.author_id == Some(viewer.id));

        let card = PostCard::from(&entry);
        Ok(Some(PostDetailContext {
            title: truncate_chars(&entry.post.text, self.title_symbols).to_string(),
            comment_action: format!("{}comment/", card.href),
            post: card,
            author_post_count,
            comments: comments.iter().map(CommentView::from).collect(),
            can_edit,
            can_comment: viewer.is_some(),
            comment_text: String::new(),
        }))
    }

    pub async fn follow_feed(
        &self,
        viewer: &UserRecord,
        page: PageParam,
    ) -> Result<PostListContext, FeedError> {
        let page = self.load_page(PostScope::FollowedBy(viewer.id), page).await?;
        Ok(list_context(page))
    }

    async fn load_page(
        &self,
        scope: PostScope,
        requested: PageParam,
    ) -> Result<Page<PostEntry>, FeedError> {
        let count = self.posts.count_posts(scope).await?;
        let meta = self.paginator.resolve(count, requested);
        let items = self.posts.list_posts(scope, meta.window()).await?;
        Ok(Page { items, meta })
    }
}

fn list_context(page: Page<PostEntry>) -> PostListContext {
    let pagination = PaginationView::from_meta(&page.meta);
    let page = page.map(|entry| PostCard::from(&entry));
    PostListContext {
        posts: page.items,
        pagination,
    }
}
