//! In-memory repositories and router wiring shared by the integration tests.
#![allow(dead_code)]

use std::{
    num::{NonZeroU32, NonZeroUsize},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use time::OffsetDateTime;
use tower::ServiceExt;
use yatube::{
    application::{
        chrome::ChromeService,
        feed::FeedService,
        follows::FollowService,
        identity::IdentityService,
        pagination::{PageWindow, Paginator},
        posts::PostService,
        repos::{
            CommentsRepo, CreateCommentCommand, CreateGroupCommand, CreatePostCommand,
            CreateUserCommand, FollowsRepo, GroupsRepo, HealthRepo, PostScope, PostsRepo,
            PostsWriteRepo, RepoError, UpdatePostCommand, UsersRepo,
        },
    },
    config::AuthSettings,
    domain::entities::{
        AuthorRef, CommentEntry, CommentRecord, GroupRecord, GroupRef, PostEntry, PostRecord,
        UserRecord,
    },
    infra::{
        cache::ResponseCache,
        http::{HttpState, build_router},
        uploads::ImageStorage,
    },
};

pub const IDENTITY_HEADER: &str = "x-remote-user";
pub const PER_PAGE: u32 = 10;
pub const INDEX_TTL: Duration = Duration::from_secs(20);
pub const INDEX_CAPACITY: usize = 32;

/// 2x1 transparent GIF.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    follows: Vec<(i64, i64)>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps so listing order is deterministic.
    fn timestamp(&self) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(1_700_000_000 + self.next_id)
    }

    fn entry(&self, post: &PostRecord) -> PostEntry {
        let author = post
            .author_id
            .and_then(|id| self.users.iter().find(|user| user.id == id))
            .map(AuthorRef::from);
        let group = post
            .group_id
            .and_then(|id| self.groups.iter().find(|group| group.id == id))
            .map(GroupRef::from);
        PostEntry {
            post: post.clone(),
            author,
            group,
        }
    }

    fn in_scope(&self, post: &PostRecord, scope: PostScope) -> bool {
        match scope {
            PostScope::All => true,
            PostScope::Group(group_id) => post.group_id == Some(group_id),
            PostScope::Author(author_id) => post.author_id == Some(author_id),
            PostScope::FollowedBy(user_id) => post.author_id.is_some_and(|author_id| {
                self.follows.contains(&(user_id, author_id))
            }),
        }
    }

    fn scoped(&self, scope: PostScope) -> Vec<&PostRecord> {
        let mut posts: Vec<&PostRecord> = self
            .posts
            .iter()
            .filter(|post| self.in_scope(post, scope))
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }
}

/// Repository double backed by plain vectors behind a mutex.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("store mutex")
    }

    pub fn add_user(&self, username: &str) -> UserRecord {
        let mut tables = self.lock();
        let user = UserRecord {
            id: tables.next_id(),
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            date_joined: OffsetDateTime::UNIX_EPOCH,
        };
        tables.users.push(user.clone());
        user
    }

    pub fn add_group(&self, title: &str, slug: &str) -> GroupRecord {
        let mut tables = self.lock();
        let group = GroupRecord {
            id: tables.next_id(),
            title: title.to_string(),
            description: format!("About {title}"),
            slug: slug.to_string(),
        };
        tables.groups.push(group.clone());
        group
    }

    pub fn add_post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> PostRecord {
        let mut tables = self.lock();
        let id = tables.next_id();
        let post = PostRecord {
            id,
            text: text.to_string(),
            author_id: Some(author.id),
            pub_date: tables.timestamp(),
            group_id: group.map(|group| group.id),
            image: None,
        };
        tables.posts.push(post.clone());
        post
    }

    pub fn delete_post(&self, id: i64) {
        let mut tables = self.lock();
        tables.posts.retain(|post| post.id != id);
        tables.comments.retain(|comment| comment.post_id != id);
    }

    pub fn post(&self, id: i64) -> Option<PostRecord> {
        self.lock().posts.iter().find(|post| post.id == id).cloned()
    }

    pub fn posts(&self) -> Vec<PostRecord> {
        self.lock().posts.clone()
    }

    pub fn comments_for(&self, post_id: i64) -> Vec<CommentRecord> {
        self.lock()
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect()
    }

    pub fn follow_edges(&self, user_id: i64, author_id: i64) -> usize {
        self.lock()
            .follows
            .iter()
            .filter(|edge| **edge == (user_id, author_id))
            .count()
    }

    pub fn follow_count(&self) -> usize {
        self.lock().follows.len()
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create_user(&self, command: CreateUserCommand) -> Result<UserRecord, RepoError> {
        let mut tables = self.lock();
        if tables.users.iter().any(|user| user.username == command.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: tables.next_id(),
            username: command.username,
            first_name: command.first_name,
            last_name: command.last_name,
            date_joined: OffsetDateTime::UNIX_EPOCH,
        };
        tables.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn create_group(&self, command: CreateGroupCommand) -> Result<GroupRecord, RepoError> {
        let mut tables = self.lock();
        if tables.groups.iter().any(|group| group.slug == command.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: tables.next_id(),
            title: command.title,
            description: command.description,
            slug: command.slug,
        };
        tables.groups.push(group.clone());
        Ok(group)
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostEntry>, RepoError> {
        let tables = self.lock();
        let offset = usize::try_from(window.offset).unwrap_or(0);
        let limit = usize::try_from(window.limit).unwrap_or(0);
        Ok(tables
            .scoped(scope)
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|post| tables.entry(post))
            .collect())
    }

    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        Ok(self.lock().scoped(scope).len() as u64)
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostEntry>, RepoError> {
        let tables = self.lock();
        Ok(tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| tables.entry(post)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, command: CreatePostCommand) -> Result<PostRecord, RepoError> {
        let mut tables = self.lock();
        let id = tables.next_id();
        let post = PostRecord {
            id,
            text: command.text,
            author_id: Some(command.author_id),
            pub_date: tables.timestamp(),
            group_id: command.group_id,
            image: command.image,
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, command: UpdatePostCommand) -> Result<PostRecord, RepoError> {
        let mut tables = self.lock();
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == command.id)
            .ok_or(RepoError::NotFound)?;
        post.text = command.text;
        post.group_id = command.group_id;
        post.image = command.image;
        Ok(post.clone())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentEntry>, RepoError> {
        let tables = self.lock();
        Ok(tables
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .filter_map(|comment| {
                let author = tables.users.iter().find(|user| user.id == comment.author_id)?;
                Some(CommentEntry {
                    comment: comment.clone(),
                    author: AuthorRef::from(author),
                })
            })
            .collect())
    }

    async fn create_comment(
        &self,
        command: CreateCommentCommand,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = self.lock();
        let comment = CommentRecord {
            id: tables.next_id(),
            post_id: command.post_id,
            author_id: command.author_id,
            text: command.text,
            pub_date: tables.timestamp(),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self.lock().follows.contains(&(user_id, author_id)))
    }

    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        if tables.follows.contains(&(user_id, author_id)) {
            return Ok(false);
        }
        tables.follows.push((user_id, author_id));
        Ok(true)
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        let before = tables.follows.len();
        tables.follows.retain(|edge| *edge != (user_id, author_id));
        Ok(tables.follows.len() != before)
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// A router over a fresh store, plus handles the tests inspect.
pub struct TestApp {
    pub store: MemoryStore,
    pub router: Router,
    pub cache: ResponseCache,
    pub media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let store = MemoryStore::default();
        let media = tempfile::tempdir().expect("media tempdir");
        let images = Arc::new(ImageStorage::new(media.path().to_path_buf()).expect("image storage"));
        let repo = Arc::new(store.clone());
        let paginator = Paginator::new(NonZeroU32::new(PER_PAGE).expect("non-zero page size"));

        let feed = Arc::new(FeedService::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            paginator,
            15,
        ));
        let posts = Arc::new(PostService::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            images.clone(),
        ));
        let auth = AuthSettings {
            identity_header: IDENTITY_HEADER.to_string(),
            login_url: "/auth/login/".to_string(),
        };
        let cache = ResponseCache::new(
            INDEX_TTL,
            NonZeroUsize::new(INDEX_CAPACITY).expect("non-zero cache capacity"),
        );

        let state = HttpState {
            feed,
            posts,
            follows: Arc::new(FollowService::new(repo.clone(), repo.clone())),
            identity: Arc::new(IdentityService::new(repo.clone())),
            chrome: Arc::new(ChromeService::new(auth.login_url.clone())),
            health: repo,
            images,
            cache: cache.clone(),
            auth,
            max_request_bytes: 5 * 1024 * 1024,
        };

        Self {
            store,
            router: build_router(state),
            cache,
            media,
        }
    }

    pub async fn get(&self, uri: &str, user: Option<&str>) -> Response<Body> {
        self.send(request(Method::GET, uri, user, None, Body::empty()))
            .await
    }

    pub async fn post_form(&self, uri: &str, user: Option<&str>, body: &str) -> Response<Body> {
        self.send(request(
            Method::POST,
            uri,
            user,
            Some("application/x-www-form-urlencoded"),
            Body::from(body.to_string()),
        ))
        .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        user: Option<&str>,
        form: MultipartBody,
    ) -> Response<Body> {
        let content_type = form.content_type();
        self.send(request(
            Method::POST,
            uri,
            user,
            Some(&content_type),
            Body::from(form.finish()),
        ))
        .await
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }
}

fn request(
    method: Method,
    uri: &str,
    user: Option<&str>,
    content_type: Option<&str>,
    body: Body,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(IDENTITY_HEADER, user);
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(body).expect("request should build")
}

/// Hand-assembled `multipart/form-data` payload.
pub struct MultipartBody {
    boundary: &'static str,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "yatube-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .expect("ascii location")
}

pub fn assert_redirect(response: &Response<Body>, target: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response), target);
}
