use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::PageMeta;
use crate::domain::entities::{CommentEntry, GroupRecord, PostEntry};
use crate::domain::posts::format_human_date;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome.with_title(content.title.clone()), content);
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

pub const INDEX_TITLE: &str = "Latest updates on the site";
pub const CREATE_TITLE: &str = "New post";
pub const EDIT_TITLE: &str = "Edit post";
pub const FOLLOW_TITLE: &str = "Posts of authors you follow";

pub fn group_title(group: &GroupView) -> String {
    format!("Posts of the group {}", group.title)
}

pub fn profile_title(author: &AuthorView) -> String {
    format!("Profile of {}", author.display_name)
}

#[derive(Clone)]
pub struct NavigationView {
    pub entries: Vec<NavigationLinkView>,
}

#[derive(Clone)]
pub struct FooterView {
    pub year: i32,
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub footer: FooterView,
    pub meta: PageMetaView,
}

impl LayoutChrome {
    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            meta: PageMetaView {
                title: title.into(),
            },
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub footer: FooterView,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            footer: chrome.footer,
            meta: chrome.meta,
            content,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorView {
    pub username: String,
    pub display_name: String,
    pub href: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupView {
    pub title: String,
    pub description: String,
    pub slug: String,
    pub href: String,
}

impl From<&GroupRecord> for GroupView {
    fn from(group: &GroupRecord) -> Self {
        Self {
            title: group.title.clone(),
            description: group.description.clone(),
            slug: group.slug.clone(),
            href: format!("/group/{}/", group.slug),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupLinkView {
    pub title: String,
    pub href: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub author: Option<AuthorView>,
    pub group: Option<GroupLinkView>,
    pub published: String,
    pub image_url: Option<String>,
    pub href: String,
}

impl From<&PostEntry> for PostCard {
    fn from(entry: &PostEntry) -> Self {
        let post = &entry.post;
        Self {
            id: post.id,
            text: post.text.clone(),
            author: entry.author.as_ref().map(|author| AuthorView {
                username: author.username.clone(),
                display_name: author.display_name.clone(),
                href: profile_href(&author.username),
            }),
            group: entry.group.as_ref().map(|group| GroupLinkView {
                title: group.title.clone(),
                href: format!("/group/{}/", group.slug),
            }),
            published: format_human_date(post.pub_date),
            image_url: post.image.as_deref().map(media_url),
            href: post_href(post.id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommentView {
    pub author: AuthorView,
    pub text: String,
    pub published: String,
}

impl From<&CommentEntry> for CommentView {
    fn from(entry: &CommentEntry) -> Self {
        Self {
            author: AuthorView {
                username: entry.author.username.clone(),
                display_name: entry.author.display_name.clone(),
                href: profile_href(&entry.author.username),
            },
            text: entry.comment.text.clone(),
            published: format_human_date(entry.comment.pub_date),
        }
    }
}

/// Links rendered by the shared paginator partial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaginationView {
    pub number: u64,
    pub num_pages: u64,
    pub first_href: Option<String>,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub last_href: Option<String>,
}

impl PaginationView {
    pub fn from_meta(meta: &PageMeta) -> Self {
        let page_href = |number: u64| format!("?page={number}");
        Self {
            number: meta.number,
            num_pages: meta.num_pages,
            first_href: meta.has_previous().then(|| page_href(1)),
            previous_href: meta.previous_number().map(page_href),
            next_href: meta.next_number().map(page_href),
            last_href: meta.has_next().then(|| page_href(meta.num_pages)),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.num_pages > 1
    }
}

pub struct PostListContext {
    pub posts: Vec<PostCard>,
    pub pagination: PaginationView,
}

impl PostListContext {
    pub fn has_posts(&self) -> bool {
        !self.posts.is_empty()
    }
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<PostListContext>,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<PostListContext>,
}

pub struct GroupPageContext {
    pub group: GroupView,
    pub posts: Vec<PostCard>,
    pub pagination: PaginationView,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupPageContext>,
}

pub struct ProfileContext {
    pub author: AuthorView,
    pub post_count: u64,
    pub following: bool,
    /// The viewer is signed in and is not the profile owner.
    pub can_follow: bool,
    pub posts: Vec<PostCard>,
    pub pagination: PaginationView,
}

impl ProfileContext {
    pub fn follow_href(&self) -> String {
        format!("{}follow/", self.author.href)
    }

    pub fn unfollow_href(&self) -> String {
        format!("{}unfollow/", self.author.href)
    }
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContext>,
}

pub struct PostDetailContext {
    pub title: String,
    pub post: PostCard,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub can_comment: bool,
    pub comment_action: String,
    pub comment_text: String,
}

impl PostDetailContext {
    pub fn edit_href(&self) -> String {
        format!("{}edit/", self.post.href)
    }
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostFormErrors {
    pub text: Vec<String>,
    pub group: Vec<String>,
    pub image: Vec<String>,
}

pub struct PostFormContext {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub no_group_selected: bool,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub errors: PostFormErrors,
}

impl PostFormContext {
    pub fn heading(&self) -> &'static str {
        if self.is_edit { EDIT_TITLE } else { CREATE_TITLE }
    }

    pub fn submit_label(&self) -> &'static str {
        if self.is_edit { "Save" } else { "Add" }
    }
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: ErrorAction,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page not found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            primary_action: ErrorAction::home(),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to the main page".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn profile_href(username: &str) -> String {
    format!("/profile/{username}/")
}

pub fn post_href(id: i64) -> String {
    format!("/posts/{id}/")
}

pub fn media_url(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}
