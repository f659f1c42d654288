use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, RawQuery, State},
    http::{
        HeaderValue, Method, Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use bytes::Bytes;
use tracing::{error, warn};

use crate::{
    application::{
        chrome::ChromeService,
        error::HttpError,
        feed::FeedService,
        follows::{FollowOutcome, FollowService, UnfollowOutcome},
        identity::{IdentityService, ViewerContext},
        pagination::PageParam,
        posts::{CommentOutcome, EditAccess, PostService, PostSubmitOutcome},
        repos::HealthRepo,
    },
    config::AuthSettings,
    domain::entities::UserRecord,
    infra::{
        cache::{ResponseCache, should_store_response},
        uploads::{ImageStorage, UploadStorageError},
    },
    presentation::views::{
        CREATE_TITLE, EDIT_TITLE, FOLLOW_TITLE, FollowTemplate, GroupTemplate, INDEX_TITLE,
        IndexTemplate, LayoutChrome, LayoutContext, PostDetailTemplate, PostFormContext,
        PostFormTemplate, ProfileTemplate, group_title, post_href, profile_href, profile_title,
        render_not_found_response, render_template_response,
    },
};

use super::{
    auth::{Authenticated, Viewer},
    db_health_response,
    forms::{CommentForm, PostForm},
    middleware::{log_responses, resolve_viewer, set_request_context},
};

const FOLLOW_INDEX_PATH: &str = "/follow/";

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub identity: Arc<IdentityService>,
    pub chrome: Arc<ChromeService>,
    pub health: Arc<dyn HealthRepo>,
    pub images: Arc<ImageStorage>,
    pub cache: ResponseCache,
    pub auth: AuthSettings,
    pub max_request_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    let cached_routes = Router::new()
        .route("/", get(index))
        .route_layer(middleware::from_fn_with_state(state.clone(), page_cache));

    let routes = Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
        .route("/posts/{id}/", get(post_detail))
        .route("/posts/{id}/edit/", get(post_edit_form).post(post_edit))
        .route("/posts/{id}/comment/", get(add_comment).post(add_comment))
        .route("/create/", get(post_create_form).post(post_create))
        .route(FOLLOW_INDEX_PATH, get(follow_index))
        .route("/media/{*path}", get(serve_media))
        .route("/_health/db", get(public_health))
        .fallback(not_found);

    let body_limit = state.max_request_bytes;
    cached_routes
        .merge(routes)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(state, resolve_viewer))
        .layer(middleware::from_fn(set_request_context))
}

/// Serve the feed from the page cache while an entry for this page and viewer is live.
async fn page_cache(State(state): State<HttpState>, request: Request<Body>, next: Next) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let viewer = request
        .extensions()
        .get::<ViewerContext>()
        .and_then(|viewer| viewer.username())
        .unwrap_or("");
    let page = match page_param(request.uri().query()) {
        PageParam::First => 1,
        PageParam::Number(number) => number,
    };
    let key = format!("index_page:{}?page={page}|{viewer}", request.uri().path());

    if let Some(cached) = state.cache.get(&key).await {
        return cached;
    }

    let response = next.run(request).await;
    if !should_store_response(&response) {
        return response;
    }

    match state.cache.store_response(&key, response).await {
        Ok(response) => response,
        Err((response, err)) => {
            warn!(
                target = "yatube::cache",
                key = %key,
                error = %err,
                "failed to store page in cache"
            );
            response
        }
    }
}

fn page_param(raw_query: Option<&str>) -> PageParam {
    let raw = raw_query.and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == "page")
            .map(|(_, value)| value.into_owned())
    });
    PageParam::parse(raw.as_deref())
}

fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok()
}

fn chrome_for(state: &HttpState, viewer: Option<&UserRecord>) -> LayoutChrome {
    state.chrome.for_viewer(viewer)
}

async fn index(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    RawQuery(query): RawQuery,
) -> Response {
    let chrome = chrome_for(&state, viewer.as_ref());
    match state.feed.index(page_param(query.as_deref())).await {
        Ok(content) => {
            let view = LayoutContext::new(chrome.with_title(INDEX_TITLE), content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(slug): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let chrome = chrome_for(&state, viewer.as_ref());
    match state.feed.group(&slug, page_param(query.as_deref())).await {
        Ok(Some(content)) => {
            let title = group_title(&content.group);
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn profile(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(username): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let chrome = chrome_for(&state, viewer.as_ref());
    match state
        .feed
        .profile(&username, viewer.as_ref(), page_param(query.as_deref()))
        .await
    {
        Ok(Some(content)) => {
            let title = profile_title(&content.author);
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(id): Path<String>,
) -> Response {
    let chrome = chrome_for(&state, viewer.as_ref());
    let Some(post_id) = parse_post_id(&id) else {
        return render_not_found_response(chrome);
    };

    match state.feed.post_detail(post_id, viewer.as_ref()).await {
        Ok(Some(content)) => {
            let title = content.title.clone();
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn render_post_form(chrome: LayoutChrome, content: PostFormContext) -> Response {
    let title = if content.is_edit {
        EDIT_TITLE
    } else {
        CREATE_TITLE
    };
    let view = LayoutContext::new(chrome.with_title(title), content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

async fn post_create_form(
    State(state): State<HttpState>,
    Authenticated(user): Authenticated,
) -> Response {
    let chrome = chrome_for(&state, Some(&user));
    match state.posts.create_form().await {
        Ok(content) => render_post_form(chrome, content),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_create(
    State(state): State<HttpState>,
    Authenticated(user): Authenticated,
    PostForm(submission): PostForm,
) -> Response {
    match state.posts.create_post(&user, submission).await {
        Ok(PostSubmitOutcome::Saved(_)) => Redirect::to(&profile_href(&user.username)).into_response(),
        Ok(PostSubmitOutcome::Invalid(content)) => {
            render_post_form(chrome_for(&state, Some(&user)), content)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_edit_form(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(id): Path<String>,
) -> Response {
    let chrome = chrome_for(&state, viewer.as_ref());
    let Some(post_id) = parse_post_id(&id) else {
        return render_not_found_response(chrome);
    };

    match state.posts.authorize_edit(post_id, viewer.as_ref()).await {
        Ok(EditAccess::Allowed(entry)) => match state.posts.edit_form(&entry).await {
            Ok(content) => render_post_form(chrome, content),
            Err(err) => HttpError::from(err).into_response(),
        },
        Ok(EditAccess::Denied) => Redirect::to(&post_href(post_id)).into_response(),
        Ok(EditAccess::NotFound) => render_not_found_response(chrome),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_edit(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(id): Path<String>,
    PostForm(submission): PostForm,
) -> Response {
    let chrome = chrome_for(&state, viewer.as_ref());
    let Some(post_id) = parse_post_id(&id) else {
        return render_not_found_response(chrome);
    };

    let entry = match state.posts.authorize_edit(post_id, viewer.as_ref()).await {
        Ok(EditAccess::Allowed(entry)) => entry,
        Ok(EditAccess::Denied) => return Redirect::to(&post_href(post_id)).into_response(),
        Ok(EditAccess::NotFound) => return render_not_found_response(chrome),
        Err(err) => return HttpError::from(err).into_response(),
    };

    match state.posts.update_post(&entry, submission).await {
        Ok(PostSubmitOutcome::Saved(post)) => Redirect::to(&post_href(post.id)).into_response(),
        Ok(PostSubmitOutcome::Invalid(content)) => render_post_form(chrome, content),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn add_comment(
    State(state): State<HttpState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
    CommentForm(submission): CommentForm,
) -> Response {
    let Some(post_id) = parse_post_id(&id) else {
        return render_not_found_response(chrome_for(&state, Some(&user)));
    };

    match state.posts.add_comment(post_id, &user, submission).await {
        Ok(CommentOutcome::PostNotFound) => {
            render_not_found_response(chrome_for(&state, Some(&user)))
        }
        Ok(CommentOutcome::Created(_) | CommentOutcome::Rejected(_)) => {
            Redirect::to(&post_href(post_id)).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    Authenticated(user): Authenticated,
    RawQuery(query): RawQuery,
) -> Response {
    let chrome = chrome_for(&state, Some(&user));
    match state
        .feed
        .follow_feed(&user, page_param(query.as_deref()))
        .await
    {
        Ok(content) => {
            let view = LayoutContext::new(chrome.with_title(FOLLOW_TITLE), content);
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn profile_follow(
    State(state): State<HttpState>,
    Authenticated(user): Authenticated,
    Path(username): Path<String>,
) -> Response {
    match state.follows.follow(&user, &username).await {
        Ok(FollowOutcome::AuthorNotFound) => {
            render_not_found_response(chrome_for(&state, Some(&user)))
        }
        Ok(FollowOutcome::Followed | FollowOutcome::Unchanged) => {
            Redirect::to(FOLLOW_INDEX_PATH).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    Authenticated(user): Authenticated,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unfollow(&user, &username).await {
        Ok(UnfollowOutcome::AuthorNotFound) => {
            render_not_found_response(chrome_for(&state, Some(&user)))
        }
        Ok(UnfollowOutcome::Unfollowed | UnfollowOutcome::Unchanged) => {
            Redirect::to(FOLLOW_INDEX_PATH).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.images.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath | UploadStorageError::NotFound) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Image not found",
            "The requested image is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored image"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read image",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn not_found(State(state): State<HttpState>, Viewer(viewer): Viewer) -> Response {
    render_not_found_response(chrome_for(&state, viewer.as_ref()))
}
