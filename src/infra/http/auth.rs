//! Request extractors over the [`ViewerContext`] installed by `resolve_viewer`.

use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{Uri, request::Parts},
    response::{IntoResponse, Redirect, Response},
};

use crate::application::identity::ViewerContext;
use crate::domain::entities::UserRecord;

use super::public::HttpState;

/// The signed-in user, if any. Never rejects.
pub struct Viewer(pub Option<UserRecord>);

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<ViewerContext>()
            .and_then(|viewer| viewer.user.clone());
        Ok(Self(user))
    }
}

/// A signed-in user. Anonymous requests are sent to the login page.
pub struct Authenticated(pub UserRecord);

impl<S> FromRequestParts<S> for Authenticated
where
    HttpState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts
            .extensions
            .get::<ViewerContext>()
            .and_then(|viewer| viewer.user.clone())
        {
            return Ok(Self(user));
        }

        let state = HttpState::from_ref(state);
        Err(LoginRedirect(login_redirect_target(
            &state.auth.login_url,
            &parts.uri,
        )))
    }
}

#[derive(Debug)]
pub struct LoginRedirect(String);

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        Redirect::to(&self.0).into_response()
    }
}

/// `login_url?next=<path and query>`, keeping `/` readable in the return path.
pub fn login_redirect_target(login_url: &str, uri: &Uri) -> String {
    let next = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    let encoded = url::form_urlencoded::byte_serialize(next.as_bytes())
        .collect::<String>()
        .replace("%2F", "/")
        .replace('+', "%20");
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!("{login_url}{separator}next={encoded}")
}
