use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::{
    error::{ErrorReport, repo_failure},
    identity::ViewerContext,
};

use super::public::HttpState;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Resolve the externally authenticated username into a [`ViewerContext`] extension.
pub async fn resolve_viewer(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let username = request
        .headers()
        .get(state.auth.identity_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let viewer = match state.identity.resolve(username.as_deref()).await {
        Ok(viewer) => viewer,
        Err(err) => return repo_failure("infra::http::resolve_viewer", &err).into_response(),
    };
    request.extensions_mut().insert(viewer);

    next.run(request).await
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let viewer = request
        .extensions()
        .get::<ViewerContext>()
        .and_then(|viewer| viewer.username().map(str::to_owned))
        .unwrap_or_default();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                viewer = viewer,
                "request failed",
            );
        } else {
            warn!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                viewer = viewer,
                "client request error",
            );
        }
    }

    response
}
