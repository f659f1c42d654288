//! Body extractors for the post and comment forms.

use std::convert::Infallible;

use axum::{
    Form,
    extract::{FromRequest, Request},
    http::{StatusCode, header::CONTENT_TYPE},
};
use axum_extra::extract::Multipart;
use bytes::Bytes;
use serde::Deserialize;
use tracing::warn;

use crate::application::{
    error::HttpError,
    forms::{CommentSubmission, ImageUpload, PostSubmission},
};

const SOURCE: &str = "infra::http::forms";

/// Post form fields from either a multipart or an urlencoded body.
pub struct PostForm(pub PostSubmission);

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostFields {
    text: String,
    group: String,
    #[serde(rename = "image-clear")]
    image_clear: Option<String>,
}

impl<S> FromRequest<S> for PostForm
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if is_multipart {
            let mut multipart = Multipart::from_request(request, state)
                .await
                .map_err(|err| {
                    HttpError::new(
                        SOURCE,
                        StatusCode::BAD_REQUEST,
                        "Invalid form data",
                        err.to_string(),
                    )
                })?;
            return read_post_multipart(&mut multipart).await.map(Self);
        }

        let Form(fields) = Form::<PostFields>::from_request(request, state)
            .await
            .map_err(|err| {
                HttpError::new(
                    SOURCE,
                    StatusCode::BAD_REQUEST,
                    "Invalid form data",
                    err.to_string(),
                )
            })?;
        Ok(Self(PostSubmission {
            text: fields.text,
            group: fields.group,
            image: None,
            clear_image: fields.image_clear.is_some(),
        }))
    }
}

async fn read_post_multipart(multipart: &mut Multipart) -> Result<PostSubmission, HttpError> {
    let mut submission = PostSubmission::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                warn!(
                    target = SOURCE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                let public = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "Upload too large"
                } else {
                    "Invalid form data"
                };
                return Err(HttpError::new(SOURCE, status, public, err.to_string()));
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes: Bytes = field.bytes().await.map_err(multipart_failure)?;
                submission.image = Some(ImageUpload { file_name, bytes });
            }
            "text" => submission.text = field.text().await.map_err(multipart_failure)?,
            "group" => submission.group = field.text().await.map_err(multipart_failure)?,
            "image-clear" => submission.clear_image = true,
            _ => {}
        }
    }
    Ok(submission)
}

fn multipart_failure(err: axum_extra::extract::multipart::MultipartError) -> HttpError {
    HttpError::new(SOURCE, err.status(), "Invalid form data", err.to_string())
}

/// Comment form. A missing or unreadable body yields an empty submission.
pub struct CommentForm(pub CommentSubmission);

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentFields {
    text: String,
}

impl<S> FromRequest<S> for CommentForm
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let text = match Form::<CommentFields>::from_request(request, state).await {
            Ok(Form(fields)) => fields.text,
            Err(_) => String::new(),
        };
        Ok(Self(CommentSubmission { text }))
    }
}
