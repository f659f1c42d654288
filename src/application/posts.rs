//! Write-side post operations: create, edit and comment.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::forms::{
    CleanPost, CommentSubmission, FormErrors, ImageChange, PostSubmission,
};
use crate::application::repos::{
    CommentsRepo, CreateCommentCommand, CreatePostCommand, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostCommand,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostEntry, PostRecord, UserRecord};
use crate::domain::posts::short_text;
use crate::infra::uploads::{ImageStorage, UploadStorageError};
use crate::presentation::views::{GroupOption, PostFormContext, PostFormErrors, media_url, post_href};

#[derive(Debug, Error)]
pub enum PostServiceError {
    #[error("post persistence failed")]
    Repo(#[from] RepoError),
    #[error("image storage failed")]
    Upload(#[from] UploadStorageError),
}

/// Result of a create or edit submission.
pub enum PostSubmitOutcome {
    Saved(PostRecord),
    /// Re-render the form with errors; nothing was written.
    Invalid(PostFormContext),
}

/// Whether the viewer may edit a post.
pub enum EditAccess {
    NotFound,
    Denied,
    Allowed(Box<PostEntry>),
}

pub enum CommentOutcome {
    PostNotFound,
    Created(CommentRecord),
    Rejected(FormErrors),
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    images: Arc<ImageStorage>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        images: Arc<ImageStorage>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
            comments,
            images,
        }
    }

    pub async fn create_form(&self) -> Result<PostFormContext, PostServiceError> {
        let groups = self.groups.list_groups().await?;
        Ok(form_context(
            FormTarget::Create,
            "",
            "",
            None,
            &groups,
            FormErrors::default(),
        ))
    }

    pub async fn create_post(
        &self,
        author: &UserRecord,
        submission: PostSubmission,
    ) -> Result<PostSubmitOutcome, PostServiceError> {
        let groups = self.groups.list_groups().await?;
        let clean = match submission.clean(&groups) {
            Ok(clean) => clean,
            Err(errors) => {
                return Ok(PostSubmitOutcome::Invalid(form_context(
                    FormTarget::Create,
                    &submission.text,
                    &submission.group,
                    None,
                    &groups,
                    errors,
                )));
            }
        };

        let CleanPost {
            text,
            group_id,
            image,
        } = clean;
        let stored = self.store_image(image, None).await?;

        let command = CreatePostCommand {
            text,
            author_id: author.id,
            group_id,
            image: stored.path.clone(),
        };
        let post = match self.writer.create_post(command).await {
            Ok(post) => post,
            Err(err) => {
                self.discard_new_image(&stored).await;
                return Err(err.into());
            }
        };

        info!(
            target = "yatube::posts",
            post_id = post.id,
            author = %author.username,
            text = short_text(&post.text),
            "post created"
        );
        Ok(PostSubmitOutcome::Saved(post))
    }

    pub async fn authorize_edit(
        &self,
        post_id: i64,
        viewer: Option<&UserRecord>,
    ) -> Result<EditAccess, PostServiceError> {
        let Some(entry) = self.reader.find_post(post_id).await? else {
            return Ok(EditAccess::NotFound);
        };

        let is_author = viewer.is_some_and(|viewer| entry.post.author_id == Some(viewer.id));
        if is_author {
            Ok(EditAccess::Allowed(Box::new(entry)))
        } else {
            Ok(EditAccess::Denied)
        }
    }

    pub async fn edit_form(&self, entry: &PostEntry) -> Result<PostFormContext, PostServiceError> {
        let groups = self.groups.list_groups().await?;
        let selected = entry
            .post
            .group_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        Ok(form_context(
            FormTarget::Edit(entry.post.id),
            &entry.post.text,
            &selected,
            entry.post.image.as_deref(),
            &groups,
            FormErrors::default(),
        ))
    }

    /// Apply an edit. The publication timestamp is left untouched.
    pub async fn update_post(
        &self,
        entry: &PostEntry,
        submission: PostSubmission,
    ) -> Result<PostSubmitOutcome, PostServiceError> {
        let groups = self.groups.list_groups().await?;
        let clean = match submission.clean(&groups) {
            Ok(clean) => clean,
            Err(errors) => {
                return Ok(PostSubmitOutcome::Invalid(form_context(
                    FormTarget::Edit(entry.post.id),
                    &submission.text,
                    &submission.group,
                    entry.post.image.as_deref(),
                    &groups,
                    errors,
                )));
            }
        };

        let CleanPost {
            text,
            group_id,
            image,
        } = clean;
        let stored = self.store_image(image, entry.post.image.clone()).await?;

        let command = UpdatePostCommand {
            id: entry.post.id,
            text,
            group_id,
            image: stored.path.clone(),
        };
        let post = match self.writer.update_post(command).await {
            Ok(post) => post,
            Err(err) => {
                self.discard_new_image(&stored).await;
                return Err(err.into());
            }
        };

        info!(target = "yatube::posts", post_id = post.id, "post updated");
        Ok(PostSubmitOutcome::Saved(post))
    }

    pub async fn add_comment(
        &self,
        post_id: i64,
        author: &UserRecord,
        submission: CommentSubmission,
    ) -> Result<CommentOutcome, PostServiceError> {
        if self.reader.find_post(post_id).await?.is_none() {
            return Ok(CommentOutcome::PostNotFound);
        }

        let text = match submission.clean() {
            Ok(text) => text,
            Err(errors) => return Ok(CommentOutcome::Rejected(errors)),
        };

        let comment = self
            .comments
            .create_comment(CreateCommentCommand {
                post_id,
                author_id: author.id,
                text,
            })
            .await?;

        info!(
            target = "yatube::posts",
            post_id,
            comment_id = comment.id,
            author = %author.username,
            text = short_text(&comment.text),
            "comment added"
        );
        Ok(CommentOutcome::Created(comment))
    }

    async fn store_image(
        &self,
        change: ImageChange,
        current: Option<String>,
    ) -> Result<StoredChange, PostServiceError> {
        match change {
            ImageChange::Keep => Ok(StoredChange {
                path: current,
                is_new: false,
            }),
            ImageChange::Clear => Ok(StoredChange {
                path: None,
                is_new: false,
            }),
            ImageChange::Replace(image) => {
                let stored = self.images.store(&image.file_name, image.bytes).await?;
                info!(
                    target = "yatube::uploads",
                    path = %stored.stored_path,
                    checksum = %stored.checksum,
                    size_bytes = stored.size_bytes,
                    width = image.width,
                    height = image.height,
                    "post image stored"
                );
                Ok(StoredChange {
                    path: Some(stored.stored_path),
                    is_new: true,
                })
            }
        }
    }

    async fn discard_new_image(&self, stored: &StoredChange) {
        if !stored.is_new {
            return;
        }
        if let Some(path) = stored.path.as_deref()
            && let Err(err) = self.images.delete(path).await
        {
            warn!(
                target = "yatube::uploads",
                path,
                error = %err,
                "failed to remove image of unsaved post"
            );
        }
    }
}

struct StoredChange {
    path: Option<String>,
    is_new: bool,
}

enum FormTarget {
    Create,
    Edit(i64),
}

fn form_context(
    target: FormTarget,
    text: &str,
    selected_group: &str,
    current_image: Option<&str>,
    groups: &[GroupRecord],
    errors: FormErrors,
) -> PostFormContext {
    let selected_group = selected_group.trim();
    let (is_edit, action) = match target {
        FormTarget::Create => (false, "/create/".to_string()),
        FormTarget::Edit(id) => (true, format!("{}edit/", post_href(id))),
    };

    let groups: Vec<GroupOption> = groups
        .iter()
        .map(|group| GroupOption {
            id: group.id,
            title: group.title.clone(),
            selected: group.id.to_string() == selected_group,
        })
        .collect();
    let no_group_selected = !groups.iter().any(|option| option.selected);

    PostFormContext {
        is_edit,
        action,
        text: text.to_string(),
        no_group_selected,
        groups,
        current_image: current_image.map(media_url),
        errors: PostFormErrors {
            text: errors.field("text").to_vec(),
            group: errors.field("group").to_vec(),
            image: errors.field("image").to_vec(),
        },
    }
}
