use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{CommentsRepo, CreateCommentCommand, RepoError},
    domain::entities::{AuthorRef, CommentEntry, CommentRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    pub_date: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            text: row.text,
            pub_date: row.pub_date,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentEntryRow {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    pub_date: OffsetDateTime,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
}

impl From<CommentEntryRow> for CommentEntry {
    fn from(row: CommentEntryRow) -> Self {
        let author = AuthorRef::new(
            row.author_id,
            row.author_username,
            &row.author_first_name,
            &row.author_last_name,
        );
        Self {
            comment: CommentRecord {
                id: row.id,
                post_id: row.post_id,
                author_id: row.author_id,
                text: row.text,
                pub_date: row.pub_date,
            },
            author,
        }
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentEntry>, RepoError> {
        let rows = sqlx::query_as::<_, CommentEntryRow>(
            r#"
            SELECT
                c.id,
                c.post_id,
                c.author_id,
                c.text,
                c.pub_date,
                u.username AS author_username,
                u.first_name AS author_first_name,
                u.last_name AS author_last_name
            FROM comments c
            INNER JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.pub_date ASC, c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentEntry::from).collect())
    }

    async fn create_comment(
        &self,
        command: CreateCommentCommand,
    ) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (post_id, author_id, text)
            VALUES ($1, $2, $3)
            RETURNING id, post_id, author_id, text, pub_date
            "#,
        )
        .bind(command.post_id)
        .bind(command.author_id)
        .bind(&command.text)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }
}
