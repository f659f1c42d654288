use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::pagination::PageWindow,
    application::repos::{
        CreatePostCommand, PostScope, PostsRepo, PostsWriteRepo, RepoError, UpdatePostCommand,
    },
    domain::entities::{AuthorRef, GroupRef, PostEntry, PostRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

const POST_ENTRY_SELECT: &str = r#"
    SELECT
        p.id,
        p.text,
        p.author_id,
        p.pub_date,
        p.group_id,
        p.image,
        u.username AS author_username,
        u.first_name AS author_first_name,
        u.last_name AS author_last_name,
        g.slug AS group_slug,
        g.title AS group_title
    FROM posts p
    LEFT JOIN users u ON u.id = p.author_id
    LEFT JOIN groups g ON g.id = p.group_id
    WHERE TRUE
"#;

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    text: String,
    author_id: Option<i64>,
    pub_date: OffsetDateTime,
    group_id: Option<i64>,
    image: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            author_id: row.author_id,
            pub_date: row.pub_date,
            group_id: row.group_id,
            image: row.image,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostEntryRow {
    id: i64,
    text: String,
    author_id: Option<i64>,
    pub_date: OffsetDateTime,
    group_id: Option<i64>,
    image: Option<String>,
    author_username: Option<String>,
    author_first_name: Option<String>,
    author_last_name: Option<String>,
    group_slug: Option<String>,
    group_title: Option<String>,
}

impl From<PostEntryRow> for PostEntry {
    fn from(row: PostEntryRow) -> Self {
        let author = match (row.author_id, row.author_username) {
            (Some(id), Some(username)) => Some(AuthorRef::new(
                id,
                username,
                row.author_first_name.as_deref().unwrap_or_default(),
                row.author_last_name.as_deref().unwrap_or_default(),
            )),
            _ => None,
        };
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(GroupRef { id, slug, title }),
            _ => None,
        };

        Self {
            post: PostRecord {
                id: row.id,
                text: row.text,
                author_id: row.author_id,
                pub_date: row.pub_date,
                group_id: row.group_id,
                image: row.image,
            },
            author,
            group,
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostEntry>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(POST_ENTRY_SELECT);
        Self::apply_scope_conditions(&mut qb, scope);
        qb.push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ");
        qb.push_bind(window.limit);
        qb.push(" OFFSET ");
        qb.push_bind(window.offset);

        let rows = qb
            .build_query_as::<PostEntryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostEntry::from).collect())
    }

    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p WHERE TRUE");
        Self::apply_scope_conditions(&mut qb, scope);

        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostEntry>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(POST_ENTRY_SELECT);
        qb.push(" AND p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostEntryRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostEntry::from))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, command: CreatePostCommand) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (text, author_id, group_id, image)
            VALUES ($1, $2, $3, $4)
            RETURNING id, text, author_id, pub_date, group_id, image
            "#,
        )
        .bind(&command.text)
        .bind(command.author_id)
        .bind(command.group_id)
        .bind(command.image.as_deref())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, command: UpdatePostCommand) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            UPDATE posts
            SET text = $2, group_id = $3, image = $4
            WHERE id = $1
            RETURNING id, text, author_id, pub_date, group_id, image
            "#,
        )
        .bind(command.id)
        .bind(&command.text)
        .bind(command.group_id)
        .bind(command.image.as_deref())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }
}
