use async_trait::async_trait;

use crate::{
    application::repos::{CreateGroupCommand, GroupsRepo, RepoError},
    domain::entities::GroupRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: i64,
    title: String,
    description: String,
    slug: String,
}

impl From<GroupRow> for GroupRecord {
    fn from(row: GroupRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            slug: row.slug,
        }
    }
}

#[async_trait]
impl GroupsRepo for PostgresRepositories {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, title, description, slug
            FROM groups
            ORDER BY title, id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(GroupRecord::from).collect())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, title, description, slug
            FROM groups
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(GroupRecord::from))
    }

    async fn create_group(&self, command: CreateGroupCommand) -> Result<GroupRecord, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            INSERT INTO groups (title, description, slug)
            VALUES ($1, $2, $3)
            RETURNING id, title, description, slug
            "#,
        )
        .bind(&command.title)
        .bind(&command.description)
        .bind(&command.slug)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }
}
