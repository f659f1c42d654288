use async_trait::async_trait;

use crate::application::repos::{FollowsRepo, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl FollowsRepo for PostgresRepositories {
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO follows (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT ON CONSTRAINT unique_follow DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(author_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
