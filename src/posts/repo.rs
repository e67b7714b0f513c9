use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::posts::repo_types::Post;

#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn count_by_author(&self, author_id: Uuid) -> anyhow::Result<i64>;
    /// Posts of one author, `date_posted` descending.
    async fn list_by_author(
        &self,
        author_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Post>>;
}

#[async_trait]
impl PostRepo for PgPool {
    async fn count_by_author(&self, author_id: Uuid) -> anyhow::Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE user_id = $1")
            .bind(author_id)
            .fetch_one(self)
            .await
            .context("count posts by author")?;
        Ok(count)
    }

    async fn list_by_author(
        &self,
        author_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, content, date_posted, user_id
              FROM posts
             WHERE user_id = $1
             ORDER BY date_posted DESC
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self)
        .await
        .context("list posts by author")?;
        Ok(rows)
    }
}
