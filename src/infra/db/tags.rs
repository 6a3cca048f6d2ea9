use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, TagsRepo, convert_count},
    domain::entities::{TagRecord, TagWithCount},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct TagRow {
    id: Uuid,
    title: String,
}

impl From<TagRow> for TagRecord {
    fn from(row: TagRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TagCountRow {
    id: Uuid,
    title: String,
    posts_count: i64,
}

#[async_trait]
impl TagsRepo for PostgresRepositories {
    async fn list_popular(&self, limit: Option<u32>) -> Result<Vec<TagWithCount>, RepoError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT t.id, t.title, COUNT(pt.post_id) AS posts_count \
             FROM tags t \
             LEFT JOIN post_tags pt ON pt.tag_id = t.id \
             GROUP BY t.id \
             ORDER BY posts_count DESC, t.title ASC",
        );
        if let Some(limit) = limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit));
        }

        let rows = qb
            .build_query_as::<TagCountRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(TagWithCount {
                    id: row.id,
                    title: row.title,
                    posts_count: convert_count(row.posts_count)?,
                })
            })
            .collect()
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<TagRecord>, RepoError> {
        let row = sqlx::query_as::<_, TagRow>("SELECT id, title FROM tags WHERE title = $1")
            .bind(title)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(TagRecord::from))
    }
}
