//! Grouped counting queries, one round trip per batch of ids.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{AggregatesRepo, RepoError, convert_count},
    domain::entities::TagRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CountRow {
    id: Uuid,
    count: i64,
}

#[derive(sqlx::FromRow)]
struct PostTagRow {
    post_id: Uuid,
    tag_id: Uuid,
    title: String,
}

impl PostgresRepositories {
    async fn grouped_counts(
        &self,
        sql: &str,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, u64>, RepoError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, CountRow>(sql)
            .bind(ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| Ok((row.id, convert_count(row.count)?)))
            .collect()
    }
}

#[async_trait]
impl AggregatesRepo for PostgresRepositories {
    async fn comment_counts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError> {
        self.grouped_counts(
            "SELECT post_id AS id, COUNT(*) AS count FROM comments \
             WHERE post_id = ANY($1) GROUP BY post_id",
            post_ids,
        )
        .await
    }

    async fn like_counts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError> {
        self.grouped_counts(
            "SELECT post_id AS id, COUNT(*) AS count FROM post_likes \
             WHERE post_id = ANY($1) GROUP BY post_id",
            post_ids,
        )
        .await
    }

    async fn post_counts(&self, tag_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError> {
        self.grouped_counts(
            "SELECT tag_id AS id, COUNT(*) AS count FROM post_tags \
             WHERE tag_id = ANY($1) GROUP BY tag_id",
            tag_ids,
        )
        .await
    }

    async fn tags_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<TagRecord>>, RepoError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, PostTagRow>(
            r#"
            SELECT pt.post_id, t.id AS tag_id, t.title
            FROM post_tags pt
            INNER JOIN tags t ON t.id = pt.tag_id
            WHERE pt.post_id = ANY($1)
            ORDER BY pt.post_id, t.title
            "#,
        )
        .bind(post_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut tags: HashMap<Uuid, Vec<TagRecord>> = HashMap::new();
        for row in rows {
            tags.entry(row.post_id).or_default().push(TagRecord {
                id: row.tag_id,
                title: row.title,
            });
        }
        Ok(tags)
    }
}
