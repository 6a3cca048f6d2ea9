use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{PostsRepo, RepoError, Window, convert_count},
    domain::{entities::PostRecord, posts::year_bounds},
};

use super::{POST_COLUMNS, PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    slug: String,
    title: String,
    text: String,
    image_path: Option<String>,
    published_at: OffsetDateTime,
    author_id: Uuid,
    author_username: String,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            text: row.text,
            image_path: row.image_path,
            published_at: row.published_at,
            author_id: row.author_id,
            author_username: row.author_username,
        }
    }
}

fn select_posts<'q>() -> QueryBuilder<'q, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(POST_COLUMNS);
    qb.push(" FROM posts p INNER JOIN users u ON u.id = p.author_id ");
    qb
}

fn to_i64(value: u64) -> Result<i64, RepoError> {
    i64::try_from(value).map_err(|_| RepoError::InvalidInput {
        message: format!("offset {value} exceeds supported range"),
    })
}

impl PostgresRepositories {
    async fn fetch_posts(
        &self,
        mut qb: QueryBuilder<'_, Postgres>,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_popular(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = select_posts();
        qb.push(
            "LEFT JOIN post_likes l ON l.post_id = p.id \
             GROUP BY p.id, u.username \
             ORDER BY COUNT(l.user_id) DESC, p.published_at DESC, p.id LIMIT ",
        );
        qb.push_bind(i64::from(limit));

        self.fetch_posts(qb).await
    }

    async fn list_recent(&self, window: Window) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = select_posts();
        qb.push("ORDER BY p.published_at DESC, p.id LIMIT ");
        qb.push_bind(i64::from(window.limit));
        qb.push(" OFFSET ");
        qb.push_bind(to_i64(window.offset)?);

        self.fetch_posts(qb).await
    }

    async fn list_for_tag(&self, tag_id: Uuid, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = select_posts();
        qb.push("INNER JOIN post_tags pt ON pt.post_id = p.id WHERE pt.tag_id = ");
        qb.push_bind(tag_id);
        qb.push(" ORDER BY p.published_at DESC, p.id LIMIT ");
        qb.push_bind(i64::from(limit));

        self.fetch_posts(qb).await
    }

    async fn list_for_year(&self, year: i32) -> Result<Vec<PostRecord>, RepoError> {
        let (start, end) = year_bounds(year).map_err(|err| RepoError::InvalidInput {
            message: err.to_string(),
        })?;

        let mut qb = select_posts();
        qb.push("WHERE p.published_at >= ");
        qb.push_bind(start);
        qb.push(" AND p.published_at < ");
        qb.push_bind(end);
        qb.push(" ORDER BY p.published_at ASC, p.id");

        self.fetch_posts(qb).await
    }

    async fn count_posts(&self) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        convert_count(count)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = select_posts();
        qb.push("WHERE p.slug = ");
        qb.push_bind(slug);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}
