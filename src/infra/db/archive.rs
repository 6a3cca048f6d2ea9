//! Whole-content snapshot and replacement backing `export` and `import`.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, Transaction, query};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::{
        repos::{ArchiveRepo, RepoError},
        site::{CommentSnapshot, ContentArchive, PostSnapshot, TagSnapshot, UserSnapshot},
    },
    domain::entities::UserRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    is_staff: bool,
}

#[derive(sqlx::FromRow)]
struct ArchivePostRow {
    id: Uuid,
    slug: String,
    title: String,
    text: String,
    image_path: Option<String>,
    published_at: OffsetDateTime,
    author: String,
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    post_id: Uuid,
    value: String,
}

#[derive(sqlx::FromRow)]
struct ArchiveCommentRow {
    post: String,
    author: String,
    text: String,
    published_at: OffsetDateTime,
}

fn unresolved(kind: &str, value: &str) -> RepoError {
    RepoError::InvalidInput {
        message: format!("archive references unknown {kind} `{value}`"),
    }
}

fn group_links(rows: Vec<LinkRow>) -> HashMap<Uuid, Vec<String>> {
    let mut grouped: HashMap<Uuid, Vec<String>> = HashMap::new();
    for row in rows {
        grouped.entry(row.post_id).or_default().push(row.value);
    }
    grouped
}

impl PostgresRepositories {
    async fn fetch_users(&self) -> Result<Vec<UserRecord>, RepoError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, is_staff FROM users ORDER BY username",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| UserRecord {
                id: row.id,
                username: row.username,
                is_staff: row.is_staff,
            })
            .collect())
    }
}

#[async_trait]
impl ArchiveRepo for PostgresRepositories {
    async fn export_archive(&self) -> Result<ContentArchive, RepoError> {
        let users = self.fetch_users().await?;

        let tags: Vec<String> = sqlx::query_scalar("SELECT title FROM tags ORDER BY title")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let posts = sqlx::query_as::<_, ArchivePostRow>(
            r#"
            SELECT p.id, p.slug, p.title, p.text, p.image_path, p.published_at, u.username AS author
            FROM posts p
            INNER JOIN users u ON u.id = p.author_id
            ORDER BY p.published_at DESC, p.slug
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut post_tags = group_links(
            sqlx::query_as::<_, LinkRow>(
                "SELECT pt.post_id, t.title AS value FROM post_tags pt \
                 INNER JOIN tags t ON t.id = pt.tag_id ORDER BY t.title",
            )
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?,
        );
        let mut likers = group_links(
            sqlx::query_as::<_, LinkRow>(
                "SELECT l.post_id, u.username AS value FROM post_likes l \
                 INNER JOIN users u ON u.id = l.user_id ORDER BY u.username",
            )
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?,
        );

        let comments = sqlx::query_as::<_, ArchiveCommentRow>(
            r#"
            SELECT p.slug AS post, u.username AS author, c.text, c.published_at
            FROM comments c
            INNER JOIN posts p ON p.id = c.post_id
            INNER JOIN users u ON u.id = c.author_id
            ORDER BY p.slug, c.published_at
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ContentArchive {
            users: users
                .into_iter()
                .map(|user| UserSnapshot {
                    username: user.username,
                    is_staff: user.is_staff,
                })
                .collect(),
            tags: tags.into_iter().map(|title| TagSnapshot { title }).collect(),
            posts: posts
                .into_iter()
                .map(|row| PostSnapshot {
                    tags: post_tags.remove(&row.id).unwrap_or_default(),
                    liked_by: likers.remove(&row.id).unwrap_or_default(),
                    slug: Some(row.slug),
                    title: row.title,
                    text: row.text,
                    image: row.image_path,
                    published_at: row.published_at,
                    author: row.author,
                })
                .collect(),
            comments: comments
                .into_iter()
                .map(|row| CommentSnapshot {
                    post: row.post,
                    author: row.author,
                    text: row.text,
                    published_at: row.published_at,
                })
                .collect(),
        })
    }

    async fn replace_with_archive(&self, archive: &ContentArchive) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        query("TRUNCATE comments, post_likes, post_tags, posts, tags, users CASCADE")
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;

        let users = insert_users(&mut tx, &archive.users).await?;

        let mut tag_ids = HashMap::new();
        for tag in &archive.tags {
            let id = Uuid::new_v4();
            query("INSERT INTO tags (id, title) VALUES ($1, $2)")
                .bind(id)
                .bind(&tag.title)
                .execute(tx.as_mut())
                .await
                .map_err(map_sqlx_error)?;
            tag_ids.insert(tag.title.as_str(), id);
        }

        let mut post_ids = HashMap::new();
        for post in &archive.posts {
            let slug = post
                .slug
                .as_deref()
                .ok_or_else(|| unresolved("post slug for", &post.title))?;
            let author = *users
                .get(post.author.as_str())
                .ok_or_else(|| unresolved("author", &post.author))?;
            let id = Uuid::new_v4();

            query(
                r#"
                INSERT INTO posts (id, slug, title, text, image_path, published_at, author_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(id)
            .bind(slug)
            .bind(&post.title)
            .bind(&post.text)
            .bind(&post.image)
            .bind(post.published_at)
            .bind(author)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;

            for title in &post.tags {
                let tag_id = *tag_ids
                    .get(title.as_str())
                    .ok_or_else(|| unresolved("tag", title))?;
                query("INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2)")
                    .bind(id)
                    .bind(tag_id)
                    .execute(tx.as_mut())
                    .await
                    .map_err(map_sqlx_error)?;
            }

            for username in &post.liked_by {
                let user_id = *users
                    .get(username.as_str())
                    .ok_or_else(|| unresolved("user", username))?;
                query(
                    "INSERT INTO post_likes (user_id, post_id) VALUES ($1, $2) \
                     ON CONFLICT DO NOTHING",
                )
                .bind(user_id)
                .bind(id)
                .execute(tx.as_mut())
                .await
                .map_err(map_sqlx_error)?;
            }

            post_ids.insert(slug, id);
        }

        for comment in &archive.comments {
            let post_id = *post_ids
                .get(comment.post.as_str())
                .ok_or_else(|| unresolved("post", &comment.post))?;
            let author = *users
                .get(comment.author.as_str())
                .ok_or_else(|| unresolved("user", &comment.author))?;

            query(
                r#"
                INSERT INTO comments (id, post_id, author_id, text, published_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(post_id)
            .bind(author)
            .bind(&comment.text)
            .bind(comment.published_at)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}

async fn insert_users<'a>(
    tx: &mut Transaction<'_, Postgres>,
    users: &'a [UserSnapshot],
) -> Result<HashMap<&'a str, Uuid>, RepoError> {
    let mut ids = HashMap::with_capacity(users.len());
    for user in users {
        let id = Uuid::new_v4();
        query("INSERT INTO users (id, username, is_staff) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(&user.username)
            .bind(user.is_staff)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;
        ids.insert(user.username.as_str(), id);
    }
    Ok(ids)
}
