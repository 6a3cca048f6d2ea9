//! Repository traits describing persistence adapters.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::site::ContentArchive;
use crate::domain::entities::{CommentRecord, PostRecord, TagRecord, TagWithCount};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Offset window over a stable ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u32,
}

impl Window {
    pub fn new(offset: u64, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// Window for a 1-based page number.
    pub fn page(page: u32, limit: u32) -> Self {
        let index = u64::from(page.saturating_sub(1));
        Self::new(index.saturating_mul(u64::from(limit)), limit)
    }
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Posts ordered by like count (descending), newest first on ties.
    async fn list_popular(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError>;

    /// Posts ordered newest first.
    async fn list_recent(&self, window: Window) -> Result<Vec<PostRecord>, RepoError>;

    /// Posts carrying the tag, newest first.
    async fn list_for_tag(&self, tag_id: Uuid, limit: u32) -> Result<Vec<PostRecord>, RepoError>;

    /// Posts published within the calendar year (UTC), oldest first.
    async fn list_for_year(&self, year: i32) -> Result<Vec<PostRecord>, RepoError>;

    async fn count_posts(&self) -> Result<u64, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    /// Tags with their post counts ordered by count (descending) then title.
    async fn list_popular(&self, limit: Option<u32>) -> Result<Vec<TagWithCount>, RepoError>;

    /// Lookup by normalised title.
    async fn find_by_title(&self, title: &str) -> Result<Option<TagRecord>, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Comments of a post, oldest first.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError>;
}

/// Grouped counting queries. Every method takes a batch of ids and answers
/// with one round trip; ids missing from the returned map count as zero.
#[async_trait]
pub trait AggregatesRepo: Send + Sync {
    async fn comment_counts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError>;

    async fn like_counts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError>;

    async fn post_counts(&self, tag_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError>;

    /// Tags of every post in the batch, each list ordered by title.
    async fn tags_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<TagRecord>>, RepoError>;
}

#[async_trait]
pub trait ArchiveRepo: Send + Sync {
    async fn export_archive(&self) -> Result<ContentArchive, RepoError>;

    /// Replace all content atomically with the (already validated) archive.
    async fn replace_with_archive(&self, archive: &ContentArchive) -> Result<(), RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}

pub(crate) fn convert_count(value: i64) -> Result<u64, RepoError> {
    value
        .try_into()
        .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_is_one_based() {
        assert_eq!(Window::page(1, 5), Window::new(0, 5));
        assert_eq!(Window::page(3, 5), Window::new(10, 5));
        assert_eq!(Window::page(0, 5), Window::new(0, 5));
    }

    #[test]
    fn negative_counts_are_rejected() {
        assert!(convert_count(-1).is_err());
        assert_eq!(convert_count(7).unwrap(), 7);
    }
}
