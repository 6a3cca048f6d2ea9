//! Domain entities mirrored from persistent storage.

use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub is_staff: bool,
}

/// A published article. `author_username` is joined in by the repository so
/// views never need a second lookup per post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub text: String,
    pub image_path: Option<String>,
    pub published_at: OffsetDateTime,
    pub author_id: Uuid,
    pub author_username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagWithCount {
    pub id: Uuid,
    pub title: String,
    pub posts_count: u64,
}

impl TagWithCount {
    pub fn record(&self) -> TagRecord {
        TagRecord {
            id: self.id,
            title: self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub published_at: OffsetDateTime,
}
