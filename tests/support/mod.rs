#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use sensive::application::blog::{BlogService, BlogSettings};
use sensive::application::repos::{
    AggregatesRepo, CommentsRepo, HealthRepo, PostsRepo, RepoError, TagsRepo, Window,
};
use sensive::domain::entities::{CommentRecord, PostRecord, TagRecord, TagWithCount, UserRecord};
use sensive::infra::http::HttpState;
use sensive::infra::media::MediaStorage;

/// Whole blog kept in memory, answering the same queries as Postgres.
pub struct MemoryBlog {
    users: Vec<UserRecord>,
    posts: Vec<PostRecord>,
    tags: Vec<TagRecord>,
    post_tags: Vec<(Uuid, Uuid)>,
    likes: Vec<(Uuid, Uuid)>,
    comments: Vec<CommentRecord>,
    healthy: AtomicBool,
    aggregate_calls: Mutex<Vec<(&'static str, usize)>>,
}

impl Default for MemoryBlog {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            posts: Vec::new(),
            tags: Vec::new(),
            post_tags: Vec::new(),
            likes: Vec::new(),
            comments: Vec::new(),
            healthy: AtomicBool::new(true),
            aggregate_calls: Mutex::new(Vec::new()),
        }
    }
}

impl MemoryBlog {
    pub fn user(&mut self, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.users.push(UserRecord {
            id,
            username: username.to_string(),
            is_staff: true,
        });
        id
    }

    pub fn post(&mut self, slug: &str, title: &str, author: Uuid, at: OffsetDateTime) -> Uuid {
        let id = Uuid::new_v4();
        self.posts.push(PostRecord {
            id,
            slug: slug.to_string(),
            title: title.to_string(),
            text: format!("{title} body text"),
            image_path: None,
            published_at: at,
            author_id: author,
            author_username: self.username(author),
        });
        id
    }

    pub fn set_image(&mut self, post: Uuid, path: &str) {
        if let Some(record) = self.posts.iter_mut().find(|record| record.id == post) {
            record.image_path = Some(path.to_string());
        }
    }

    pub fn tag(&mut self, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.tags.push(TagRecord {
            id,
            title: title.to_string(),
        });
        id
    }

    pub fn tag_post(&mut self, post: Uuid, tag: Uuid) {
        self.post_tags.push((post, tag));
    }

    pub fn like(&mut self, user: Uuid, post: Uuid) {
        self.likes.push((user, post));
    }

    pub fn comment(&mut self, post: Uuid, author: Uuid, text: &str, at: OffsetDateTime) {
        self.comments.push(CommentRecord {
            id: Uuid::new_v4(),
            post_id: post,
            author_id: author,
            author_username: self.username(author),
            text: text.to_string(),
            published_at: at,
        });
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Id counts of every `query` call answered so far, in call order.
    pub fn aggregate_calls(&self, query: &str) -> Vec<usize> {
        self.aggregate_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| *name == query)
            .map(|(_, ids)| *ids)
            .collect()
    }

    fn record_call(&self, query: &'static str, ids: usize) {
        self.aggregate_calls.lock().unwrap().push((query, ids));
    }

    fn username(&self, id: Uuid) -> String {
        self.users
            .iter()
            .find(|user| user.id == id)
            .map(|user| user.username.clone())
            .unwrap_or_default()
    }

    fn likes_of(&self, post: Uuid) -> u64 {
        self.likes.iter().filter(|(_, liked)| *liked == post).count() as u64
    }

    fn posts_with_tag(&self, tag: Uuid) -> u64 {
        self.post_tags.iter().filter(|(_, t)| *t == tag).count() as u64
    }

    fn newest_first(&self) -> Vec<PostRecord> {
        let mut posts = self.posts.clone();
        posts.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        posts
    }
}

#[async_trait]
impl PostsRepo for MemoryBlog {
    async fn list_popular(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        let mut posts = self.newest_first();
        posts.sort_by_key(|post| std::cmp::Reverse(self.likes_of(post.id)));
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn list_recent(&self, window: Window) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self
            .newest_first()
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect())
    }

    async fn list_for_tag(&self, tag_id: Uuid, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self
            .newest_first()
            .into_iter()
            .filter(|post| self.post_tags.contains(&(post.id, tag_id)))
            .take(limit as usize)
            .collect())
    }

    async fn list_for_year(&self, year: i32) -> Result<Vec<PostRecord>, RepoError> {
        let mut posts: Vec<PostRecord> = self
            .newest_first()
            .into_iter()
            .filter(|post| post.published_at.year() == year)
            .collect();
        posts.reverse();
        Ok(posts)
    }

    async fn count_posts(&self) -> Result<u64, RepoError> {
        Ok(self.posts.len() as u64)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.posts.iter().find(|post| post.slug == slug).cloned())
    }
}

#[async_trait]
impl TagsRepo for MemoryBlog {
    async fn list_popular(&self, limit: Option<u32>) -> Result<Vec<TagWithCount>, RepoError> {
        let mut tags: Vec<TagWithCount> = self
            .tags
            .iter()
            .map(|tag| TagWithCount {
                id: tag.id,
                title: tag.title.clone(),
                posts_count: self.posts_with_tag(tag.id),
            })
            .collect();
        tags.sort_by(|a, b| {
            b.posts_count
                .cmp(&a.posts_count)
                .then_with(|| a.title.cmp(&b.title))
        });
        if let Some(limit) = limit {
            tags.truncate(limit as usize);
        }
        Ok(tags)
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<TagRecord>, RepoError> {
        Ok(self.tags.iter().find(|tag| tag.title == title).cloned())
    }
}

#[async_trait]
impl CommentsRepo for MemoryBlog {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let mut comments: Vec<CommentRecord> = self
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by_key(|comment| comment.published_at);
        Ok(comments)
    }
}

#[async_trait]
impl AggregatesRepo for MemoryBlog {
    async fn comment_counts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError> {
        self.record_call("comment_counts", post_ids.len());
        let mut counts = HashMap::new();
        for comment in &self.comments {
            if post_ids.contains(&comment.post_id) {
                *counts.entry(comment.post_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn like_counts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError> {
        self.record_call("like_counts", post_ids.len());
        Ok(post_ids
            .iter()
            .map(|id| (*id, self.likes_of(*id)))
            .filter(|(_, count)| *count > 0)
            .collect())
    }

    async fn post_counts(&self, tag_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError> {
        self.record_call("post_counts", tag_ids.len());
        Ok(tag_ids
            .iter()
            .map(|id| (*id, self.posts_with_tag(*id)))
            .collect())
    }

    async fn tags_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<TagRecord>>, RepoError> {
        self.record_call("tags_for_posts", post_ids.len());
        let mut map: HashMap<Uuid, Vec<TagRecord>> = HashMap::new();
        for (post, tag) in &self.post_tags {
            if !post_ids.contains(post) {
                continue;
            }
            if let Some(record) = self.tags.iter().find(|record| record.id == *tag) {
                map.entry(*post).or_default().push(record.clone());
            }
        }
        for tags in map.values_mut() {
            tags.sort_by(|a, b| a.title.cmp(&b.title));
        }
        Ok(map)
    }
}

#[async_trait]
impl HealthRepo for MemoryBlog {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepoError::Timeout)
        }
    }
}

pub fn settings() -> BlogSettings {
    BlogSettings {
        site_title: "Sensive".to_string(),
        site_description: "Notes about everything".to_string(),
        footer_copy: "Sensive blog".to_string(),
        contact_email: Some("editor@example.com".to_string()),
        timezone: chrono_tz::UTC,
        popular_posts_limit: 5,
        popular_tags_limit: 5,
        fresh_posts_limit: 5,
        tag_posts_limit: 20,
        teaser_chars: 200,
        media_url_prefix: "/media".to_string(),
    }
}

pub fn service(store: Arc<MemoryBlog>) -> BlogService {
    service_with(store, settings())
}

pub fn service_with(store: Arc<MemoryBlog>, settings: BlogSettings) -> BlogService {
    BlogService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store,
        settings,
    )
}

pub fn http_state(store: Arc<MemoryBlog>, media_root: &Path) -> HttpState {
    HttpState {
        blog: Arc::new(service(store.clone())),
        media: Arc::new(MediaStorage::new(media_root.to_path_buf())),
        health: store,
    }
}
