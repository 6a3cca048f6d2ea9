//! Per-request memo of derived counts.
//!
//! A page is assembled from several post and tag lists that often overlap
//! (the popular-posts sidebar repeats entries of the main list). Each list is
//! `prime`d once; only ids the memo has not seen are sent to the repository,
//! as one grouped query per aggregate. Lookups afterwards are in-memory.
//! The memo lives for one request and is dropped with it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use metrics::counter;
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{AggregatesRepo, RepoError};
use crate::domain::entities::{PostRecord, TagRecord, TagWithCount};

pub struct RequestAggregates {
    repo: Arc<dyn AggregatesRepo>,
    comments: HashMap<Uuid, u64>,
    likes: HashMap<Uuid, u64>,
    tag_posts: HashMap<Uuid, u64>,
    post_tags: HashMap<Uuid, Vec<TagRecord>>,
}

impl RequestAggregates {
    pub fn new(repo: Arc<dyn AggregatesRepo>) -> Self {
        Self {
            repo,
            comments: HashMap::new(),
            likes: HashMap::new(),
            tag_posts: HashMap::new(),
            post_tags: HashMap::new(),
        }
    }

    /// Load comment counts and tags for the posts, plus the post counts of
    /// every tag they carry.
    pub async fn prime_post_cards(&mut self, posts: &[PostRecord]) -> Result<(), RepoError> {
        let ids: Vec<Uuid> = posts.iter().map(|post| post.id).collect();

        let missing = missing_ids(&ids, &self.comments);
        if !missing.is_empty() {
            record_query("comment_counts");
            let counts = self.repo.comment_counts(&missing).await?;
            absorb_counts(&mut self.comments, &missing, counts);
        }

        let missing = missing_ids(&ids, &self.post_tags);
        if !missing.is_empty() {
            record_query("tags_for_posts");
            let mut tags = self.repo.tags_for_posts(&missing).await?;
            for id in missing {
                let list = tags.remove(&id).unwrap_or_default();
                self.post_tags.insert(id, list);
            }
        }

        let tag_ids: Vec<Uuid> = ids
            .iter()
            .filter_map(|id| self.post_tags.get(id))
            .flatten()
            .map(|tag| tag.id)
            .collect();
        self.prime_tag_ids(&tag_ids).await
    }

    pub async fn prime_likes(&mut self, post_ids: &[Uuid]) -> Result<(), RepoError> {
        let missing = missing_ids(post_ids, &self.likes);
        if missing.is_empty() {
            return Ok(());
        }

        record_query("like_counts");
        let counts = self.repo.like_counts(&missing).await?;
        absorb_counts(&mut self.likes, &missing, counts);
        Ok(())
    }

    pub async fn prime_tags(&mut self, tags: &[TagRecord]) -> Result<(), RepoError> {
        let ids: Vec<Uuid> = tags.iter().map(|tag| tag.id).collect();
        self.prime_tag_ids(&ids).await
    }

    /// Seed tag counts that arrived already annotated by the repository.
    pub fn remember_tag_counts(&mut self, tags: &[TagWithCount]) {
        for tag in tags {
            self.tag_posts.insert(tag.id, tag.posts_count);
        }
    }

    async fn prime_tag_ids(&mut self, ids: &[Uuid]) -> Result<(), RepoError> {
        let missing = missing_ids(ids, &self.tag_posts);
        if missing.is_empty() {
            return Ok(());
        }

        record_query("post_counts");
        let counts = self.repo.post_counts(&missing).await?;
        absorb_counts(&mut self.tag_posts, &missing, counts);
        Ok(())
    }

    pub fn comments_count(&self, post_id: Uuid) -> u64 {
        self.comments.get(&post_id).copied().unwrap_or(0)
    }

    pub fn likes_count(&self, post_id: Uuid) -> u64 {
        self.likes.get(&post_id).copied().unwrap_or(0)
    }

    pub fn tag_posts_count(&self, tag_id: Uuid) -> u64 {
        self.tag_posts.get(&tag_id).copied().unwrap_or(0)
    }

    pub fn tags_of(&self, post_id: Uuid) -> &[TagRecord] {
        self.post_tags
            .get(&post_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn missing_ids<V>(ids: &[Uuid], known: &HashMap<Uuid, V>) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .copied()
        .filter(|id| !known.contains_key(id) && seen.insert(*id))
        .collect()
}

fn absorb_counts(
    target: &mut HashMap<Uuid, u64>,
    requested: &[Uuid],
    mut fetched: HashMap<Uuid, u64>,
) {
    for id in requested {
        let count = fetched.remove(id).unwrap_or(0);
        target.insert(*id, count);
    }
}

fn record_query(aggregate: &'static str) {
    counter!("sensive_aggregate_query_total", "aggregate" => aggregate).increment(1);
    debug!(target = "sensive::aggregates", aggregate, "grouped count query");
}
