//! Read side of the blog: assembles page contexts from repositories.

use std::sync::Arc;

use chrono_tz::Tz;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing::debug;
use uuid::Uuid;

use crate::application::aggregates::RequestAggregates;
use crate::application::repos::{
    AggregatesRepo, CommentsRepo, PostsRepo, RepoError, TagsRepo, Window,
};
use crate::domain::entities::{CommentRecord, PostRecord, TagWithCount};
use crate::domain::posts::{HUMAN_DATETIME_FORMAT, format_human_date, teaser, year_bounds};
use crate::domain::tags::{normalize_tag_title, tag_path};
use crate::presentation::views::{
    CommentView, ContactsView, IndexContext, LayoutChrome, NavigationLinkView, PageMetaView,
    PaginationView, PostCard, PostDetailContext, PostDetailView, TagFilterContext, TagSummary,
    YearArchiveContext,
};
use crate::util::timezone;

/// Presentation knobs of the public site.
#[derive(Debug, Clone)]
pub struct BlogSettings {
    pub site_title: String,
    pub site_description: String,
    pub footer_copy: String,
    pub contact_email: Option<String>,
    pub timezone: Tz,
    pub popular_posts_limit: u32,
    pub popular_tags_limit: u32,
    pub fresh_posts_limit: u32,
    pub tag_posts_limit: u32,
    pub teaser_chars: usize,
    pub media_url_prefix: String,
}

impl BlogSettings {
    pub fn media_url(&self, path: &str) -> String {
        format!("{}/{}", self.media_url_prefix.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("page {0} is outside the listing")]
    InvalidPage(u32),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct BlogService {
    posts: Arc<dyn PostsRepo>,
    tags: Arc<dyn TagsRepo>,
    comments: Arc<dyn CommentsRepo>,
    aggregates: Arc<dyn AggregatesRepo>,
    settings: Arc<BlogSettings>,
}

impl BlogService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        tags: Arc<dyn TagsRepo>,
        comments: Arc<dyn CommentsRepo>,
        aggregates: Arc<dyn AggregatesRepo>,
        settings: BlogSettings,
    ) -> Self {
        Self {
            posts,
            tags,
            comments,
            aggregates,
            settings: Arc::new(settings),
        }
    }

    pub fn chrome(&self) -> LayoutChrome {
        LayoutChrome {
            site_title: self.settings.site_title.clone(),
            navigation: vec![
                NavigationLinkView {
                    label: "Home".to_string(),
                    href: "/".to_string(),
                },
                NavigationLinkView {
                    label: "Contacts".to_string(),
                    href: "/contacts/".to_string(),
                },
            ],
            footer_copy: self.settings.footer_copy.clone(),
            meta: PageMetaView {
                title: self.settings.site_title.clone(),
                description: self.settings.site_description.clone(),
            },
        }
    }

    /// Home page. Page `n` shows the `n`-th window of fresh posts, oldest of
    /// the window first.
    pub async fn index_context(&self, page: u32) -> Result<IndexContext, BlogError> {
        if page == 0 {
            return Err(BlogError::InvalidPage(page));
        }

        let limit = self.settings.fresh_posts_limit;
        let total = self.posts.count_posts().await?;
        let pages = total.div_ceil(u64::from(limit.max(1)));
        if page > 1 && u64::from(page) > pages {
            return Err(BlogError::InvalidPage(page));
        }

        let mut fresh = self.posts.list_recent(Window::page(page, limit)).await?;
        fresh.reverse();
        let (popular, popular_tags) = self
            .sidebars(Some(self.settings.popular_tags_limit))
            .await?;

        let mut memo = self.memo();
        memo.remember_tag_counts(&popular_tags);
        memo.prime_post_cards(&[popular.as_slice(), fresh.as_slice()].concat())
            .await?;

        debug!(
            target = "sensive::blog",
            page,
            total,
            fresh = fresh.len(),
            "index context assembled"
        );

        Ok(IndexContext {
            most_popular_posts: self.post_cards(&popular, &memo),
            page_posts: self.post_cards(&fresh, &memo),
            popular_tags: tag_summaries(&popular_tags),
            pagination: pagination_view(page, pages),
        })
    }

    /// Popular posts and tags shown beside the main content. `tag_limit` of
    /// `None` lists every tag.
    async fn sidebars(
        &self,
        tag_limit: Option<u32>,
    ) -> Result<(Vec<PostRecord>, Vec<TagWithCount>), RepoError> {
        futures::try_join!(
            self.posts.list_popular(self.settings.popular_posts_limit),
            self.tags.list_popular(tag_limit),
        )
    }

    pub async fn post_detail(&self, slug: &str) -> Result<Option<PostDetailContext>, BlogError> {
        let Some(post) = self.posts.find_by_slug(slug).await? else {
            return Ok(None);
        };

        let comments = self.comments.list_for_post(post.id).await?;
        let (popular, popular_tags) = self.sidebars(None).await?;

        let mut memo = self.memo();
        memo.remember_tag_counts(&popular_tags);
        memo.prime_likes(&[post.id]).await?;
        memo.prime_post_cards(&[std::slice::from_ref(&post), popular.as_slice()].concat())
            .await?;

        Ok(Some(PostDetailContext {
            post: self.post_detail_view(&post, &comments, &memo),
            popular_tags: tag_summaries(&popular_tags),
            most_popular_posts: self.post_cards(&popular, &memo),
        }))
    }

    /// Newest posts carrying the tag. `None` when no such tag exists.
    pub async fn tag_filter(&self, title: &str) -> Result<Option<TagFilterContext>, BlogError> {
        let Ok(title) = normalize_tag_title(title) else {
            return Ok(None);
        };
        let Some(tag) = self.tags.find_by_title(&title).await? else {
            return Ok(None);
        };

        let posts = self
            .posts
            .list_for_tag(tag.id, self.settings.tag_posts_limit)
            .await?;
        let (popular, popular_tags) = self.sidebars(None).await?;

        let mut memo = self.memo();
        memo.remember_tag_counts(&popular_tags);
        memo.prime_post_cards(&[posts.as_slice(), popular.as_slice()].concat())
            .await?;

        Ok(Some(TagFilterContext {
            tag: tag.title,
            posts: self.post_cards(&posts, &memo),
            popular_tags: tag_summaries(&popular_tags),
            most_popular_posts: self.post_cards(&popular, &memo),
        }))
    }

    /// Posts of a calendar year, oldest first. `None` when the year is empty.
    pub async fn year_archive(&self, year: i32) -> Result<Option<YearArchiveContext>, BlogError> {
        if year_bounds(year).is_err() {
            return Ok(None);
        }

        let posts = self.posts.list_for_year(year).await?;
        if posts.is_empty() {
            return Ok(None);
        }
        let popular_tags = self
            .tags
            .list_popular(Some(self.settings.popular_tags_limit))
            .await?;

        let mut memo = self.memo();
        memo.remember_tag_counts(&popular_tags);
        memo.prime_post_cards(&posts).await?;

        Ok(Some(YearArchiveContext {
            year,
            posts: self.post_cards(&posts, &memo),
            popular_tags: tag_summaries(&popular_tags),
        }))
    }

    pub fn contacts(&self) -> ContactsView {
        ContactsView {
            email: self.settings.contact_email.clone(),
        }
    }

    fn memo(&self) -> RequestAggregates {
        RequestAggregates::new(self.aggregates.clone())
    }

    fn post_cards(&self, posts: &[PostRecord], memo: &RequestAggregates) -> Vec<PostCard> {
        posts.iter().map(|post| self.post_card(post, memo)).collect()
    }

    fn post_card(&self, post: &PostRecord, memo: &RequestAggregates) -> PostCard {
        let tags = self.post_tags(post.id, memo);
        let local = timezone::to_local(post.published_at, self.settings.timezone);

        PostCard {
            title: post.title.clone(),
            teaser_text: teaser(&post.text, self.settings.teaser_chars),
            author: post.author_username.clone(),
            comments_amount: memo.comments_count(post.id),
            image_url: post.image_path.as_deref().map(|path| self.settings.media_url(path)),
            published: format_human_date(local.date()),
            iso_date: local.format(&Rfc3339).unwrap_or_default(),
            slug: post.slug.clone(),
            url: post_path(&post.slug),
            first_tag_title: tags.first().map(|tag| tag.title.clone()),
            tags,
        }
    }

    fn post_detail_view(
        &self,
        post: &PostRecord,
        comments: &[CommentRecord],
        memo: &RequestAggregates,
    ) -> PostDetailView {
        let local = timezone::to_local(post.published_at, self.settings.timezone);

        PostDetailView {
            title: post.title.clone(),
            text: post.text.clone(),
            author: post.author_username.clone(),
            comments: comments
                .iter()
                .map(|comment| self.comment_view(comment))
                .collect(),
            likes_amount: memo.likes_count(post.id),
            image_url: post.image_path.as_deref().map(|path| self.settings.media_url(path)),
            published: format_human_date(local.date()),
            iso_date: local.format(&Rfc3339).unwrap_or_default(),
            slug: post.slug.clone(),
            tags: self.post_tags(post.id, memo),
        }
    }

    fn comment_view(&self, comment: &CommentRecord) -> CommentView {
        let local = timezone::to_local(comment.published_at, self.settings.timezone);

        CommentView {
            text: comment.text.clone(),
            published: local
                .format(HUMAN_DATETIME_FORMAT)
                .unwrap_or_else(|_| format_human_date(local.date())),
            iso_date: local.format(&Rfc3339).unwrap_or_default(),
            author: comment.author_username.clone(),
        }
    }

    fn post_tags(&self, post_id: Uuid, memo: &RequestAggregates) -> Vec<TagSummary> {
        memo.tags_of(post_id)
            .iter()
            .map(|tag| TagSummary {
                title: tag.title.clone(),
                url: tag_path(&tag.title),
                posts_with_tag: memo.tag_posts_count(tag.id),
            })
            .collect()
    }
}

pub fn post_path(slug: &str) -> String {
    format!("/post/{slug}")
}

fn tag_summaries(tags: &[TagWithCount]) -> Vec<TagSummary> {
    tags.iter()
        .map(|tag| TagSummary {
            title: tag.title.clone(),
            url: tag_path(&tag.title),
            posts_with_tag: tag.posts_count,
        })
        .collect()
}

fn pagination_view(page: u32, pages: u64) -> PaginationView {
    let newer_href = match page {
        0 | 1 => None,
        2 => Some("/".to_string()),
        _ => Some(format!("/page/{}", page - 1)),
    };
    let older_href = (u64::from(page) < pages).then(|| format!("/page/{}", page + 1));

    PaginationView {
        page,
        newer_href,
        older_href,
    }
}
