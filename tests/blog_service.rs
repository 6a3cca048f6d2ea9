mod support;

use std::sync::Arc;

use sensive::application::blog::BlogError;
use time::{Duration, macros::datetime};

use support::MemoryBlog;

fn titles(cards: &[sensive::presentation::views::PostCard]) -> Vec<&str> {
    cards.iter().map(|card| card.title.as_str()).collect()
}

fn seven_days_of_posts() -> MemoryBlog {
    let mut store = MemoryBlog::default();
    let author = store.user("alice");
    let start = datetime!(2024-03-01 09:00 UTC);
    for day in 1..=7 {
        store.post(
            &format!("day-{day}"),
            &format!("Day {day}"),
            author,
            start + Duration::days(day),
        );
    }
    store
}

#[tokio::test]
async fn first_page_shows_latest_window_oldest_first() {
    let blog = support::service(Arc::new(seven_days_of_posts()));

    let context = blog.index_context(1).await.expect("index");

    assert_eq!(
        titles(&context.page_posts),
        ["Day 3", "Day 4", "Day 5", "Day 6", "Day 7"]
    );
    assert_eq!(context.pagination.newer_href, None);
    assert_eq!(context.pagination.older_href.as_deref(), Some("/page/2"));
}

#[tokio::test]
async fn second_page_holds_the_remainder() {
    let blog = support::service(Arc::new(seven_days_of_posts()));

    let context = blog.index_context(2).await.expect("second page");

    assert_eq!(titles(&context.page_posts), ["Day 1", "Day 2"]);
    assert_eq!(context.pagination.newer_href.as_deref(), Some("/"));
    assert_eq!(context.pagination.older_href, None);
}

#[tokio::test]
async fn pages_outside_the_listing_are_rejected() {
    let blog = support::service(Arc::new(seven_days_of_posts()));

    assert!(matches!(
        blog.index_context(0).await,
        Err(BlogError::InvalidPage(0))
    ));
    assert!(matches!(
        blog.index_context(3).await,
        Err(BlogError::InvalidPage(3))
    ));
}

#[tokio::test]
async fn empty_blog_still_renders_first_page() {
    let blog = support::service(Arc::new(MemoryBlog::default()));

    let context = blog.index_context(1).await.expect("empty index");

    assert!(context.page_posts.is_empty());
    assert!(context.most_popular_posts.is_empty());
    assert!(context.popular_tags.is_empty());
    assert!(matches!(
        blog.index_context(2).await,
        Err(BlogError::InvalidPage(2))
    ));
}

#[tokio::test]
async fn popular_posts_follow_like_counts() {
    let mut store = MemoryBlog::default();
    let alice = store.user("alice");
    let bob = store.user("bob");
    let carol = store.user("carol");
    store.post("quiet", "Quiet", alice, datetime!(2024-01-03 10:00 UTC));
    let loved = store.post("loved", "Loved", alice, datetime!(2024-01-01 10:00 UTC));
    let liked = store.post("liked", "Liked", alice, datetime!(2024-01-02 10:00 UTC));
    store.like(bob, loved);
    store.like(carol, loved);
    store.like(alice, loved);
    store.like(bob, liked);

    let blog = support::service(Arc::new(store));
    let context = blog.index_context(1).await.expect("index");

    assert_eq!(
        titles(&context.most_popular_posts),
        ["Loved", "Liked", "Quiet"]
    );
}

#[tokio::test]
async fn cards_carry_counts_tags_and_media_urls() {
    let mut store = MemoryBlog::default();
    let alice = store.user("alice");
    let post = store.post("tagged", "Tagged", alice, datetime!(2024-05-10 12:00 UTC));
    let other = store.post("other", "Other", alice, datetime!(2024-05-09 12:00 UTC));
    store.set_image(post, "posts/cover.jpg");
    let travel = store.tag("travel");
    let food = store.tag("food");
    store.tag_post(post, travel);
    store.tag_post(post, food);
    store.tag_post(other, travel);
    store.comment(post, alice, "first", datetime!(2024-05-10 13:00 UTC));
    store.comment(post, alice, "second", datetime!(2024-05-10 14:00 UTC));

    let blog = support::service(Arc::new(store));
    let context = blog.index_context(1).await.expect("index");
    let card = context
        .page_posts
        .iter()
        .find(|card| card.slug == "tagged")
        .expect("tagged card");

    assert_eq!(card.url, "/post/tagged");
    assert_eq!(card.comments_amount, 2);
    assert_eq!(card.image_url.as_deref(), Some("/media/posts/cover.jpg"));
    assert_eq!(card.published, "May 10, 2024");
    assert_eq!(card.first_tag_title.as_deref(), Some("food"));
    let counts: Vec<(&str, u64)> = card
        .tags
        .iter()
        .map(|tag| (tag.title.as_str(), tag.posts_with_tag))
        .collect();
    assert_eq!(counts, [("food", 1), ("travel", 2)]);

    let sidebar: Vec<&str> = context
        .popular_tags
        .iter()
        .map(|tag| tag.title.as_str())
        .collect();
    assert_eq!(sidebar, ["travel", "food"]);
}

#[tokio::test]
async fn teaser_is_cut_to_configured_length() {
    let mut store = MemoryBlog::default();
    let alice = store.user("alice");
    store.post("long", "Abcdefghij", alice, datetime!(2024-05-10 12:00 UTC));

    let mut settings = support::settings();
    settings.teaser_chars = 4;
    let blog = support::service_with(Arc::new(store), settings);
    let context = blog.index_context(1).await.expect("index");

    assert_eq!(context.page_posts[0].teaser_text, "Abcd");
}

#[tokio::test]
async fn post_detail_lists_comments_oldest_first() {
    let mut store = MemoryBlog::default();
    let alice = store.user("alice");
    let bob = store.user("bob");
    let post = store.post("hello", "Hello", alice, datetime!(2024-02-01 08:00 UTC));
    store.comment(post, bob, "later", datetime!(2024-02-02 18:30 UTC));
    store.comment(post, alice, "earlier", datetime!(2024-02-01 09:15 UTC));
    store.like(bob, post);

    let blog = support::service(Arc::new(store));
    let context = blog
        .post_detail("hello")
        .await
        .expect("detail")
        .expect("post exists");

    let comments: Vec<(&str, &str)> = context
        .post
        .comments
        .iter()
        .map(|comment| (comment.author.as_str(), comment.text.as_str()))
        .collect();
    assert_eq!(comments, [("alice", "earlier"), ("bob", "later")]);
    assert_eq!(context.post.comments[1].published, "February 2, 2024 18:30");
    assert_eq!(context.post.likes_amount, 1);
    assert_eq!(context.post.author, "alice");
}

#[tokio::test]
async fn dates_follow_the_configured_time_zone() {
    let mut store = MemoryBlog::default();
    let alice = store.user("alice");
    store.post("late", "Late", alice, datetime!(2024-02-01 22:30 UTC));

    let mut settings = support::settings();
    settings.timezone = chrono_tz::Europe::Moscow;
    let blog = support::service_with(Arc::new(store), settings);
    let context = blog
        .post_detail("late")
        .await
        .expect("detail")
        .expect("post exists");

    assert_eq!(context.post.published, "February 2, 2024");
    assert!(context.post.iso_date.ends_with("+03:00"));
}

#[tokio::test]
async fn unknown_slug_is_absent() {
    let blog = support::service(Arc::new(seven_days_of_posts()));
    assert!(blog.post_detail("missing").await.expect("lookup").is_none());
}

#[tokio::test]
async fn tag_filter_normalizes_the_title() {
    let mut store = MemoryBlog::default();
    let alice = store.user("alice");
    let first = store.post("first", "First", alice, datetime!(2024-01-01 10:00 UTC));
    let second = store.post("second", "Second", alice, datetime!(2024-01-02 10:00 UTC));
    store.post("untagged", "Untagged", alice, datetime!(2024-01-03 10:00 UTC));
    let rust = store.tag("rust");
    store.tag_post(first, rust);
    store.tag_post(second, rust);

    let blog = support::service(Arc::new(store));
    let context = blog
        .tag_filter("  Rust ")
        .await
        .expect("filter")
        .expect("tag exists");

    assert_eq!(context.tag, "rust");
    assert_eq!(titles(&context.posts), ["Second", "First"]);
    assert!(blog.tag_filter("go").await.expect("filter").is_none());
    assert!(blog.tag_filter("   ").await.expect("filter").is_none());
}

#[tokio::test]
async fn year_archive_is_chronological_and_skips_empty_years() {
    let mut store = MemoryBlog::default();
    let alice = store.user("alice");
    store.post("summer", "Summer", alice, datetime!(2023-07-01 10:00 UTC));
    store.post("spring", "Spring", alice, datetime!(2023-04-01 10:00 UTC));
    store.post("next", "Next", alice, datetime!(2024-01-01 00:00 UTC));

    let blog = support::service(Arc::new(store));
    let context = blog
        .year_archive(2023)
        .await
        .expect("archive")
        .expect("posts in 2023");

    assert_eq!(context.year, 2023);
    assert_eq!(titles(&context.posts), ["Spring", "Summer"]);
    assert!(blog.year_archive(2022).await.expect("archive").is_none());
    assert!(blog.year_archive(i32::MAX).await.expect("archive").is_none());
}

#[tokio::test]
async fn contacts_expose_the_configured_address() {
    let blog = support::service(Arc::new(MemoryBlog::default()));
    assert_eq!(
        blog.contacts().email.as_deref(),
        Some("editor@example.com")
    );
}

#[tokio::test]
async fn detail_pages_list_every_tag_while_index_is_limited() {
    let mut store = MemoryBlog::default();
    let alice = store.user("alice");
    let post = store.post("many", "Many tags", alice, datetime!(2024-01-01 10:00 UTC));
    for title in ["a", "b", "c", "d", "e", "f", "g"] {
        let tag = store.tag(title);
        store.tag_post(post, tag);
    }

    let blog = support::service(Arc::new(store));
    let index = blog.index_context(1).await.expect("index");
    assert_eq!(index.popular_tags.len(), 5);

    let detail = blog
        .post_detail("many")
        .await
        .expect("detail")
        .expect("post exists");
    assert_eq!(detail.popular_tags.len(), 7);

    let filtered = blog
        .tag_filter("g")
        .await
        .expect("filter")
        .expect("tag exists");
    assert_eq!(filtered.popular_tags.len(), 7);
}

#[tokio::test]
async fn index_loads_each_aggregate_once_when_sidebar_and_page_overlap() {
    let mut store = MemoryBlog::default();
    let alice = store.user("alice");
    let bob = store.user("bob");
    let first = store.post("first", "First", alice, datetime!(2024-01-01 10:00 UTC));
    let second = store.post("second", "Second", alice, datetime!(2024-01-02 10:00 UTC));
    store.post("third", "Third", alice, datetime!(2024-01-03 10:00 UTC));
    for title in ["a", "b", "c", "d", "e", "f", "g"] {
        let tag = store.tag(title);
        store.tag_post(first, tag);
    }
    store.like(bob, second);
    store.comment(first, bob, "hello", datetime!(2024-01-04 10:00 UTC));

    let store = Arc::new(store);
    let blog = support::service(store.clone());
    let context = blog.index_context(1).await.expect("index");

    assert_eq!(context.most_popular_posts.len(), 3);
    assert_eq!(context.page_posts.len(), 3);
    assert_eq!(store.aggregate_calls("comment_counts"), [3]);
    assert_eq!(store.aggregate_calls("tags_for_posts"), [3]);
    // Only the two tags outside the popular sidebar need a count.
    assert_eq!(store.aggregate_calls("post_counts"), [2]);
    assert!(store.aggregate_calls("like_counts").is_empty());

    let card = context
        .page_posts
        .iter()
        .find(|card| card.slug == "first")
        .expect("first card");
    assert_eq!(card.comments_amount, 1);
    assert_eq!(card.tags.len(), 7);
}
