//! Import/export of blog content as a TOML archive.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    path::Path,
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::{
    application::{error::AppError, repos::ArchiveRepo},
    domain::{
        posts::{validate_slug, validate_title},
        slug::generate_unique_slug,
        tags::normalize_tag_title,
    },
    infra::error::InfraError,
};

/// Export all content to the provided path as a TOML archive.
pub async fn export_site(repo: &dyn ArchiveRepo, path: &Path) -> Result<(), AppError> {
    let mut archive = repo.export_archive().await.map_err(AppError::from)?;
    archive.normalize();
    let encoded = toml::to_string_pretty(&archive)
        .map_err(|err| AppError::unexpected(format!("failed to encode archive: {err}")))?;
    tokio::fs::write(path, encoded)
        .await
        .map_err(|err| AppError::from(InfraError::Io(err)))?;

    info!(
        target = "sensive::archive",
        path = %path.display(),
        users = archive.users.len(),
        posts = archive.posts.len(),
        tags = archive.tags.len(),
        comments = archive.comments.len(),
        "content exported"
    );
    Ok(())
}

/// Replace all content with the archive stored at the provided path.
pub async fn import_site(repo: &dyn ArchiveRepo, path: &Path) -> Result<(), AppError> {
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| AppError::from(InfraError::Io(err)))?;
    let archive: ContentArchive = toml::from_str(&data)
        .map_err(|err| AppError::validation(format!("invalid archive: {err}")))?;
    let archive = archive.prepare()?;

    repo.replace_with_archive(&archive)
        .await
        .map_err(AppError::from)?;

    info!(
        target = "sensive::archive",
        path = %path.display(),
        users = archive.users.len(),
        posts = archive.posts.len(),
        tags = archive.tags.len(),
        comments = archive.comments.len(),
        "content imported"
    );
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentArchive {
    #[serde(default)]
    pub users: Vec<UserSnapshot>,
    #[serde(default)]
    pub tags: Vec<TagSnapshot>,
    #[serde(default)]
    pub posts: Vec<PostSnapshot>,
    #[serde(default)]
    pub comments: Vec<CommentSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub username: String,
    #[serde(default)]
    pub is_staff: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSnapshot {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSnapshot {
    /// Derived from the title when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub liked_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentSnapshot {
    pub post: String,
    pub author: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
}

impl ContentArchive {
    pub fn normalize(&mut self) {
        self.users.sort_by(|a, b| a.username.cmp(&b.username));
        self.tags.sort_by(|a, b| a.title.cmp(&b.title));
        self.posts.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.slug.cmp(&b.slug))
        });
        for post in &mut self.posts {
            post.tags.sort();
            post.liked_by.sort();
        }
        self.comments.sort_by(|a, b| {
            a.post
                .cmp(&b.post)
                .then(a.published_at.cmp(&b.published_at))
                .then_with(|| a.author.cmp(&b.author))
        });
    }

    /// Validate references and fill in derived values. The returned archive
    /// carries a slug on every post and only normalised tag titles.
    pub fn prepare(mut self) -> Result<Self, AppError> {
        let mut staff = HashMap::new();
        for user in &mut self.users {
            user.username = user.username.trim().to_string();
            if user.username.is_empty() {
                return Err(AppError::validation("user with empty username"));
            }
            if staff.insert(user.username.clone(), user.is_staff).is_some() {
                return Err(AppError::validation(format!(
                    "duplicate user `{}`",
                    user.username
                )));
            }
        }

        let mut tag_titles = HashSet::new();
        for tag in &mut self.tags {
            tag.title = normalize_tag_title(&tag.title)?;
            if !tag_titles.insert(tag.title.clone()) {
                return Err(AppError::validation(format!(
                    "duplicate tag `{}`",
                    tag.title
                )));
            }
        }

        let explicit: HashSet<String> = self
            .posts
            .iter()
            .filter_map(|post| post.slug.clone())
            .collect();
        let mut slugs = HashSet::new();
        for post in &mut self.posts {
            validate_title(&post.title)?;

            let slug = match post.slug.take() {
                Some(slug) => {
                    validate_slug(&slug)?;
                    slug
                }
                None => generate_unique_slug(&post.title, |candidate| {
                    !explicit.contains(candidate) && !slugs.contains(candidate)
                })
                .map_err(|err| AppError::validation(err.to_string()))?,
            };
            if !slugs.insert(slug.clone()) {
                return Err(AppError::validation(format!("duplicate post slug `{slug}`")));
            }
            post.slug = Some(slug.clone());

            post.author = post.author.trim().to_string();
            match staff.get(&post.author) {
                Some(true) => {}
                Some(false) => {
                    return Err(AppError::validation(format!(
                        "post `{slug}` author `{}` is not staff",
                        post.author
                    )));
                }
                None => {
                    return Err(AppError::validation(format!(
                        "post `{slug}` references unknown author `{}`",
                        post.author
                    )));
                }
            }

            if let Some(image) = &post.image {
                validate_image_path(image)
                    .map_err(|reason| AppError::validation(format!("post `{slug}`: {reason}")))?;
            }

            let mut tags = BTreeSet::new();
            for raw in &post.tags {
                let title = normalize_tag_title(raw)?;
                if !tag_titles.contains(&title) {
                    return Err(AppError::validation(format!(
                        "post `{slug}` references unknown tag `{title}`"
                    )));
                }
                tags.insert(title);
            }
            post.tags = tags.into_iter().collect();

            let mut likers = BTreeSet::new();
            for liker in &post.liked_by {
                let liker = liker.trim();
                if !staff.contains_key(liker) {
                    return Err(AppError::validation(format!(
                        "post `{slug}` liked by unknown user `{liker}`"
                    )));
                }
                likers.insert(liker.to_string());
            }
            post.liked_by = likers.into_iter().collect();
        }

        for comment in &mut self.comments {
            comment.author = comment.author.trim().to_string();
            if !slugs.contains(&comment.post) {
                return Err(AppError::validation(format!(
                    "comment references unknown post `{}`",
                    comment.post
                )));
            }
            if !staff.contains_key(&comment.author) {
                return Err(AppError::validation(format!(
                    "comment on `{}` references unknown author `{}`",
                    comment.post, comment.author
                )));
            }
        }

        self.normalize();
        Ok(self)
    }
}

fn validate_image_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("image path is empty".to_string());
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err(format!("image path `{path}` must be relative"));
    }
    if path.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        return Err(format!("image path `{path}` is not normalised"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::RepoError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::macros::datetime;

    fn archive() -> ContentArchive {
        ContentArchive {
            users: vec![
                UserSnapshot {
                    username: "admin".into(),
                    is_staff: true,
                },
                UserSnapshot {
                    username: "reader".into(),
                    is_staff: false,
                },
            ],
            tags: vec![TagSnapshot {
                title: " Rust ".into(),
            }],
            posts: vec![PostSnapshot {
                slug: None,
                title: "Привет, мир".into(),
                text: "Hello".into(),
                image: Some("posts/hello.jpg".into()),
                published_at: datetime!(2020-05-01 10:00 UTC),
                author: "admin".into(),
                tags: vec!["RUST".into(), "rust".into()],
                liked_by: vec!["reader".into(), "reader".into(), "admin".into()],
            }],
            comments: vec![CommentSnapshot {
                post: "privet-mir".into(),
                author: "reader".into(),
                text: "Nice".into(),
                published_at: datetime!(2020-05-02 10:00 UTC),
            }],
        }
    }

    #[test]
    fn prepare_normalises_and_derives_slugs() {
        let prepared = archive().prepare().expect("valid archive");

        assert_eq!(prepared.tags[0].title, "rust");
        let post = &prepared.posts[0];
        assert_eq!(post.slug.as_deref(), Some("privet-mir"));
        assert_eq!(post.tags, vec!["rust".to_string()]);
        assert_eq!(
            post.liked_by,
            vec!["admin".to_string(), "reader".to_string()]
        );
    }

    #[test]
    fn prepare_rejects_duplicate_tags_after_normalisation() {
        let mut archive = archive();
        archive.tags.push(TagSnapshot {
            title: "RUST".into(),
        });

        let err = archive.prepare().expect_err("duplicate tag");
        assert!(err.to_string().contains("duplicate tag `rust`"));
    }

    #[test]
    fn prepare_requires_staff_author() {
        let mut archive = archive();
        archive.posts[0].author = "reader".into();

        let err = archive.prepare().expect_err("non-staff author");
        assert!(err.to_string().contains("is not staff"));
    }

    #[test]
    fn prepare_trims_username_references() {
        let mut archive = archive();
        archive.users[0].username = " admin".into();
        archive.posts[0].author = "admin ".into();
        archive.posts[0].liked_by = vec![" reader ".into(), "reader".into()];
        archive.comments[0].author = "\treader\n".into();

        let prepared = archive.prepare().expect("padded names resolve");

        assert_eq!(prepared.users[0].username, "admin");
        assert_eq!(prepared.posts[0].author, "admin");
        assert_eq!(prepared.posts[0].liked_by, vec!["reader".to_string()]);
        assert_eq!(prepared.comments[0].author, "reader");
    }

    #[test]
    fn prepare_rejects_dangling_references() {
        let mut unknown_liker = archive();
        unknown_liker.posts[0].liked_by.push("ghost".into());
        assert!(unknown_liker.prepare().is_err());

        let mut unknown_tag = archive();
        unknown_tag.posts[0].tags.push("python".into());
        assert!(unknown_tag.prepare().is_err());

        let mut unknown_post = archive();
        unknown_post.comments[0].post = "missing".into();
        assert!(unknown_post.prepare().is_err());
    }

    #[test]
    fn prepare_rejects_escaping_image_paths() {
        let mut archive = archive();
        archive.posts[0].image = Some("../secret.txt".into());
        assert!(archive.prepare().is_err());
    }

    #[test]
    fn derived_slugs_avoid_explicit_ones() {
        let mut archive = archive();
        let mut twin = archive.posts[0].clone();
        twin.slug = Some("privet-mir".into());
        archive.posts.push(twin);

        let prepared = archive.prepare().expect("valid archive");
        let slugs: BTreeSet<_> = prepared
            .posts
            .iter()
            .filter_map(|post| post.slug.clone())
            .collect();
        assert!(slugs.contains("privet-mir"));
        assert!(slugs.contains("privet-mir-2"));
    }

    #[derive(Default)]
    struct MemoryArchive {
        stored: Mutex<ContentArchive>,
    }

    #[async_trait]
    impl ArchiveRepo for MemoryArchive {
        async fn export_archive(&self) -> Result<ContentArchive, RepoError> {
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn replace_with_archive(&self, archive: &ContentArchive) -> Result<(), RepoError> {
            *self.stored.lock().unwrap() = archive.clone();
            Ok(())
        }
    }

    #[tokio::test]
    async fn exported_archive_imports_cleanly() {
        let source = MemoryArchive {
            stored: Mutex::new(archive().prepare().unwrap()),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.toml");

        export_site(&source, &path).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("published_at = \"2020-05-01T10:00:00Z\""));

        let target = MemoryArchive::default();
        import_site(&target, &path).await.unwrap();
        assert_eq!(
            *target.stored.lock().unwrap(),
            *source.stored.lock().unwrap()
        );
    }

    #[tokio::test]
    async fn invalid_archive_leaves_content_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[[posts]]\ntitle = 1\n").unwrap();

        let target = MemoryArchive {
            stored: Mutex::new(archive().prepare().unwrap()),
        };
        assert!(import_site(&target, &path).await.is_err());
        assert_eq!(target.stored.lock().unwrap().posts.len(), 1);
    }
}
