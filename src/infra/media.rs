//! Read-only access to post images stored below the media directory.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid media path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn is_missing(&self) -> bool {
        match self {
            MediaError::InvalidPath => true,
            MediaError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn read(&self, relative: &str) -> Result<Bytes, MediaError> {
        let absolute = self.resolve(relative)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, MediaError> {
        let relative = Path::new(relative);
        if relative.as_os_str().is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(MediaError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}
