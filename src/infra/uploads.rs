//! Filesystem storage for images attached to posts.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

/// Directory under the media root that holds post images.
pub const POST_IMAGE_DIR: &str = "posts";

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("no stored file at this path")]
    NotFound,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Path relative to the media root, as persisted on the post.
    pub stored_path: String,
    pub checksum: String,
    pub size_bytes: usize,
}

#[derive(Debug)]
pub struct ImageStorage {
    root: PathBuf,
}

impl ImageStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub async fn store(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredImage, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        let stored_path = build_stored_path(original_name);
        let absolute = self.resolve(&stored_path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        if let Err(err) = file.write_all(&data).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(err.into());
        }
        file.flush().await?;

        let checksum = hex::encode(Sha256::digest(&data));

        Ok(StoredImage {
            stored_path,
            checksum,
            size_bytes: data.len(),
        })
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::metadata(&absolute).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(UploadStorageError::NotFound),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadStorageError::NotFound);
            }
            Err(err) => return Err(err.into()),
        }
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

fn build_stored_path(original_name: &str) -> String {
    let identifier = Uuid::new_v4();
    let filename = sanitize_filename(original_name);
    format!("{POST_IMAGE_DIR}/{identifier}-{filename}")
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "image".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value.chars().all(|ch| ch.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}
