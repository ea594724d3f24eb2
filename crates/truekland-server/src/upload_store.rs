//! Filesystem storage for uploaded post and chat images.
//!
//! Files are named by a fresh UUID with the sniffed extension, so the
//! public URL (`/uploads/<uuid>.<ext>`) never carries user input.

use std::path::{Component, Path, PathBuf};

use image::ImageFormat;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use truekland_shared::constants::UPLOADS_PATH_PREFIX;

use crate::error::ServerError;

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(base)
        .or_else(|_| target.strip_prefix(&canonical_base))
        .unwrap_or(target)
        .components()
    {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(ServerError::BadRequest("Path traversal detected".to_string()));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest("Path traversal detected".to_string()));
    }
    Ok(resolved)
}

/// An image accepted by [`UploadStore::store_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub file_name: String,
    pub url: String,
    pub content_type: &'static str,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    base_path: PathBuf,
    max_size: usize,
}

impl UploadStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::UploadStorage(format!(
                "Failed to create upload directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Upload store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Sniff, size-check and persist an image.
    pub async fn store_image(&self, data: &[u8]) -> Result<StoredImage, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::PayloadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let (extension, content_type) = sniff_image(data)?;
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let path = self.safe_path(&file_name)?;

        fs::write(&path, data).await.map_err(|e| {
            ServerError::UploadStorage(format!("Failed to write {}: {}", file_name, e))
        })?;

        debug!(file = %file_name, size = data.len(), "Stored upload");
        Ok(StoredImage {
            url: format!("{UPLOADS_PATH_PREFIX}{file_name}"),
            file_name,
            content_type,
            size: data.len(),
        })
    }

    /// Read an image back. Returns the bytes, content type and a strong
    /// ETag derived from the content.
    pub async fn get_image(
        &self,
        file_name: &str,
    ) -> Result<(Vec<u8>, &'static str, String), ServerError> {
        let content_type = parse_file_name(file_name)
            .ok_or_else(|| ServerError::NotFound(format!("upload {file_name}")))?;
        let path = self.safe_path(file_name)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServerError::NotFound(format!("upload {file_name}")));
            }
            Err(e) => {
                return Err(ServerError::UploadStorage(format!(
                    "Failed to read {}: {}",
                    file_name, e
                )));
            }
        };

        let etag = format!("\"{}\"", blake3::hash(&data).to_hex());
        Ok((data, content_type, etag))
    }

    pub async fn count_images(&self) -> Result<usize, ServerError> {
        let mut count = 0;
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| ServerError::UploadStorage(format!("Failed to list uploads: {}", e)))?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            ServerError::UploadStorage(format!("Failed to read directory entry: {}", e))
        })? {
            if let Some(name) = entry.file_name().to_str() {
                if parse_file_name(name).is_some() {
                    count += 1;
                }
            }
        }

        Ok(count)
    }

    fn safe_path(&self, file_name: &str) -> Result<PathBuf, ServerError> {
        if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
            return Err(ServerError::BadRequest("Path traversal detected".to_string()));
        }
        ensure_within(&self.base_path, &self.base_path.join(file_name))
    }
}

fn sniff_image(data: &[u8]) -> Result<(&'static str, &'static str), ServerError> {
    match image::guess_format(data) {
        Ok(ImageFormat::Png) => Ok(("png", "image/png")),
        Ok(ImageFormat::Jpeg) => Ok(("jpg", "image/jpeg")),
        Ok(ImageFormat::WebP) => Ok(("webp", "image/webp")),
        Ok(ImageFormat::Gif) => Ok(("gif", "image/gif")),
        Ok(other) => Err(ServerError::UnsupportedMedia(format!("{other:?}"))),
        Err(_) => Err(ServerError::UnsupportedMedia("not an image".to_string())),
    }
}

/// Accept only names this store generates: `<uuid>.<known ext>`.
fn parse_file_name(name: &str) -> Option<&'static str> {
    let (stem, ext) = name.split_once('.')?;
    Uuid::parse_str(stem).ok()?;
    match ext {
        "png" => Some("image/png"),
        "jpg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
