//! Content-addressed cover image storage

use crate::errors::IngestionError;
use crate::model::CoverImage;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes cover images under a directory, named by the SHA-256 of their bytes
#[derive(Debug, Clone)]
pub struct CoverWriter {
    dir: PathBuf,
}

impl CoverWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<sha256-hex>.<ext>`, extension lowercased
    pub fn file_name(cover: &CoverImage) -> String {
        let digest = Sha256::digest(&cover.data);
        format!(
            "{}.{}",
            hex::encode(digest),
            cover.extension().to_ascii_lowercase()
        )
    }

    /// Save `cover` and return its path; identical images share one file
    pub async fn save(&self, cover: &CoverImage) -> Result<PathBuf, IngestionError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(Self::file_name(cover));
        if tokio::fs::try_exists(&path).await? {
            debug!(path = %path.display(), "Cover already stored");
            return Ok(path);
        }

        tokio::fs::write(&path, &cover.data).await?;
        debug!(path = %path.display(), bytes = cover.data.len(), "Cover written");
        Ok(path)
    }
}
