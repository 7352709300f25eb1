use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

/// On-disk store for uploaded item images.
///
/// Objects live at `{dir}/{ranking_id}/{unix_millis}-{sanitized_filename}`
/// and are written with no-overwrite semantics: a colliding path is an error,
/// even though the millisecond timestamp makes collisions practically
/// unreachable. Files are served back under `{public_base}/media/`.
pub struct MediaStore {
    dir: PathBuf,
    public_base: String,
}

impl MediaStore {
    pub async fn new(dir: PathBuf, public_base: &str) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_base: public_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn media_dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Replace every character outside `[A-Za-z0-9._-]` with `_`. Keeps
    /// object keys valid and rules out path traversal in client filenames.
    pub fn sanitize_file_name(name: &str) -> String {
        name.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Relative object path for an upload at a given time.
    pub fn object_path(ranking_id: Uuid, unix_millis: i64, file_name: &str) -> String {
        format!(
            "{}/{}-{}",
            ranking_id,
            unix_millis,
            Self::sanitize_file_name(file_name)
        )
    }

    /// Store an uploaded file and return its public URL. The write fails if
    /// the destination already exists.
    pub async fn store(&self, ranking_id: Uuid, file_name: &str, data: &[u8]) -> Result<String> {
        let rel = Self::object_path(ranking_id, chrono::Utc::now().timestamp_millis(), file_name);
        self.store_at(&rel, data).await?;
        Ok(self.public_url(&rel))
    }

    async fn store_at(&self, rel: &str, data: &[u8]) -> Result<()> {
        let path = self.dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("create {}", path.display()))?;
        file.write_all(data).await?;
        file.flush().await?;

        info!("Stored media object {} ({} bytes)", rel, data.len());
        Ok(())
    }

    pub fn public_url(&self, rel: &str) -> String {
        format!("{}/media/{}", self.public_base, rel)
    }
}
