//! Filesystem blob store for instructional video and avatars
//!
//! Blobs live under `<root>/media/<prefix>/` and are served back at
//! `{public_base_url}/media/<key>`.

use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::{time, Error, Result};

/// Extensions accepted for exercise video uploads
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

/// Key prefix for exercise video
pub const EXERCISE_PREFIX: &str = "exercises";

const RANDOM_SUFFIX_LEN: usize = 7;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredBlob {
    pub key: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    public_base_url: String,
}

/// Lower-cased extension of a file name, `None` if it has none
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
}

pub fn is_video_name(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..RANDOM_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

fn valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl BlobStore {
    /// `root` is the media directory itself
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/media/{}", self.public_base_url, key)
    }

    /// Store `bytes` under a fresh key derived from `original_name`
    pub async fn put(&self, prefix: &str, original_name: &str, bytes: &[u8]) -> Result<StoredBlob> {
        if !valid_prefix(prefix) {
            return Err(Error::InvalidInput(format!("invalid blob prefix '{}'", prefix)));
        }
        let ext = extension_of(original_name).unwrap_or_else(|| "bin".to_string());
        let file_name = format!("{}_{}.{}", time::unix_millis(), random_suffix(), ext);
        let key = format!("{}/{}", prefix, file_name);

        let dir = self.root.join(prefix);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&file_name), bytes).await?;

        info!("Stored blob {} ({} bytes)", key, bytes.len());
        Ok(StoredBlob {
            url: self.url_for(&key),
            key,
        })
    }
}
