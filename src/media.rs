//! Product image files on local disk.
//!
//! Files are written under the configured upload directory with a random
//! alphanumeric stem and served back read-only by the HTTP layer.

use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of the random part of a stored file name.
pub const NAME_LEN: usize = 10;

const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];
const DEFAULT_EXTENSION: &str = "jpg";

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("image is empty")]
    Empty,

    #[error("invalid image name '{0}'")]
    InvalidName(String),

    #[error("image storage error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if it does not exist.
    pub async fn ensure_dir(&self) -> Result<(), MediaError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Store `bytes` under a fresh random name and return that name.
    ///
    /// The extension follows `upload_name` when it is a known image type.
    pub async fn save(&self, upload_name: Option<&str>, bytes: &[u8]) -> Result<String, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }

        let name = random_file_name(extension_for(upload_name));
        let path = self.dir.join(&name);
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(file = %name, size = bytes.len(), "Stored image");
        Ok(name)
    }

    /// Remove a stored image. Missing files are not an error.
    pub async fn remove(&self, name: &str) -> Result<(), MediaError> {
        let path = self.path_of(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a stored name to its path, refusing anything that could
    /// escape the upload directory.
    pub fn path_of(&self, name: &str) -> Result<PathBuf, MediaError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');
        if !valid {
            return Err(MediaError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

fn extension_for(upload_name: Option<&str>) -> &'static str {
    upload_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .and_then(|ext| ALLOWED_EXTENSIONS.iter().find(|allowed| **allowed == ext).copied())
        .unwrap_or(DEFAULT_EXTENSION)
}

/// `NAME_LEN` random alphanumerics plus `.extension`.
pub fn random_file_name(extension: &str) -> String {
    let stem: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NAME_LEN)
        .map(char::from)
        .collect();
    format!("{}.{}", stem, extension)
}
