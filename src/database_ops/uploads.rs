use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid image data")]
    InvalidImage,
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),
    #[error("file already exists: {0}")]
    AlreadyExists(String),
    #[error("file does not exist: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw byte storage for cover images, keyed by filename.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn save(&self, bytes: &[u8], filename: &str) -> Result<(), BlobError>;
    async fn delete(&self, filename: &str) -> Result<(), BlobError>;
    async fn replace(&self, bytes: &[u8], filename: &str) -> Result<(), BlobError>;
}

/// Filesystem blob store rooted at one directory.
#[derive(Debug, Clone)]
pub struct Uploads {
    root: PathBuf,
}

impl Uploads {
    /// Opens (creating if needed) the uploads directory.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, BlobError> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(BlobError::InvalidFileName(String::new()));
        }
        tokio::fs::create_dir_all(root).await?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf, BlobError> {
        let bad = filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename == "."
            || filename == "..";
        if bad {
            return Err(BlobError::InvalidFileName(filename.to_string()));
        }
        Ok(self.root.join(filename))
    }
}

#[async_trait]
impl BlobStore for Uploads {
    async fn save(&self, bytes: &[u8], filename: &str) -> Result<(), BlobError> {
        if bytes.is_empty() {
            return Err(BlobError::InvalidImage);
        }
        let path = self.path_for(filename)?;
        // create_new makes the existence check and the create a single step.
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(BlobError::AlreadyExists(filename.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await
        {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }
        debug!(filename, size = bytes.len(), "saved upload");
        Ok(())
    }

    async fn delete(&self, filename: &str) -> Result<(), BlobError> {
        let path = self.path_for(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(BlobError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn replace(&self, bytes: &[u8], filename: &str) -> Result<(), BlobError> {
        if bytes.is_empty() {
            return Err(BlobError::InvalidImage);
        }
        let path = self.path_for(filename)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(BlobError::NotFound(filename.to_string()));
        }
        let tmp = self.root.join(format!("{filename}.tmp"));
        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}
