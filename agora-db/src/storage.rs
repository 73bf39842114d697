//! Where post images end up.

use agora_common::model::post::PostImage;
use async_trait::async_trait;
use std::{collections::HashMap, io, path::PathBuf};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Writing object {name} failed: {source}")]
    Io { name: String, source: io::Error },
    #[error("Object {0} already exists")]
    AlreadyExists(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `image` as `name` and returns the public URL it can be fetched from.
    async fn upload(&self, name: &str, image: &PostImage) -> Result<String, StorageError>;
}

/// Object name for an uploaded image: `{title}-{unix millis}-{file name}`.
///
/// Characters outside `[A-Za-z0-9._-]` become `_`, so the name is always a
/// single safe path segment.
#[must_use]
pub fn object_name(title: &str, uploaded_at: OffsetDateTime, file_name: &str) -> String {
    let millis = uploaded_at.unix_timestamp_nanos() / 1_000_000;
    format!("{}-{millis}-{}", sanitize(title), sanitize(file_name))
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Writes objects into a directory that is served as static files.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base: String,
}

impl LocalObjectStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, name: &str, image: &PostImage) -> Result<String, StorageError> {
        let io_error = |source| StorageError::Io {
            name: name.to_owned(),
            source,
        };

        fs::create_dir_all(&self.root).await.map_err(io_error)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.root.join(name))
            .await
            .map_err(|err| match err.kind() {
                io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(name.to_owned()),
                _ => io_error(err),
            })?;
        file.write_all(image.bytes()).await.map_err(io_error)?;
        file.flush().await.map_err(io_error)?;

        debug!(name, len = image.bytes().len(), "Stored image");
        Ok(format!("{}/{name}", self.public_base))
    }
}

/// Keeps objects in memory, for tests and database-less runs.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(name).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, name: &str, image: &PostImage) -> Result<String, StorageError> {
        let mut objects = self.objects.lock().await;
        if objects.contains_key(name) {
            return Err(StorageError::AlreadyExists(name.to_owned()));
        }

        objects.insert(name.to_owned(), image.bytes().to_vec());
        Ok(format!("memory:{name}"))
    }
}
