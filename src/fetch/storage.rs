//! Storage capability
//!
//! Where fetched media lives. The cache only needs to ask whether a key exists
//! and to open a sink for it; the media endpoint additionally reads keys back.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Writable destination for one stored item
pub type Sink = Box<dyn AsyncWrite + Send + Unpin>;

/// Readable stored item
pub type Source = Box<dyn AsyncRead + Send + Unpin>;

/// Keyed media storage
#[async_trait]
pub trait Storage: Send + Sync {
    /// Whether `key` has already been created
    async fn exists(&self, key: &str) -> io::Result<bool>;

    /// Create (or truncate) `key` and return a sink for its bytes
    async fn create(&self, key: &str) -> io::Result<Sink>;

    /// Open `key` for reading, `None` if it does not exist
    async fn open(&self, key: &str) -> io::Result<Option<Source>>;
}

/// Reject keys that are not a single plain path segment
pub fn validate_key(key: &str) -> io::Result<()> {
    if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\', '\0']) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid storage key {:?}", key),
        ));
    }
    Ok(())
}

/// Storage backed by a directory, one file per key
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    /// Use `root` as the storage directory, creating it if needed
    pub async fn open_dir(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Storage directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl Storage for DirStorage {
    async fn exists(&self, key: &str) -> io::Result<bool> {
        tokio::fs::try_exists(self.path_for(key)?).await
    }

    async fn create(&self, key: &str) -> io::Result<Sink> {
        let file = tokio::fs::File::create(self.path_for(key)?).await?;
        Ok(Box::new(file))
    }

    async fn open(&self, key: &str) -> io::Result<Option<Source>> {
        match tokio::fs::File::open(self.path_for(key)?).await {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// In-memory storage for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bytes stored under `key`
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn exists(&self, key: &str) -> io::Result<bool> {
        validate_key(key)?;
        Ok(self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }

    async fn create(&self, key: &str) -> io::Result<Sink> {
        validate_key(key)?;
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Vec::new());
        Ok(Box::new(MemorySink {
            key: key.to_string(),
            items: Arc::clone(&self.items),
        }))
    }

    async fn open(&self, key: &str) -> io::Result<Option<Source>> {
        validate_key(key)?;
        Ok(self.get(key).map(|bytes| Box::new(io::Cursor::new(bytes)) as Source))
    }
}

/// Appends straight into the shared map
struct MemorySink {
    key: String,
    items: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl AsyncWrite for MemorySink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.entry(self.key.clone()).or_default().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
