//! Fetch/dedup cache

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use super::retriever::Retriever;
use super::storage::Storage;
use crate::error::FetchError;
use crate::record::Event;

/// What [`FetchCache::ensure`] had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Content was already stored; nothing was retrieved
    Hit,
    /// Content was retrieved and stored, with the byte count
    Downloaded(u64),
}

/// Makes sure each event's media is stored exactly once
///
/// The existence check and the create are not atomic together. Ingestion
/// runs on one task, so two `ensure` calls for the same key never overlap.
pub struct FetchCache {
    storage: Arc<dyn Storage>,
    retriever: Arc<dyn Retriever>,
}

impl FetchCache {
    pub fn new(storage: Arc<dyn Storage>, retriever: Arc<dyn Retriever>) -> Self {
        Self { storage, retriever }
    }

    /// Storage the cache writes into
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Ensure the media behind `event` is stored under its content key
    ///
    /// On failure a partially written item may remain in storage.
    pub async fn ensure(&self, event: &Event) -> Result<CacheOutcome, FetchError> {
        let key = event.content_key();

        let exists = self
            .storage
            .exists(key)
            .await
            .map_err(|source| FetchError::Storage {
                key: key.to_string(),
                source,
            })?;
        if exists {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(CacheOutcome::Hit);
        }

        let mut sink = self
            .storage
            .create(key)
            .await
            .map_err(|source| FetchError::Storage {
                key: key.to_string(),
                source,
            })?;

        let mut body = self.retriever.retrieve(&event.link).await?;
        let write_err = |source: std::io::Error| FetchError::Write {
            key: key.to_string(),
            source,
        };

        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk).await.map_err(write_err)?;
            written += chunk.len() as u64;
        }
        sink.shutdown().await.map_err(write_err)?;

        tracing::info!(
            key = %key,
            link = %event.link,
            bytes = written,
            "Media stored"
        );

        Ok(CacheOutcome::Downloaded(written))
    }
}
