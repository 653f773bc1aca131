//! Media retrieval
//!
//! A [`Retriever`] turns a link into a stream of body chunks. Writing the
//! chunks somewhere is the cache's job.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use url::Url;

use super::config::FetchConfig;
use crate::error::FetchError;

/// Body of a retrieved link
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// Fetches the bytes behind a link
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, link: &Url) -> Result<ByteStream, FetchError>;
}

/// HTTP(S) retrieval with reqwest
#[derive(Debug, Clone)]
pub struct HttpRetriever {
    client: reqwest::Client,
}

impl HttpRetriever {
    /// Build a retriever from the given configuration
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(&self, link: &Url) -> Result<ByteStream, FetchError> {
        let response = self
            .client
            .get(link.clone())
            .send()
            .await
            .map_err(|e| FetchError::Retrieve {
                link: link.to_string(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                link: link.to_string(),
                status: status.as_u16(),
            });
        }

        let link = link.to_string();
        Ok(response
            .bytes_stream()
            .map_err(move |e| FetchError::Retrieve {
                link: link.clone(),
                source: Box::new(e),
            })
            .boxed())
    }
}
