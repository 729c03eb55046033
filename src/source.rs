//! Remote byte sources.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};

use crate::error::{Error, Result};

/// A stream of body chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Something that can stream the body of a URL.
#[async_trait]
pub trait Source: Send + Sync {
    /// Issues the request and returns the response body as a chunk stream.
    ///
    /// Resolves once the response headers are in; non-success statuses are
    /// reported as [`Error::Status`].
    async fn open(&self, url: &str) -> Result<ByteStream>;
}

/// HTTP source backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Creates a source using the given client.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying HTTP client.
    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Source for HttpSource {
    async fn open(&self, url: &str) -> Result<ByteStream> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::status(status, url));
        }
        Ok(response.bytes_stream().map_err(Error::from).boxed())
    }
}
