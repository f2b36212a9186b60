use std::future::Future;

use log::trace;

/// A failed byte fetch. Transport-level rejections carry no status.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub status: Option<u16>,
    pub message: String,
}

/// The collaborator that turns a resolved URL into raw container bytes.
/// The cache treats any failure, status or transport, uniformly.
pub trait AssetFetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchFailure>> + Send;
}

/// Production fetcher on reqwest. One client, connection pooling included.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchFailure> {
        let response = self.client.get(url).send().await.map_err(|err| FetchFailure {
            status: err.status().map(|status| status.as_u16()),
            message: err.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure {
                status: Some(status.as_u16()),
                message: format!("server answered {}", status),
            });
        }

        let bytes = response.bytes().await.map_err(|err| FetchFailure {
            status: None,
            message: err.to_string(),
        })?;

        trace!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}
