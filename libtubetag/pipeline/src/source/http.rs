use std::time::Duration;

use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::RetryTransientMiddleware;
use reqwest_retry::policies::ExponentialBackoff;
use tracing::{info, warn};

use super::SourceError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Plain GET client for cover images. Transient failures are retried with backoff here, which
/// is the only retry in the whole pipeline: a missing cover never fails a request, so retrying it
/// can't hide a real failure.
#[derive(Clone, Debug)]
pub(crate) struct ThumbnailClient {
    client: ClientWithMiddleware,
}

impl ThumbnailClient {
    pub(crate) fn new(max_retries: u32) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let client = reqwest_middleware::ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Ok(Self { client })
    }

    pub(crate) async fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        info!("fetching thumbnail {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Thumbnail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("thumbnail {url} returned {status}");
            return Err(SourceError::ThumbnailStatus(status.as_u16()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::Thumbnail(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
