//! Stock photo search, keyed by the destination text.

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::predict::error_message;
use super::{ImageProvider, ProviderError, ProviderRequest};

/// Fetches a stock photo for the destination from a
/// `{base}/{width}x{height}/?{query},travel` style endpoint.
#[derive(Debug)]
pub struct StockPhotoProvider {
    client: reqwest::Client,
    base_url: String,
}

impl StockPhotoProvider {
    /// Creates a provider rooted at `base_url`.
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, request: &ProviderRequest) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!(
            "{}/{}x{}/",
            self.base_url, request.width, request.height
        ))
        .map_err(|err| ProviderError::Network(format!("bad stock photo URL: {err}")))?;
        let query: String =
            url::form_urlencoded::byte_serialize(request.destination.as_bytes()).collect();
        url.set_query(Some(&format!("{query},travel")));
        Ok(url)
    }
}

#[async_trait]
impl ImageProvider for StockPhotoProvider {
    fn name(&self) -> &str {
        "stock-photo"
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<Vec<u8>, ProviderError> {
        let url = self.search_url(request)?;
        debug!("Fetching stock photo from {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(ProviderError::RequestRejected {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        if image::guess_format(&body).is_err() {
            return Err(ProviderError::MalformedResponse(format!(
                "{} bytes that aren't a known image format",
                body.len()
            )));
        }
        Ok(body.to_vec())
    }
}
