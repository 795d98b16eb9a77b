//! Imagen through the Generative Language API, authenticated by API key.

use async_trait::async_trait;
use tracing::debug;

use super::predict::{PredictRequest, read_prediction};
use super::{ImageProvider, ProviderError, ProviderRequest};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Imagen provider using a static API key.
#[derive(Debug)]
pub struct ImagenProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    name: String,
}

impl ImagenProvider {
    /// Creates a provider for `model`. A missing key isn't an error here;
    /// every call fails with [`ProviderError::AuthMissing`] instead.
    pub fn new(client: reqwest::Client, api_key: Option<String>, model: &str) -> Self {
        Self {
            client,
            api_key,
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            name: format!("imagen:{model}"),
        }
    }

    /// Points the provider somewhere other than Google, eg a test server.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:predict", self.base_url, self.model)
    }
}

#[async_trait]
impl ImageProvider for ImagenProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<Vec<u8>, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::AuthMissing("GOOGLE_API_KEY is not set".to_string()))?;

        debug!("Asking {} to paint {:?}", self.name, request.prompt);
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&PredictRequest::new(request))
            .send()
            .await?;
        read_prediction(response).await
    }
}
