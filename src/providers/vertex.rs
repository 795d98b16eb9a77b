//! Imagen on Vertex AI, authenticated with short-lived OAuth bearer tokens
//! minted from a service-account key.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::predict::{PredictRequest, read_prediction};
use super::{ImageProvider, ProviderError, ProviderRequest};
use crate::credentials::{CredentialError, ParsePass, TokenSource, parse_credentials};

#[derive(Debug)]
enum Credentials {
    Missing,
    Malformed(CredentialError),
    Ready(TokenSource),
}

/// Vertex AI Imagen provider.
#[derive(Debug)]
pub struct VertexProvider {
    client: reqwest::Client,
    credentials: Credentials,
    project_id: Option<String>,
    location: String,
    model: String,
    base_url: Option<String>,
    name: String,
}

impl VertexProvider {
    /// Creates the provider, parsing the credential blob up front. Missing or
    /// malformed credentials are remembered and reported on every call
    /// without touching the network.
    pub fn new(
        client: reqwest::Client,
        credentials_json: Option<&str>,
        project_id: Option<String>,
        location: &str,
        model: &str,
    ) -> Self {
        let credentials = match credentials_json.map(str::trim).filter(|raw| !raw.is_empty()) {
            None => Credentials::Missing,
            Some(raw) => match parse_credentials(raw) {
                Ok(parsed) => {
                    if parsed.pass == ParsePass::Sanitized {
                        warn!("Service account JSON needed repair before it would parse");
                    }
                    Credentials::Ready(TokenSource::new(parsed.credentials, client.clone()))
                }
                Err(err) => {
                    warn!("Ignoring service account credentials: {}", err);
                    Credentials::Malformed(err)
                }
            },
        };
        Self {
            client,
            credentials,
            project_id: project_id.filter(|id| !id.trim().is_empty()),
            location: location.to_string(),
            model: model.to_string(),
            base_url: None,
            name: format!("vertex:{model}"),
        }
    }

    /// Sends predictions to `base_url` instead of the regional endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    fn endpoint(&self, project: &str) -> String {
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", self.location));
        format!(
            "{base}/v1/projects/{project}/locations/{}/publishers/google/models/{}:predict",
            self.location, self.model
        )
    }
}

#[async_trait]
impl ImageProvider for VertexProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<Vec<u8>, ProviderError> {
        let tokens = match &self.credentials {
            Credentials::Missing => {
                return Err(ProviderError::AuthMissing(
                    "GOOGLE_CREDENTIALS_JSON is not set".to_string(),
                ));
            }
            Credentials::Malformed(err) => return Err(err.clone().into()),
            Credentials::Ready(tokens) => tokens,
        };
        let project = self
            .project_id
            .as_deref()
            .or(tokens.credentials().project_id.as_deref())
            .ok_or_else(|| {
                ProviderError::AuthMissing(
                    "no GOOGLE_PROJECT_ID and no project_id in credentials".to_string(),
                )
            })?
            .to_string();

        let token = tokens.token().await?;
        debug!("Asking {} to paint {:?}", self.name, request.prompt);
        let response = self
            .client
            .post(self.endpoint(&project))
            .bearer_auth(token)
            .json(&PredictRequest::new(request))
            .send()
            .await?;
        read_prediction(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProviderRequest {
        ProviderRequest::for_destination("Kyoto", 1200, 630)
    }

    #[tokio::test]
    async fn no_credentials_is_auth_missing() {
        let provider = VertexProvider::new(
            reqwest::Client::new(),
            None,
            Some("trips".to_string()),
            "us-central1",
            "imagen-3.0-generate-001",
        );
        let err = provider.generate(&request()).await.expect_err("missing");
        assert!(matches!(err, ProviderError::AuthMissing(_)));
    }

    #[tokio::test]
    async fn unparsable_credentials_short_circuit() {
        let provider = VertexProvider::new(
            reqwest::Client::new(),
            Some("{not json"),
            Some("trips".to_string()),
            "us-central1",
            "imagen-3.0-generate-001",
        )
        .with_base_url("http://127.0.0.1:9");
        let err = provider.generate(&request()).await.expect_err("malformed");
        assert!(matches!(err, ProviderError::CredentialMalformed(_)));
    }

    #[test]
    fn regional_endpoint() {
        let provider = VertexProvider::new(
            reqwest::Client::new(),
            None,
            None,
            "europe-west4",
            "imagen-3.0-generate-001",
        );
        assert_eq!(
            provider.endpoint("trips"),
            "https://europe-west4-aiplatform.googleapis.com/v1/projects/trips/locations/europe-west4/publishers/google/models/imagen-3.0-generate-001:predict"
        );
        assert_eq!(provider.name(), "vertex:imagen-3.0-generate-001");
    }
}
