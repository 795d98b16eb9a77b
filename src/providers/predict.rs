//! Wire format shared by the Imagen `:predict` endpoints.

use base64::Engine;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ProviderError, ProviderRequest};

/// Longest upstream error message kept in a failure.
const MAX_ERROR_MESSAGE: usize = 500;

/// Request body for POST `...:predict`
#[derive(Serialize, Debug)]
pub(super) struct PredictRequest<'a> {
    instances: [PredictInstance<'a>; 1],
    parameters: PredictParameters<'a>,
}

#[derive(Serialize, Debug)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PredictParameters<'a> {
    sample_count: u8,
    aspect_ratio: &'a str,
}

impl<'a> PredictRequest<'a> {
    pub(super) fn new(request: &'a ProviderRequest) -> Self {
        Self {
            instances: [PredictInstance {
                prompt: &request.prompt,
            }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: request.aspect_ratio,
            },
        }
    }
}

#[derive(Deserialize, Debug)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

/// Turns a `:predict` response into image bytes.
pub(super) async fn read_prediction(response: reqwest::Response) -> Result<Vec<u8>, ProviderError> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(ProviderError::RequestRejected {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    decode_prediction(&body)
}

pub(super) fn decode_prediction(body: &[u8]) -> Result<Vec<u8>, ProviderError> {
    let parsed: PredictResponse = serde_json::from_slice(body)
        .map_err(|err| ProviderError::MalformedResponse(format!("invalid JSON: {err}")))?;
    let encoded = parsed
        .predictions
        .into_iter()
        .next()
        .and_then(|prediction| prediction.bytes_base64_encoded)
        .ok_or_else(|| {
            ProviderError::MalformedResponse("no bytesBase64Encoded in predictions".to_string())
        })?;
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|err| ProviderError::MalformedResponse(format!("bad base64: {err}")))?;
    if bytes.is_empty() {
        return Err(ProviderError::MalformedResponse("empty image".to_string()));
    }
    image::guess_format(&bytes).map_err(|err| {
        ProviderError::MalformedResponse(format!("prediction is not an image: {err}"))
    })?;
    Ok(bytes)
}

/// Pulls `error.message` out of a Google-style JSON error, falling back to
/// the raw body text.
pub(super) fn error_message(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.trim().to_string());
    if message.chars().count() > MAX_ERROR_MESSAGE {
        let mut short: String = message.chars().take(MAX_ERROR_MESSAGE).collect();
        short.push_str("...");
        short
    } else {
        message
    }
}
