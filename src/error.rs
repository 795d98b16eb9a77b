//! Error handling

use axum::response::IntoResponse;
use tracing::info;

/// Errors surfaced by the web handlers and the card renderer.
#[derive(Debug)]
pub enum CardError {
    /// When you didn't do the right thing
    BadRequest(String),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl std::fmt::Display for CardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(message) => write!(f, "Bad request: {message}"),
            Self::InternalServerError(message) => write!(f, "Internal error: {message}"),
        }
    }
}

impl std::error::Error for CardError {}

impl From<std::io::Error> for CardError {
    fn from(err: std::io::Error) -> Self {
        CardError::InternalServerError(err.to_string())
    }
}

impl From<axum::http::Error> for CardError {
    fn from(err: axum::http::Error) -> Self {
        CardError::InternalServerError(err.to_string())
    }
}

impl From<url::ParseError> for CardError {
    fn from(err: url::ParseError) -> Self {
        CardError::InternalServerError(err.to_string())
    }
}

impl From<image::ImageError> for CardError {
    fn from(err: image::ImageError) -> Self {
        CardError::InternalServerError(format!("image error: {err}"))
    }
}

impl From<tokio::task::JoinError> for CardError {
    fn from(err: tokio::task::JoinError) -> Self {
        CardError::InternalServerError(format!("render task failed: {err}"))
    }
}

impl IntoResponse for CardError {
    fn into_response(self) -> axum::response::Response {
        match self {
            CardError::BadRequest(message) => {
                info!("Bad request received: {}", message);
                let mut response =
                    axum::response::Response::new(axum::body::Body::from("Bad Request"));
                *response.status_mut() = axum::http::StatusCode::BAD_REQUEST;
                response
            }
            CardError::InternalServerError(message) => {
                tracing::error!("Internal server error: {}", message);
                let mut response =
                    axum::response::Response::new(axum::body::Body::from("Internal server error"));
                *response.status_mut() = axum::http::StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_their_message() {
        let response = CardError::InternalServerError("png encoder exploded".to_string())
            .into_response();
        assert_eq!(
            response.status(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn bad_request_maps_to_400() {
        let response = CardError::BadRequest("Missing Host header".to_string()).into_response();
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
