// Google API error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Turn a non-success response into `Http`, keeping the body text
    pub(crate) async fn from_response(endpoint: &str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ApiError::Http {
            endpoint: endpoint.to_string(),
            status,
            body,
        }
    }
}

/// Pass successful responses through, convert the rest into `ApiError::Http`
pub(crate) async fn check_status(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(ApiError::from_response(endpoint, response).await)
    }
}
