//! REST client for the training server.
//!
//! Every failure is logged with full detail and surfaced as a
//! [`ClientError::Api`] whose message is safe to show to a user.

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use synapse_training::error::NO_TRAINED_NETWORK_MESSAGE;
use synapse_training::example::GALLERY_SIZE;
use synapse_training::{
    CreateNetworkRequest, CreateNetworkResponse, ExampleKind, ExamplePayload, NetworkConfig, NetworkExample,
    NetworkId, SynapseError, TrainResponse, TrainingConfig, fallback_example, fallback_examples,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{ClientError, GENERIC_API_MESSAGE, Result};

/// Header carrying a per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Training server REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Base URL, e.g. `http://localhost:8000/api`.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /networks`. Retried once on failure.
    pub async fn create_network(&self, config: &NetworkConfig) -> Result<CreateNetworkResponse> {
        config.validate()?;
        let body = CreateNetworkRequest { layer_sizes: config.layer_sizes() };
        let url = format!("{}/networks", self.base_url);
        with_retry(1, || self.request(Method::POST, &url, Some(&body))).await
    }

    /// `POST /networks/{id}/train`. Never retried.
    pub async fn train_network(&self, network_id: &NetworkId, config: &TrainingConfig) -> Result<TrainResponse> {
        config.validate()?;
        let url = format!("{}/networks/{}/train", self.base_url, network_id);
        self.request(Method::POST, &url, Some(config)).await
    }

    /// `GET /networks/{id}/{kind}_example`, at most [`GALLERY_SIZE`] examples. Retried once.
    pub async fn fetch_examples(&self, network_id: &NetworkId, kind: ExampleKind) -> Result<Vec<NetworkExample>> {
        let url = format!("{}/networks/{}/{}", self.base_url, network_id, kind.endpoint());
        let payload: ExamplePayload = with_retry(1, || self.request::<(), _>(Method::GET, &url, None)).await?;
        Ok(payload.into_examples(kind, GALLERY_SIZE))
    }

    /// One example of the given kind, synthesized locally if the fetch fails.
    pub async fn example(&self, network_id: Option<&NetworkId>, kind: ExampleKind) -> Result<NetworkExample> {
        let network_id = require_network(network_id)?;
        match self.fetch_examples(network_id, kind).await {
            Ok(examples) => Ok(examples.into_iter().next().unwrap_or_else(|| fallback_example(kind))),
            Err(e) => {
                warn!(network_id = %network_id, kind = kind.endpoint(), error = %e, "Using fallback example");
                Ok(fallback_example(kind))
            }
        }
    }

    /// A successful or unsuccessful example with equal probability.
    pub async fn random_example(&self, network_id: Option<&NetworkId>) -> Result<NetworkExample> {
        self.example(network_id, ExampleKind::random()).await
    }

    /// Gallery of examples of one kind, synthesized locally if the fetch fails.
    pub async fn gallery(&self, network_id: Option<&NetworkId>, kind: ExampleKind) -> Result<Vec<NetworkExample>> {
        let network_id = require_network(network_id)?;
        match self.fetch_examples(network_id, kind).await {
            Ok(examples) if !examples.is_empty() => Ok(examples),
            Ok(_) => Ok(fallback_examples(kind, GALLERY_SIZE)),
            Err(e) => {
                warn!(network_id = %network_id, kind = kind.endpoint(), error = %e, "Using fallback gallery");
                Ok(fallback_examples(kind, GALLERY_SIZE))
            }
        }
    }

    async fn request<B, T>(&self, method: Method, url: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request_id = Uuid::new_v4();
        debug!(%method, url, %request_id, "API request");

        let mut request = self.client.request(method.clone(), url).header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!(%method, url, %request_id, error = %e, "API request failed");
            ClientError::Api { status: 0, message: GENERIC_API_MESSAGE.to_string() }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!(%method, url, %request_id, status = status.as_u16(), error = %e, "Failed to read API response");
            ClientError::Api { status: status.as_u16(), message: GENERIC_API_MESSAGE.to_string() }
        })?;

        if !status.is_success() {
            return Err(api_error(status, &text, url));
        }

        serde_json::from_str(&text).map_err(|e| {
            error!(url, %request_id, error = %e, body = %text, "Unexpected API response shape");
            ClientError::Api { status: status.as_u16(), message: GENERIC_API_MESSAGE.to_string() }
        })
    }
}

/// Run `call`, retrying up to `retries` more times on failure.
async fn with_retry<T, F, Fut>(retries: u32, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries => {
                attempt += 1;
                debug!(attempt, error = %e, "Retrying request");
            }
            Err(e) => return Err(e),
        }
    }
}

fn require_network(network_id: Option<&NetworkId>) -> Result<&NetworkId> {
    network_id
        .filter(|id| !id.is_blank())
        .ok_or_else(|| SynapseError::Validation(NO_TRAINED_NETWORK_MESSAGE.to_string()).into())
}

/// Log a failed response and reduce it to a user-facing error.
fn api_error(status: StatusCode, body: &str, url: &str) -> ClientError {
    error!(status = status.as_u16(), url, body, "API error");
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!(url, "Server error: the network may not be trained yet");
    }

    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(serde_json::Value::as_str).map(str::to_string))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_API_MESSAGE.to_string());

    ClientError::Api { status: status.as_u16(), message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_uses_body_message() {
        let err = api_error(StatusCode::BAD_REQUEST, r#"{"message":"Invalid layer sizes"}"#, "/networks");
        assert_eq!(err.user_message(), "Invalid layer sizes");
    }

    #[test]
    fn test_api_error_generic_without_message() {
        let err = api_error(StatusCode::INTERNAL_SERVER_ERROR, "Traceback (most recent call last): ...", "/x");
        assert_eq!(err.user_message(), GENERIC_API_MESSAGE);
        assert!(matches!(err, ClientError::Api { status: 500, .. }));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:8000/api/");
        assert_eq!(client.base_url(), "http://localhost:8000/api");
    }

    #[test]
    fn test_require_network() {
        assert!(require_network(None).is_err());
        let blank = NetworkId::from("  ");
        assert!(require_network(Some(&blank)).is_err());
        let id = NetworkId::from("N1");
        assert_eq!(require_network(Some(&id)).unwrap(), &id);
    }
}
