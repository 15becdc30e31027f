use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// How long a control plane round-trip may take before it is treated as failed
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// The webhook did not carry the expected credential
    #[error("Webhook could not be verified")]
    InvalidWebhook,
    #[error("Failed to parse webhook payload: {0}")]
    InvalidPayload(String),
    #[error("Failed to reach stream control plane: {0}")]
    Unreachable(String),
    #[error("Control plane rejected the request: {0}")]
    Rejected(String),
    #[error("Failed to parse control plane response: {0}")]
    ParseError(String),
}

/// A status event pushed by the control plane
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(rename = "ingressInfo")]
    pub ingress_info: Option<IngressInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngressInfo {
    #[serde(rename = "ingressId")]
    pub ingress_id: String,
}

/// An ingress provisioned for a host to stream into
#[derive(Debug, Clone, Deserialize)]
pub struct IngressData {
    pub ingress_id: String,
    /// Where the host points their broadcasting software
    pub server_url: String,
    pub stream_key: String,
}

/// What a room token is allowed to do
#[derive(Debug, Clone, Serialize)]
pub struct RoomGrant {
    pub room: String,
    pub identity: String,
    pub can_publish: bool,
}

/// Represents the hosted livestream infrastructure. Ingress negotiation,
/// token signing and webhook signatures are all its concern, not mixtape's.
#[async_trait]
pub trait StreamControlPlane: Send + Sync + 'static {
    async fn create_ingress(&self, host_identity: &str) -> Result<IngressData, ControlPlaneError>;
    /// Exchanges a grant for an opaque signed room token
    async fn issue_room_token(&self, grant: RoomGrant) -> Result<String, ControlPlaneError>;
    /// Checks the webhook credential and decodes the payload
    fn verify_webhook(&self, body: &str, authorization: &str)
        -> Result<WebhookEvent, ControlPlaneError>;
}

/// A control plane implementation backed by a hosted livestream API
pub struct HttpControlPlane {
    client: Client,
    base_url: String,
    api_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

impl HttpControlPlane {
    pub fn new(base_url: String, api_key: String, webhook_secret: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("http client is built");

        Self {
            client,
            base_url,
            api_key,
            webhook_secret,
        }
    }
}

#[async_trait]
impl StreamControlPlane for HttpControlPlane {
    async fn create_ingress(&self, host_identity: &str) -> Result<IngressData, ControlPlaneError> {
        let url = format!("{}/ingress", self.base_url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "identity": host_identity }))
            .send()
            .await
            .map_err(|e| ControlPlaneError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status).await);
        }

        response
            .json()
            .await
            .map_err(|e| ControlPlaneError::ParseError(e.to_string()))
    }

    async fn issue_room_token(&self, grant: RoomGrant) -> Result<String, ControlPlaneError> {
        let url = format!("{}/token", self.base_url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&grant)
            .send()
            .await
            .map_err(|e| ControlPlaneError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status).await);
        }

        let result: TokenResponse = response
            .json()
            .await
            .map_err(|e| ControlPlaneError::ParseError(e.to_string()))?;

        Ok(result.token)
    }

    fn verify_webhook(
        &self,
        body: &str,
        authorization: &str,
    ) -> Result<WebhookEvent, ControlPlaneError> {
        if authorization != self.webhook_secret {
            return Err(ControlPlaneError::InvalidWebhook);
        }

        serde_json::from_str(body).map_err(|e| ControlPlaneError::InvalidPayload(e.to_string()))
    }
}

async fn handle_unsuccessful_request(
    response: Response,
    status: StatusCode,
) -> ControlPlaneError {
    let result = response.text().await;

    match result {
        Ok(text) => ControlPlaneError::Rejected(format!("{}: {}", status, text)),
        Err(e) => ControlPlaneError::Rejected(format!("{}: {}", status, e)),
    }
}
