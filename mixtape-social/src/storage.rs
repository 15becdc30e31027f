use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// How long a storage round-trip may take before it is treated as failed
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum MediaStorageError {
    #[error("Failed to reach media storage: {0}")]
    Unreachable(String),
    #[error("Media storage rejected the request: {0}")]
    Rejected(String),
    #[error("Failed to parse media storage response: {0}")]
    ParseError(String),
}

/// An uploaded file on its way to object storage
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// The stored result of an upload
#[derive(Debug, Clone)]
pub struct StoredMedia {
    /// Where the blob can be fetched from
    pub url: String,
    /// Length in seconds, reported by the storage service for audio uploads
    pub duration: Option<f32>,
}

/// Represents a type that can store and delete media blobs.
/// The contents of a blob are never inspected by mixtape.
#[async_trait]
pub trait MediaStorage: Send + Sync + 'static {
    async fn store(&self, upload: MediaUpload) -> Result<StoredMedia, MediaStorageError>;
    async fn delete(&self, url: &str) -> Result<(), MediaStorageError>;
}

/// A media storage implementation backed by a hosted media API
pub struct HttpMediaStorage {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
    duration: Option<f32>,
}

impl HttpMediaStorage {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("http client is built");

        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl MediaStorage for HttpMediaStorage {
    async fn store(&self, upload: MediaUpload) -> Result<StoredMedia, MediaStorageError> {
        let url = format!("{}/media/{}", self.base_url, upload.file_name);

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.api_key)
            .header(header::CONTENT_TYPE, upload.content_type)
            .body(upload.bytes)
            .send()
            .await
            .map_err(|e| MediaStorageError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status).await);
        }

        let stored: UploadResponse = response
            .json()
            .await
            .map_err(|e| MediaStorageError::ParseError(e.to_string()))?;

        Ok(StoredMedia {
            url: stored.url,
            duration: stored.duration,
        })
    }

    async fn delete(&self, url: &str) -> Result<(), MediaStorageError> {
        let endpoint = format!("{}/media", self.base_url);

        let response = self
            .client
            .delete(endpoint)
            .bearer_auth(&self.api_key)
            .query(&[("url", url)])
            .send()
            .await
            .map_err(|e| MediaStorageError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status).await);
        }

        Ok(())
    }
}

async fn handle_unsuccessful_request(
    response: Response,
    status: StatusCode,
) -> MediaStorageError {
    let result = response.text().await;

    match result {
        Ok(text) => MediaStorageError::Rejected(format!("{}: {}", status, text)),
        Err(e) => MediaStorageError::Rejected(format!("{}: {}", status, e)),
    }
}
