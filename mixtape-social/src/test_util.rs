//! Shared fixtures for manager tests: an in-memory context with fake
//! external collaborators, plus helpers to seed users and songs.

use async_trait::async_trait;
use crossbeam::channel::unbounded;
use std::sync::Arc;

use crate::{
    ControlPlaneError, Database, IngressData, MediaStorage, MediaStorageError, MediaUpload,
    MemoryDatabase, NewSong, NewUser, RoomGrant, SocialContext, SongData, StoredMedia,
    StreamControlPlane, UserData, WebhookEvent,
};

pub const WEBHOOK_SECRET: &str = "test-secret";

/// Stores nothing, returns stable urls
pub struct FakeMediaStorage;

#[async_trait]
impl MediaStorage for FakeMediaStorage {
    async fn store(&self, upload: MediaUpload) -> Result<StoredMedia, MediaStorageError> {
        Ok(StoredMedia {
            url: format!("test://media/{}", upload.file_name),
            duration: Some(180.0),
        })
    }

    async fn delete(&self, _url: &str) -> Result<(), MediaStorageError> {
        Ok(())
    }
}

/// Provisions predictable ingresses and tokens
pub struct FakeControlPlane;

#[async_trait]
impl StreamControlPlane for FakeControlPlane {
    async fn create_ingress(&self, host_identity: &str) -> Result<IngressData, ControlPlaneError> {
        Ok(IngressData {
            ingress_id: format!("ingress-{}", host_identity),
            server_url: "rtmp://ingest.test".to_string(),
            stream_key: "stream-key".to_string(),
        })
    }

    async fn issue_room_token(&self, grant: RoomGrant) -> Result<String, ControlPlaneError> {
        Ok(format!("token:{}:{}", grant.room, grant.identity))
    }

    fn verify_webhook(
        &self,
        body: &str,
        authorization: &str,
    ) -> Result<WebhookEvent, ControlPlaneError> {
        if authorization != WEBHOOK_SECRET {
            return Err(ControlPlaneError::InvalidWebhook);
        }

        serde_json::from_str(body).map_err(|e| ControlPlaneError::InvalidPayload(e.to_string()))
    }
}

pub fn test_context() -> SocialContext<MemoryDatabase, FakeMediaStorage, FakeControlPlane> {
    let (emitter, _) = unbounded();

    SocialContext {
        database: Arc::new(MemoryDatabase::new()),
        media: Arc::new(FakeMediaStorage),
        control_plane: Arc::new(FakeControlPlane),
        emitter,
    }
}

/// Seeds a user directly, skipping password hashing
pub async fn test_user(
    context: &SocialContext<MemoryDatabase, FakeMediaStorage, FakeControlPlane>,
    name: &str,
) -> UserData {
    context
        .database
        .create_user(NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password: "not-a-real-hash".to_string(),
            display_name: name.to_string(),
            avatar_url: None,
        })
        .await
        .expect("test user is created")
}

/// Seeds a song directly, without going through object storage
pub async fn test_song(
    context: &SocialContext<MemoryDatabase, FakeMediaStorage, FakeControlPlane>,
    owner_id: i32,
    title: &str,
) -> SongData {
    context
        .database
        .create_song(NewSong {
            title: title.to_string(),
            album: "Test Album".to_string(),
            artist: None,
            owner_id,
            media_url: format!("test://media/{}", title),
            thumbnail_url: None,
            duration: 180.0,
            genres: vec!["electronic".to_string()],
            language: "english".to_string(),
        })
        .await
        .expect("test song is created")
}

pub fn test_upload(file_name: &str) -> MediaUpload {
    MediaUpload {
        file_name: file_name.to_string(),
        content_type: "application/octet-stream".to_string(),
        bytes: vec![0, 1, 2, 3],
    }
}
