use log::{debug, warn};
use thiserror::Error;

use crate::{
    ControlPlaneError, Database, DatabaseError, IngressData, MediaStorage, MediaStorageError,
    MediaUpload, NewStream, PrimaryKey, RoomGrant, SocialContext, SocialEvent, StreamControlPlane,
    StreamData,
};

/// Live-stream session metadata. The actual transport is entirely the
/// control plane's concern, mixtape only tracks per-host sessions and
/// flips their live flag from webhook events.
pub struct Streams<Db, St, Cp> {
    context: SocialContext<Db, St, Cp>,
}

#[derive(Debug, Error)]
pub enum StreamsError {
    #[error(transparent)]
    Db(#[from] DatabaseError),
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),
    #[error(transparent)]
    Storage(#[from] MediaStorageError),
}

/// Session details supplied by the host. A thumbnail or ticket price left
/// as [None] keeps whatever an earlier session stored.
#[derive(Debug)]
pub struct NewStreamSession {
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<MediaUpload>,
    pub ticket_price: Option<i32>,
}

impl<Db, St, Cp> Streams<Db, St, Cp>
where
    Db: Database,
    St: MediaStorage,
    Cp: StreamControlPlane,
{
    pub fn new(context: &SocialContext<Db, St, Cp>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates or replaces the host's single stream session, swapping the
    /// stored thumbnail when a new one is uploaded
    pub async fn save_session(
        &self,
        user_id: PrimaryKey,
        new_session: NewStreamSession,
    ) -> Result<StreamData, StreamsError> {
        let existing = match self.context.database.stream_by_user(user_id).await {
            Ok(stream) => Some(stream),
            Err(DatabaseError::NotFound { .. }) => None,
            Err(e) => return Err(e.into()),
        };

        let thumbnail_url = match new_session.thumbnail {
            Some(upload) => {
                let old_thumbnail = existing.as_ref().and_then(|s| s.thumbnail_url.as_ref());

                if let Some(old_thumbnail) = old_thumbnail {
                    self.context.media.delete(old_thumbnail).await?;
                }

                Some(self.context.media.store(upload).await?.url)
            }
            None => None,
        };

        let stream = self
            .context
            .database
            .upsert_stream(NewStream {
                user_id,
                title: new_session.title,
                description: new_session.description,
                thumbnail_url,
                ticket_price: new_session.ticket_price,
            })
            .await?;

        Ok(stream)
    }

    /// Provisions an ingress at the control plane and attaches it to the
    /// host's session. The session must exist first.
    pub async fn provision_ingress(
        &self,
        user_id: PrimaryKey,
    ) -> Result<IngressData, StreamsError> {
        let _ = self.context.database.stream_by_user(user_id).await?;

        let ingress = self
            .context
            .control_plane
            .create_ingress(&format!("host-{}", user_id))
            .await?;

        self.context
            .database
            .set_stream_ingress(user_id, ingress.ingress_id.clone())
            .await?;

        Ok(ingress)
    }

    /// Issues a room token for watching the host's stream. The host gets a
    /// distinguished identity, everyone else joins as a plain viewer.
    /// Nobody publishes through room tokens, ingress is the only way in.
    pub async fn room_token(
        &self,
        viewer_id: PrimaryKey,
        host_id: PrimaryKey,
    ) -> Result<String, StreamsError> {
        let host = self.context.database.user_by_id(host_id).await?;

        let identity = if viewer_id == host.id {
            format!("host-{}", host.id)
        } else {
            viewer_id.to_string()
        };

        let token = self
            .context
            .control_plane
            .issue_room_token(RoomGrant {
                room: host.id.to_string(),
                identity,
                can_publish: false,
            })
            .await?;

        Ok(token)
    }

    /// Verifies and applies a status webhook from the control plane,
    /// flipping the live flag of the session matching the ingress.
    /// Events for unknown ingresses are logged and dropped.
    pub async fn handle_webhook(
        &self,
        body: &str,
        authorization: &str,
    ) -> Result<(), StreamsError> {
        let event = self
            .context
            .control_plane
            .verify_webhook(body, authorization)?;

        let is_live = match event.event.as_str() {
            "ingress_started" => true,
            "ingress_ended" => false,
            other => {
                debug!("Ignoring webhook event {}", other);
                return Ok(());
            }
        };

        let info = match event.ingress_info {
            Some(info) => info,
            None => {
                warn!("Webhook event {} carried no ingress info", event.event);
                return Ok(());
            }
        };

        match self
            .context
            .database
            .set_stream_live_by_ingress(&info.ingress_id, is_live)
            .await
        {
            Ok(stream) => {
                let event = if is_live {
                    SocialEvent::StreamWentLive {
                        stream_id: stream.id,
                        host_id: stream.host.id,
                    }
                } else {
                    SocialEvent::StreamWentOffline {
                        stream_id: stream.id,
                        host_id: stream.host.id,
                    }
                };

                self.context.emit(event);
                Ok(())
            }
            Err(DatabaseError::NotFound { .. }) => {
                warn!("No stream session matches ingress {}", info.ingress_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All sessions currently live, joined with their hosts
    pub async fn live(&self) -> Result<Vec<StreamData>, DatabaseError> {
        self.context.database.live_streams().await
    }

    pub async fn session_of(&self, user_id: PrimaryKey) -> Result<StreamData, DatabaseError> {
        self.context.database.stream_by_user(user_id).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{test_context, test_user, WEBHOOK_SECRET};

    fn session(title: &str) -> NewStreamSession {
        NewStreamSession {
            title: title.to_string(),
            description: None,
            thumbnail: None,
            ticket_price: None,
        }
    }

    fn started_event(ingress_id: &str) -> String {
        format!(
            r#"{{"event": "ingress_started", "ingressInfo": {{"ingressId": "{}"}}}}"#,
            ingress_id
        )
    }

    fn ended_event(ingress_id: &str) -> String {
        format!(
            r#"{{"event": "ingress_ended", "ingressInfo": {{"ingressId": "{}"}}}}"#,
            ingress_id
        )
    }

    #[tokio::test]
    async fn test_one_session_per_host() {
        let context = test_context();
        let streams = Streams::new(&context);

        let host = test_user(&context, "host").await;

        let first = streams
            .save_session(host.id, session("First show"))
            .await
            .expect("saves");

        let second = streams
            .save_session(host.id, session("Second show"))
            .await
            .expect("saves");

        // The session is replaced, not duplicated
        assert_eq!(first.id, second.id);
        assert_eq!(second.title, "Second show");
    }

    #[tokio::test]
    async fn test_webhook_flips_live_flag() {
        let context = test_context();
        let streams = Streams::new(&context);

        let host = test_user(&context, "host").await;

        streams
            .save_session(host.id, session("Show"))
            .await
            .expect("saves");

        let ingress = streams
            .provision_ingress(host.id)
            .await
            .expect("provisions");

        streams
            .handle_webhook(&started_event(&ingress.ingress_id), WEBHOOK_SECRET)
            .await
            .expect("handles");

        let live = streams.live().await.expect("lists");
        assert_eq!(live.len(), 1);
        assert!(live[0].is_live);
        assert_eq!(live[0].host.id, host.id);

        streams
            .handle_webhook(&ended_event(&ingress.ingress_id), WEBHOOK_SECRET)
            .await
            .expect("handles");

        assert!(streams.live().await.expect("lists").is_empty());
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_credential() {
        let context = test_context();
        let streams = Streams::new(&context);

        let result = streams
            .handle_webhook(&started_event("ingress-1"), "wrong-secret")
            .await;

        assert!(matches!(
            result,
            Err(StreamsError::ControlPlane(
                ControlPlaneError::InvalidWebhook
            ))
        ));
    }

    #[tokio::test]
    async fn test_webhook_unknown_ingress_is_dropped() {
        let context = test_context();
        let streams = Streams::new(&context);

        streams
            .handle_webhook(&started_event("no-such-ingress"), WEBHOOK_SECRET)
            .await
            .expect("drops the event");

        assert!(streams.live().await.expect("lists").is_empty());
    }

    #[tokio::test]
    async fn test_ingress_requires_session() {
        let context = test_context();
        let streams = Streams::new(&context);

        let host = test_user(&context, "host").await;
        let result = streams.provision_ingress(host.id).await;

        assert!(matches!(
            result,
            Err(StreamsError::Db(DatabaseError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_room_token_identities() {
        let context = test_context();
        let streams = Streams::new(&context);

        let host = test_user(&context, "host").await;
        let viewer = test_user(&context, "viewer").await;

        let host_token = streams.room_token(host.id, host.id).await.expect("issues");
        assert!(host_token.contains(&format!("host-{}", host.id)));

        let viewer_token = streams
            .room_token(viewer.id, host.id)
            .await
            .expect("issues");
        assert!(viewer_token.contains(&viewer.id.to_string()));

        let missing_host = streams.room_token(viewer.id, 999).await;
        assert!(matches!(
            missing_host,
            Err(StreamsError::Db(DatabaseError::NotFound { .. }))
        ));
    }
}
