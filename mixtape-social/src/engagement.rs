use crate::{
    Database, DatabaseError, LikeToggleData, MediaStorage, PrimaryKey, SocialContext, SocialEvent,
    SongData, StreamControlPlane,
};

/// Likes and listen-later edges between users and songs.
///
/// Likes are a symmetric toggle that also drives the denormalized like
/// counter on the song. Listen-later is deliberately asymmetric: adding an
/// existing entry and removing a missing one both fail loudly.
pub struct Engagement<Db, St, Cp> {
    context: SocialContext<Db, St, Cp>,
}

impl<Db, St, Cp> Engagement<Db, St, Cp>
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

    /// Flips the like edge for (user, song), returning the resulting state.
    /// The edge mutation and the counter update are one atomic unit.
    pub async fn toggle_like(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<LikeToggleData, DatabaseError> {
        let toggle = self.context.database.toggle_like(user_id, song_id).await?;

        self.context.emit(SocialEvent::LikeToggled {
            user_id,
            song_id,
            liked: toggle.liked,
            likes_count: toggle.likes_count,
        });

        Ok(toggle)
    }

    /// The songs a user has liked, most recent first
    pub async fn liked_songs(&self, user_id: PrimaryKey) -> Result<Vec<SongData>, DatabaseError> {
        self.context.database.liked_songs(user_id).await
    }

    pub async fn add_listen_later(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<(), DatabaseError> {
        self.context
            .database
            .create_listen_later(user_id, song_id)
            .await
    }

    pub async fn remove_listen_later(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<(), DatabaseError> {
        self.context
            .database
            .delete_listen_later(user_id, song_id)
            .await
    }

    /// The songs a user has queued for later, most recent first
    pub async fn listen_later_songs(
        &self,
        user_id: PrimaryKey,
    ) -> Result<Vec<SongData>, DatabaseError> {
        self.context.database.listen_later_songs(user_id).await
    }

    /// Recounts like edges and overwrites the stored counter.
    /// Used for drift recovery, never on the hot path.
    pub async fn recount_likes(&self, song_id: PrimaryKey) -> Result<i64, DatabaseError> {
        self.context.database.recount_song_likes(song_id).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{test_context, test_song, test_user};

    #[tokio::test]
    async fn test_toggle_is_involutive() {
        let context = test_context();
        let engagement = Engagement::new(&context);

        let user = test_user(&context, "listener").await;
        let song = test_song(&context, user.id, "Traaaaaance").await;

        let first = engagement
            .toggle_like(user.id, song.id)
            .await
            .expect("toggles on");

        assert!(first.liked);
        assert_eq!(first.likes_count, 1);

        let second = engagement
            .toggle_like(user.id, song.id)
            .await
            .expect("toggles off");

        assert!(!second.liked);
        assert_eq!(second.likes_count, 0);

        // An even number of toggles restores the original state
        for _ in 0..4 {
            engagement
                .toggle_like(user.id, song.id)
                .await
                .expect("toggles");
        }

        assert_eq!(context.database.count_likes(song.id).await.unwrap(), 0);
        assert!(engagement.liked_songs(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counter_matches_edge_set() {
        let context = test_context();
        let engagement = Engagement::new(&context);

        let owner = test_user(&context, "owner").await;
        let song = test_song(&context, owner.id, "Over the Mountains").await;

        let listeners = [
            test_user(&context, "first").await,
            test_user(&context, "second").await,
            test_user(&context, "third").await,
        ];

        // Every listener likes the song, one un-likes it again
        for listener in &listeners {
            engagement
                .toggle_like(listener.id, song.id)
                .await
                .expect("toggles");
        }

        engagement
            .toggle_like(listeners[1].id, song.id)
            .await
            .expect("toggles off");

        let stored = context.database.song_by_id(song.id).await.unwrap().likes_count;
        let edges = context.database.count_likes(song.id).await.unwrap();

        assert_eq!(stored, 2);
        assert_eq!(stored, edges);
    }

    #[tokio::test]
    async fn test_toggle_missing_song() {
        let context = test_context();
        let engagement = Engagement::new(&context);

        let user = test_user(&context, "listener").await;
        let result = engagement.toggle_like(user.id, 999).await;

        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
        assert_eq!(context.database.count_likes(999).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_recount_repairs_drift() {
        let context = test_context();
        let engagement = Engagement::new(&context);

        let user = test_user(&context, "listener").await;
        let song = test_song(&context, user.id, "Musikk").await;

        engagement
            .toggle_like(user.id, song.id)
            .await
            .expect("toggles");

        let recounted = engagement.recount_likes(song.id).await.expect("recounts");

        assert_eq!(recounted, 1);
        assert_eq!(
            context.database.song_by_id(song.id).await.unwrap().likes_count,
            recounted
        );
    }

    #[tokio::test]
    async fn test_listen_later_is_asymmetric() {
        let context = test_context();
        let engagement = Engagement::new(&context);

        let user = test_user(&context, "listener").await;
        let song = test_song(&context, user.id, "Traaaaaance").await;

        engagement
            .add_listen_later(user.id, song.id)
            .await
            .expect("adds");

        // Adding twice fails loudly instead of toggling
        let duplicate = engagement.add_listen_later(user.id, song.id).await;
        assert!(matches!(duplicate, Err(DatabaseError::Conflict { .. })));

        engagement
            .remove_listen_later(user.id, song.id)
            .await
            .expect("removes");

        // Removing a missing entry fails loudly too
        let missing = engagement.remove_listen_later(user.id, song.id).await;
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_listen_later_listing() {
        let context = test_context();
        let engagement = Engagement::new(&context);

        let user = test_user(&context, "listener").await;
        let first = test_song(&context, user.id, "First").await;
        let second = test_song(&context, user.id, "Second").await;

        engagement
            .add_listen_later(user.id, first.id)
            .await
            .expect("adds");
        engagement
            .add_listen_later(user.id, second.id)
            .await
            .expect("adds");

        let songs = engagement.listen_later_songs(user.id).await.expect("lists");
        let ids: Vec<_> = songs.iter().map(|s| s.id).collect();

        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.id));
        assert!(ids.contains(&second.id));
    }
}
