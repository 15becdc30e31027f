use thiserror::Error;

use crate::{
    util::random_string, Database, DatabaseError, MediaStorage, NewPlaylist, PlaylistData,
    PlaylistPosition, PrimaryKey, SocialContext, StreamControlPlane,
};

/// Named, ordered song collections. Names are unique per owner, and the
/// order of members is meaningful: songs can be moved to either end.
pub struct Playlists<Db, St, Cp> {
    context: SocialContext<Db, St, Cp>,
}

#[derive(Debug, Error)]
pub enum PlaylistsError {
    #[error("Only the owner of a playlist can modify it")]
    NotOwner,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

impl<Db, St, Cp> Playlists<Db, St, Cp>
where
    Db: Database,
    St: MediaStorage,
    Cp: StreamControlPlane,
{
    const PUBLIC_ID_LENGTH: usize = 12;
    const LATEST_LIMIT: i64 = 3;

    pub fn new(context: &SocialContext<Db, St, Cp>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn create(
        &self,
        owner_id: PrimaryKey,
        name: String,
    ) -> Result<PlaylistData, DatabaseError> {
        self.context
            .database
            .create_playlist(NewPlaylist {
                name,
                public_id: random_string(Self::PUBLIC_ID_LENGTH),
                owner_id,
            })
            .await
    }

    pub async fn playlist_by_id(
        &self,
        playlist_id: PrimaryKey,
    ) -> Result<PlaylistData, DatabaseError> {
        self.context.database.playlist_by_id(playlist_id).await
    }

    /// All playlists of an owner, most recently updated first
    pub async fn by_owner(&self, owner_id: PrimaryKey) -> Result<Vec<PlaylistData>, DatabaseError> {
        self.context.database.playlists_by_owner(owner_id).await
    }

    /// The owner's most recently touched playlists
    pub async fn latest(&self, owner_id: PrimaryKey) -> Result<Vec<PlaylistData>, DatabaseError> {
        self.context
            .database
            .latest_playlists(owner_id, Self::LATEST_LIMIT)
            .await
    }

    pub async fn search(
        &self,
        owner_id: PrimaryKey,
        name: &str,
    ) -> Result<Vec<PlaylistData>, DatabaseError> {
        self.context.database.search_playlists(owner_id, name).await
    }

    pub async fn rename(
        &self,
        user_id: PrimaryKey,
        playlist_id: PrimaryKey,
        name: String,
    ) -> Result<PlaylistData, PlaylistsError> {
        self.ensure_owner(user_id, playlist_id).await?;

        let renamed = self
            .context
            .database
            .rename_playlist(playlist_id, name)
            .await?;

        Ok(renamed)
    }

    pub async fn delete(
        &self,
        user_id: PrimaryKey,
        playlist_id: PrimaryKey,
    ) -> Result<(), PlaylistsError> {
        self.ensure_owner(user_id, playlist_id).await?;
        self.context.database.delete_playlist(playlist_id).await?;

        Ok(())
    }

    /// Appends a song. Fails with a conflict if it is already a member.
    pub async fn add_song(
        &self,
        user_id: PrimaryKey,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<PlaylistData, PlaylistsError> {
        self.ensure_owner(user_id, playlist_id).await?;

        let playlist = self
            .context
            .database
            .add_playlist_song(playlist_id, song_id)
            .await?;

        Ok(playlist)
    }

    /// Removes a song. Removing an absent member succeeds silently.
    pub async fn remove_song(
        &self,
        user_id: PrimaryKey,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<PlaylistData, PlaylistsError> {
        self.ensure_owner(user_id, playlist_id).await?;

        let playlist = self
            .context
            .database
            .remove_playlist_song(playlist_id, song_id)
            .await?;

        Ok(playlist)
    }

    /// Moves a member song to either end of the playlist. Fails when the
    /// song is not a member. Repeating a move is a no-op.
    pub async fn move_song(
        &self,
        user_id: PrimaryKey,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
        to: PlaylistPosition,
    ) -> Result<PlaylistData, PlaylistsError> {
        self.ensure_owner(user_id, playlist_id).await?;

        let playlist = self
            .context
            .database
            .move_playlist_song(playlist_id, song_id, to)
            .await?;

        Ok(playlist)
    }

    async fn ensure_owner(
        &self,
        user_id: PrimaryKey,
        playlist_id: PrimaryKey,
    ) -> Result<(), PlaylistsError> {
        let playlist = self.context.database.playlist_by_id(playlist_id).await?;

        if playlist.owner.id != user_id {
            return Err(PlaylistsError::NotOwner);
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{test_context, test_song, test_user};

    #[tokio::test]
    async fn test_unique_name_per_owner() {
        let context = test_context();
        let playlists = Playlists::new(&context);

        let owner = test_user(&context, "owner").await;
        let other = test_user(&context, "other").await;

        playlists
            .create(owner.id, "Morning".to_string())
            .await
            .expect("creates");

        let duplicate = playlists.create(owner.id, "Morning".to_string()).await;
        assert!(matches!(duplicate, Err(DatabaseError::Conflict { .. })));

        // The same name under a different owner is fine
        playlists
            .create(other.id, "Morning".to_string())
            .await
            .expect("creates");
    }

    #[tokio::test]
    async fn test_add_and_remove_members() {
        let context = test_context();
        let playlists = Playlists::new(&context);

        let owner = test_user(&context, "owner").await;
        let song = test_song(&context, owner.id, "Traaaaaance").await;

        let playlist = playlists
            .create(owner.id, "Morning".to_string())
            .await
            .expect("creates");

        let updated = playlists
            .add_song(owner.id, playlist.id, song.id)
            .await
            .expect("adds");
        assert_eq!(updated.songs.len(), 1);

        // Duplicate membership is a conflict
        let duplicate = playlists.add_song(owner.id, playlist.id, song.id).await;
        assert!(matches!(
            duplicate,
            Err(PlaylistsError::Db(DatabaseError::Conflict { .. }))
        ));

        let updated = playlists
            .remove_song(owner.id, playlist.id, song.id)
            .await
            .expect("removes");
        assert!(updated.songs.is_empty());

        // Removing an absent member succeeds silently
        let silent = playlists
            .remove_song(owner.id, playlist.id, song.id)
            .await
            .expect("still succeeds");
        assert!(silent.songs.is_empty());
    }

    #[tokio::test]
    async fn test_add_missing_song() {
        let context = test_context();
        let playlists = Playlists::new(&context);

        let owner = test_user(&context, "owner").await;
        let playlist = playlists
            .create(owner.id, "Morning".to_string())
            .await
            .expect("creates");

        let missing = playlists.add_song(owner.id, playlist.id, 999).await;
        assert!(matches!(
            missing,
            Err(PlaylistsError::Db(DatabaseError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_move_ordering() {
        let context = test_context();
        let playlists = Playlists::new(&context);

        let owner = test_user(&context, "owner").await;
        let s1 = test_song(&context, owner.id, "One").await;
        let s2 = test_song(&context, owner.id, "Two").await;
        let s3 = test_song(&context, owner.id, "Three").await;

        let playlist = playlists
            .create(owner.id, "Ordered".to_string())
            .await
            .expect("creates");

        for song in [&s1, &s2, &s3] {
            playlists
                .add_song(owner.id, playlist.id, song.id)
                .await
                .expect("adds");
        }

        let moved = playlists
            .move_song(owner.id, playlist.id, s3.id, PlaylistPosition::Top)
            .await
            .expect("moves");
        let order: Vec<_> = moved.songs.iter().map(|s| s.id).collect();
        assert_eq!(order, vec![s3.id, s1.id, s2.id]);

        let moved = playlists
            .move_song(owner.id, playlist.id, s1.id, PlaylistPosition::Bottom)
            .await
            .expect("moves");
        let order: Vec<_> = moved.songs.iter().map(|s| s.id).collect();
        assert_eq!(order, vec![s3.id, s2.id, s1.id]);

        // Moving to the top twice leaves the song at the top
        playlists
            .move_song(owner.id, playlist.id, s3.id, PlaylistPosition::Top)
            .await
            .expect("moves");
        let moved = playlists
            .move_song(owner.id, playlist.id, s3.id, PlaylistPosition::Top)
            .await
            .expect("moves");
        let order: Vec<_> = moved.songs.iter().map(|s| s.id).collect();
        assert_eq!(order, vec![s3.id, s2.id, s1.id]);
    }

    #[tokio::test]
    async fn test_move_missing_member() {
        let context = test_context();
        let playlists = Playlists::new(&context);

        let owner = test_user(&context, "owner").await;
        let song = test_song(&context, owner.id, "Loose").await;

        let playlist = playlists
            .create(owner.id, "Empty".to_string())
            .await
            .expect("creates");

        let missing = playlists
            .move_song(owner.id, playlist.id, song.id, PlaylistPosition::Top)
            .await;

        assert!(matches!(
            missing,
            Err(PlaylistsError::Db(DatabaseError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_only_owner_can_modify() {
        let context = test_context();
        let playlists = Playlists::new(&context);

        let owner = test_user(&context, "owner").await;
        let stranger = test_user(&context, "stranger").await;
        let song = test_song(&context, owner.id, "Guarded").await;

        let playlist = playlists
            .create(owner.id, "Private".to_string())
            .await
            .expect("creates");

        let add = playlists.add_song(stranger.id, playlist.id, song.id).await;
        assert!(matches!(add, Err(PlaylistsError::NotOwner)));

        let delete = playlists.delete(stranger.id, playlist.id).await;
        assert!(matches!(delete, Err(PlaylistsError::NotOwner)));
    }

    #[tokio::test]
    async fn test_rename() {
        let context = test_context();
        let playlists = Playlists::new(&context);

        let owner = test_user(&context, "owner").await;

        playlists
            .create(owner.id, "First".to_string())
            .await
            .expect("creates");
        let second = playlists
            .create(owner.id, "Second".to_string())
            .await
            .expect("creates");

        let renamed = playlists
            .rename(owner.id, second.id, "Refreshed".to_string())
            .await
            .expect("renames");
        assert_eq!(renamed.name, "Refreshed");

        let conflict = playlists
            .rename(owner.id, second.id, "First".to_string())
            .await;
        assert!(matches!(
            conflict,
            Err(PlaylistsError::Db(DatabaseError::Conflict { .. }))
        ));
    }

    #[tokio::test]
    async fn test_listings() {
        let context = test_context();
        let playlists = Playlists::new(&context);

        let owner = test_user(&context, "owner").await;

        for name in ["One", "Two", "Three", "Four"] {
            playlists
                .create(owner.id, name.to_string())
                .await
                .expect("creates");
        }

        let all = playlists.by_owner(owner.id).await.expect("lists");
        assert_eq!(all.len(), 4);

        let latest = playlists.latest(owner.id).await.expect("lists");
        assert_eq!(latest.len(), 3);

        let hits = playlists.search(owner.id, "t").await.expect("searches");
        let names: Vec<_> = hits.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"Two") && names.contains(&"Three"));
        assert!(!names.contains(&"One"));
    }
}
