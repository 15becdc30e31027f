use thiserror::Error;

use crate::{
    Database, DatabaseError, MediaStorage, MediaStorageError, MediaUpload, NewSong, PrimaryKey,
    ProfileData, SocialContext, SocialEvent, SongData, SongFilter, SongPage, StreamControlPlane,
    UpdatedSong,
};

/// The song catalog: publishing, lookups, filtered listings and search.
/// Media blobs live in object storage, the catalog only keeps their urls.
pub struct Catalog<Db, St, Cp> {
    context: SocialContext<Db, St, Cp>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Only the owner of a song can modify it")]
    NotOwner,
    #[error(transparent)]
    Db(#[from] DatabaseError),
    #[error(transparent)]
    Storage(#[from] MediaStorageError),
}

/// A song upload on its way into the catalog
#[derive(Debug)]
pub struct NewSongUpload {
    pub title: String,
    pub album: String,
    pub artist: Option<String>,
    pub genres: Vec<String>,
    pub language: String,
    pub media: MediaUpload,
    pub thumbnail: Option<MediaUpload>,
}

/// Catalog changes to an existing song. Fields left as [None] are kept.
#[derive(Debug)]
pub struct UpdatedSongUpload {
    pub song_id: PrimaryKey,
    pub title: Option<String>,
    pub album: Option<String>,
    pub thumbnail: Option<MediaUpload>,
}

/// Songs and channel profiles matching a free-text query
#[derive(Debug)]
pub struct SearchResults {
    pub songs: Vec<SongData>,
    pub channels: Vec<ProfileData>,
}

impl<Db, St, Cp> Catalog<Db, St, Cp>
where
    Db: Database,
    St: MediaStorage,
    Cp: StreamControlPlane,
{
    pub const PAGE_SIZE: i64 = 24;
    pub const POPULAR_PAGE_SIZE: i64 = 30;

    const SEARCH_LIMIT: i64 = 100;
    const CHANNEL_SEARCH_LIMIT: i64 = 20;

    pub fn new(context: &SocialContext<Db, St, Cp>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Stores the uploaded media, then creates the catalog entry. The
    /// duration is whatever the storage service measured for the blob.
    pub async fn publish(
        &self,
        owner_id: PrimaryKey,
        upload: NewSongUpload,
    ) -> Result<SongData, CatalogError> {
        let media = self.context.media.store(upload.media).await?;

        let thumbnail_url = match upload.thumbnail {
            Some(thumbnail) => Some(self.context.media.store(thumbnail).await?.url),
            None => None,
        };

        let genres = if upload.genres.is_empty() {
            vec!["random".to_string()]
        } else {
            upload.genres
        };

        let song = self
            .context
            .database
            .create_song(NewSong {
                title: upload.title,
                album: upload.album,
                artist: upload.artist,
                owner_id,
                media_url: media.url,
                thumbnail_url,
                duration: media.duration.unwrap_or_default(),
                genres,
                language: upload.language,
            })
            .await?;

        self.context.emit(SocialEvent::SongPublished {
            song_id: song.id,
            owner_id,
        });

        Ok(song)
    }

    pub async fn song_by_id(&self, song_id: PrimaryKey) -> Result<SongData, DatabaseError> {
        self.context.database.song_by_id(song_id).await
    }

    /// One page of the catalog, most liked first
    pub async fn page(&self, page: i64) -> Result<SongPage, DatabaseError> {
        let page = page.max(1);

        self.context
            .database
            .list_songs((page - 1) * Self::PAGE_SIZE, Self::PAGE_SIZE)
            .await
    }

    /// Like [Self::page], with the wider page size of the popular view
    pub async fn popular(&self, page: i64) -> Result<SongPage, DatabaseError> {
        let page = page.max(1);

        self.context
            .database
            .list_songs(
                (page - 1) * Self::POPULAR_PAGE_SIZE,
                Self::POPULAR_PAGE_SIZE,
            )
            .await
    }

    pub async fn by_title(&self, title: &str) -> Result<Vec<SongData>, DatabaseError> {
        self.context
            .database
            .songs_by_filter(SongFilter::Title(title.to_string()))
            .await
    }

    pub async fn by_genre(&self, genre: &str) -> Result<Vec<SongData>, DatabaseError> {
        self.context
            .database
            .songs_by_filter(SongFilter::Genre(genre.to_string()))
            .await
    }

    pub async fn by_language(&self, language: &str) -> Result<Vec<SongData>, DatabaseError> {
        self.context
            .database
            .songs_by_filter(SongFilter::Language(language.to_string()))
            .await
    }

    pub async fn by_album(&self, album: &str) -> Result<Vec<SongData>, DatabaseError> {
        self.context
            .database
            .songs_by_filter(SongFilter::Album(album.to_string()))
            .await
    }

    pub async fn by_artist(&self, artist: &str) -> Result<Vec<SongData>, DatabaseError> {
        self.context
            .database
            .songs_by_filter(SongFilter::Artist(artist.to_string()))
            .await
    }

    /// Songs published by the channel with the given handle
    pub async fn by_owner(&self, username: &str) -> Result<Vec<SongData>, DatabaseError> {
        let owner = self.context.database.user_by_username(username).await?;

        self.context
            .database
            .songs_by_filter(SongFilter::Owner(owner.id))
            .await
    }

    /// Free-text search across the catalog and channel profiles
    pub async fn search(
        &self,
        query: &str,
        viewer_id: Option<PrimaryKey>,
    ) -> Result<SearchResults, DatabaseError> {
        let songs = self
            .context
            .database
            .search_songs(query, Self::SEARCH_LIMIT)
            .await?;

        let channels = self
            .context
            .database
            .search_profiles(query, viewer_id, Self::CHANNEL_SEARCH_LIMIT)
            .await?;

        Ok(SearchResults { songs, channels })
    }

    /// Applies catalog changes to an owned song, replacing the stored
    /// thumbnail when a new one is uploaded
    pub async fn update(
        &self,
        user_id: PrimaryKey,
        update: UpdatedSongUpload,
    ) -> Result<SongData, CatalogError> {
        let song = self.context.database.song_by_id(update.song_id).await?;

        if song.owner.id != user_id {
            return Err(CatalogError::NotOwner);
        }

        let thumbnail_url = match update.thumbnail {
            Some(thumbnail) => {
                if let Some(old_thumbnail) = &song.thumbnail_url {
                    self.context.media.delete(old_thumbnail).await?;
                }

                Some(self.context.media.store(thumbnail).await?.url)
            }
            None => None,
        };

        let updated = self
            .context
            .database
            .update_song(UpdatedSong {
                id: update.song_id,
                title: update.title,
                album: update.album,
                thumbnail_url,
            })
            .await?;

        Ok(updated)
    }

    /// Deletes an owned song along with its stored media.
    /// Like edges cascade with the catalog entry.
    pub async fn delete(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<(), CatalogError> {
        let song = self.context.database.song_by_id(song_id).await?;

        if song.owner.id != user_id {
            return Err(CatalogError::NotOwner);
        }

        self.context.media.delete(&song.media_url).await?;

        if let Some(thumbnail) = &song.thumbnail_url {
            self.context.media.delete(thumbnail).await?;
        }

        self.context.database.delete_song(song_id).await?;

        Ok(())
    }

    /// Flips the publication flag of an owned song
    pub async fn toggle_publish(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<SongData, CatalogError> {
        let song = self.context.database.song_by_id(song_id).await?;

        if song.owner.id != user_id {
            return Err(CatalogError::NotOwner);
        }

        let updated = self
            .context
            .database
            .set_song_published(song_id, !song.published)
            .await?;

        Ok(updated)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{test_context, test_upload, test_user};
    use crate::Engagement;

    fn upload(title: &str) -> NewSongUpload {
        NewSongUpload {
            title: title.to_string(),
            album: "Test Album".to_string(),
            artist: Some("Test Artist".to_string()),
            genres: vec!["electronic".to_string()],
            language: "english".to_string(),
            media: test_upload("song.mp3"),
            thumbnail: None,
        }
    }

    #[tokio::test]
    async fn test_publish_and_fetch() {
        let context = test_context();
        let catalog = Catalog::new(&context);

        let owner = test_user(&context, "owner").await;
        let song = catalog
            .publish(owner.id, upload("Traaaaaance"))
            .await
            .expect("publishes");

        assert_eq!(song.owner.id, owner.id);
        assert!(song.media_url.starts_with("test://media/"));
        assert!(song.published);
        assert_eq!(song.likes_count, 0);

        let fetched = catalog.song_by_id(song.id).await.expect("fetches");
        assert_eq!(fetched.title, "Traaaaaance");
    }

    #[tokio::test]
    async fn test_publish_defaults_genres() {
        let context = test_context();
        let catalog = Catalog::new(&context);

        let owner = test_user(&context, "owner").await;

        let mut no_genres = upload("Untagged");
        no_genres.genres = Vec::new();

        let song = catalog
            .publish(owner.id, no_genres)
            .await
            .expect("publishes");

        assert_eq!(song.genres, vec!["random".to_string()]);
    }

    #[tokio::test]
    async fn test_only_owner_can_modify() {
        let context = test_context();
        let catalog = Catalog::new(&context);

        let owner = test_user(&context, "owner").await;
        let stranger = test_user(&context, "stranger").await;

        let song = catalog
            .publish(owner.id, upload("Mine"))
            .await
            .expect("publishes");

        let delete = catalog.delete(stranger.id, song.id).await;
        assert!(matches!(delete, Err(CatalogError::NotOwner)));

        let toggle = catalog.toggle_publish(stranger.id, song.id).await;
        assert!(matches!(toggle, Err(CatalogError::NotOwner)));

        catalog.delete(owner.id, song.id).await.expect("deletes");

        let missing = catalog.song_by_id(song.id).await;
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_cascades_likes(){
        let context = test_context();
        let catalog = Catalog::new(&context);
        let engagement = Engagement::new(&context);

        let owner = test_user(&context, "owner").await;
        let listener = test_user(&context, "listener").await;

        let song = catalog
            .publish(owner.id, upload("Ephemeral"))
            .await
            .expect("publishes");

        engagement
            .toggle_like(listener.id, song.id)
            .await
            .expect("likes");

        catalog.delete(owner.id, song.id).await.expect("deletes");

        assert_eq!(context.database.count_likes(song.id).await.unwrap(), 0);
        assert!(engagement.liked_songs(listener.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_publish() {
        let context = test_context();
        let catalog = Catalog::new(&context);

        let owner = test_user(&context, "owner").await;
        let song = catalog
            .publish(owner.id, upload("Flicker"))
            .await
            .expect("publishes");

        let hidden = catalog
            .toggle_publish(owner.id, song.id)
            .await
            .expect("toggles");
        assert!(!hidden.published);

        let visible = catalog
            .toggle_publish(owner.id, song.id)
            .await
            .expect("toggles");
        assert!(visible.published);
    }

    #[tokio::test]
    async fn test_page_sorts_by_likes() {
        let context = test_context();
        let catalog = Catalog::new(&context);
        let engagement = Engagement::new(&context);

        let owner = test_user(&context, "owner").await;
        let quiet = catalog
            .publish(owner.id, upload("Quiet"))
            .await
            .expect("publishes");
        let popular = catalog
            .publish(owner.id, upload("Popular"))
            .await
            .expect("publishes");

        engagement
            .toggle_like(owner.id, popular.id)
            .await
            .expect("likes");

        let page = catalog.page(1).await.expect("pages");

        assert_eq!(page.total, 2);
        assert_eq!(page.songs[0].id, popular.id);
        assert_eq!(page.songs[1].id, quiet.id);
    }

    #[tokio::test]
    async fn test_search_finds_songs_and_channels() {
        let context = test_context();
        let catalog = Catalog::new(&context);

        let owner = test_user(&context, "wavemaker").await;
        catalog
            .publish(owner.id, upload("Waves of Static"))
            .await
            .expect("publishes");

        let results = catalog.search("wave", None).await.expect("searches");

        assert_eq!(results.songs.len(), 1);
        assert_eq!(results.channels.len(), 1);
        assert_eq!(results.channels[0].user.username, "wavemaker");
    }
}
