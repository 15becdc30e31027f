use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;
pub type BoxedDatabase = Box<dyn Database>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn conflict_or(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Represents a type that can store and fetch mixtape data
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    /// Handles are matched case-insensitively
    async fn user_by_username(&self, username: &str) -> Result<UserData>;
    async fn user_by_email(&self, email: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData>;
    async fn update_user_password(&self, user_id: PrimaryKey, password: String) -> Result<()>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;

    async fn song_by_id(&self, song_id: PrimaryKey) -> Result<SongData>;
    async fn create_song(&self, new_song: NewSong) -> Result<SongData>;
    async fn update_song(&self, updated_song: UpdatedSong) -> Result<SongData>;
    async fn set_song_published(&self, song_id: PrimaryKey, published: bool) -> Result<SongData>;
    async fn delete_song(&self, song_id: PrimaryKey) -> Result<()>;
    /// Pages through the catalog sorted by like count, most liked first
    async fn list_songs(&self, offset: i64, limit: i64) -> Result<SongPage>;
    async fn songs_by_filter(&self, filter: SongFilter) -> Result<Vec<SongData>>;
    /// Free-text match across title, artist, album, genres and language
    async fn search_songs(&self, query: &str, limit: i64) -> Result<Vec<SongData>>;

    /// Flips the like edge for (user, song) and moves the like counter in the
    /// same atomic unit. The counter change always equals the edge set change.
    async fn toggle_like(&self, user_id: PrimaryKey, song_id: PrimaryKey)
        -> Result<LikeToggleData>;
    async fn liked_songs(&self, user_id: PrimaryKey) -> Result<Vec<SongData>>;
    async fn count_likes(&self, song_id: PrimaryKey) -> Result<i64>;
    /// Recounts like edges and overwrites the stored counter. Drift repair only.
    async fn recount_song_likes(&self, song_id: PrimaryKey) -> Result<i64>;

    async fn create_listen_later(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<()>;
    async fn delete_listen_later(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<()>;
    async fn listen_later_songs(&self, user_id: PrimaryKey) -> Result<Vec<SongData>>;

    async fn create_follow(&self, follower_id: PrimaryKey, followee_id: PrimaryKey) -> Result<()>;
    async fn delete_follow(&self, follower_id: PrimaryKey, followee_id: PrimaryKey) -> Result<()>;
    async fn is_following(&self, follower_id: PrimaryKey, followee_id: PrimaryKey) -> Result<bool>;
    async fn followers_of(&self, user_id: PrimaryKey) -> Result<Vec<UserData>>;
    async fn following_of(&self, user_id: PrimaryKey) -> Result<Vec<UserData>>;
    /// The profile read-model: identity joined with follower/following counts
    /// and the viewer's follow edge. Read-only.
    async fn profile_by_username(
        &self,
        username: &str,
        viewer_id: Option<PrimaryKey>,
    ) -> Result<ProfileData>;
    /// Free-text match across handles and display names, shaped like profiles
    async fn search_profiles(
        &self,
        query: &str,
        viewer_id: Option<PrimaryKey>,
        limit: i64,
    ) -> Result<Vec<ProfileData>>;

    async fn playlist_by_id(&self, playlist_id: PrimaryKey) -> Result<PlaylistData>;
    /// All playlists of an owner, most recently updated first
    async fn playlists_by_owner(&self, owner_id: PrimaryKey) -> Result<Vec<PlaylistData>>;
    async fn latest_playlists(&self, owner_id: PrimaryKey, limit: i64)
        -> Result<Vec<PlaylistData>>;
    async fn search_playlists(&self, owner_id: PrimaryKey, name: &str)
        -> Result<Vec<PlaylistData>>;
    async fn create_playlist(&self, new_playlist: NewPlaylist) -> Result<PlaylistData>;
    async fn rename_playlist(&self, playlist_id: PrimaryKey, name: String) -> Result<PlaylistData>;
    async fn delete_playlist(&self, playlist_id: PrimaryKey) -> Result<()>;
    async fn add_playlist_song(
        &self,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<PlaylistData>;
    /// Removing an absent member succeeds silently
    async fn remove_playlist_song(
        &self,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<PlaylistData>;
    async fn move_playlist_song(
        &self,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
        to: PlaylistPosition,
    ) -> Result<PlaylistData>;

    async fn stream_by_user(&self, user_id: PrimaryKey) -> Result<StreamData>;
    /// Creates or replaces the single stream session of a host
    async fn upsert_stream(&self, new_stream: NewStream) -> Result<StreamData>;
    async fn set_stream_ingress(
        &self,
        user_id: PrimaryKey,
        ingress_id: String,
    ) -> Result<StreamData>;
    async fn set_stream_live_by_ingress(&self, ingress_id: &str, is_live: bool)
        -> Result<StreamData>;
    async fn live_streams(&self) -> Result<Vec<StreamData>>;
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Fields left as [None] are kept unchanged
#[derive(Debug, Default)]
pub struct UpdatedUser {
    pub id: PrimaryKey,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewSong {
    pub title: String,
    pub album: String,
    pub artist: Option<String>,
    /// The owner of the new song
    pub owner_id: PrimaryKey,
    pub media_url: String,
    pub thumbnail_url: Option<String>,
    pub duration: f32,
    pub genres: Vec<String>,
    pub language: String,
}

/// Fields left as [None] are kept unchanged
#[derive(Debug, Default)]
pub struct UpdatedSong {
    pub id: PrimaryKey,
    pub title: Option<String>,
    pub album: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// A single-field catalog filter
#[derive(Debug, Clone)]
pub enum SongFilter {
    Title(String),
    Genre(String),
    Language(String),
    Album(String),
    Artist(String),
    Owner(PrimaryKey),
}

#[derive(Debug)]
pub struct NewPlaylist {
    pub name: String,
    pub public_id: String,
    /// The owner of the new playlist
    pub owner_id: PrimaryKey,
}

/// Target position of a playlist move operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistPosition {
    Top,
    Bottom,
}

/// Thumbnail and ticket price left as [None] keep their stored values on upsert
#[derive(Debug)]
pub struct NewStream {
    pub user_id: PrimaryKey,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub ticket_price: Option<i32>,
}
