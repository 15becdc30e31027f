use chrono::{DateTime, Utc};

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// A mixtape account
#[derive(Debug, Clone)]
pub struct UserData {
    pub id: PrimaryKey,
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// A song in the catalog
#[derive(Debug, Clone)]
pub struct SongData {
    pub id: PrimaryKey,
    pub title: String,
    pub album: String,
    pub artist: Option<String>,
    /// Where the uploaded media lives in object storage
    pub media_url: String,
    pub thumbnail_url: Option<String>,
    /// Length of the media in seconds
    pub duration: f32,
    pub genres: Vec<String>,
    pub language: String,
    pub published: bool,
    /// Write-maintained count of like edges targeting this song
    pub likes_count: i64,
    pub owner: UserData,
}

/// One page of the song catalog
#[derive(Debug, Clone)]
pub struct SongPage {
    pub songs: Vec<SongData>,
    /// Total number of songs in the catalog, across all pages
    pub total: i64,
}

/// The result of toggling a like edge
#[derive(Debug, Clone, Copy)]
pub struct LikeToggleData {
    /// True if the edge exists after the toggle
    pub liked: bool,
    pub likes_count: i64,
}

/// The profile read-model of a channel, joined with the follow graph
#[derive(Debug, Clone)]
pub struct ProfileData {
    pub user: UserData,
    pub follower_count: i64,
    pub following_count: i64,
    /// True if the viewer follows this channel. Always false for anonymous viewers.
    pub is_followed: bool,
}

/// A named, ordered collection of songs
#[derive(Debug, Clone)]
pub struct PlaylistData {
    pub id: PrimaryKey,
    /// The externally visible identifier, distinct from the storage key
    pub public_id: String,
    pub name: String,
    pub owner: UserData,
    /// Songs in playlist order
    pub songs: Vec<SongData>,
    pub updated_at: DateTime<Utc>,
}

/// Live-stream session metadata. At most one exists per hosting user.
#[derive(Debug, Clone)]
pub struct StreamData {
    pub id: PrimaryKey,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Optional access price for the stream
    pub ticket_price: Option<i32>,
    /// Identifier of the ingress provisioned at the control plane
    pub ingress_id: Option<String>,
    pub is_live: bool,
    pub host: UserData,
}
