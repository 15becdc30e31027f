//! All schemas that are exposed from endpoints are defined here
//! along with the conversion impls

use serde::Serialize;
use utoipa::ToSchema;

use mixtape_social::{
    IngressData, LikeToggleData, PlaylistData, ProfileData,
    SearchResults as SocialSearchResults, SessionData, SongData, SongPage as SocialSongPage,
    StreamData, UserData,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct User {
    id: i32,
    username: String,
    email: String,
    display_name: String,
    avatar_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    user: User,
}

/// The aggregated public view of a channel
#[derive(Debug, Serialize, ToSchema)]
pub struct Channel {
    username: String,
    display_name: String,
    avatar_url: Option<String>,
    follower_count: i64,
    following_count: i64,
    is_followed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Song {
    id: i32,
    title: String,
    album: String,
    artist: Option<String>,
    media_url: String,
    thumbnail_url: Option<String>,
    duration: f32,
    genres: Vec<String>,
    language: String,
    published: bool,
    likes_count: i64,
    owner: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SongPage {
    songs: Vec<Song>,
    total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LikeToggle {
    liked: bool,
    likes_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResults {
    songs: Vec<Song>,
    channels: Vec<Channel>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Playlist {
    id: i32,
    public_id: String,
    name: String,
    owner: User,
    songs: Vec<Song>,
}

/// Note: the ingress is deliberately not part of this schema
#[derive(Debug, Serialize, ToSchema)]
pub struct Stream {
    id: i32,
    title: String,
    description: Option<String>,
    thumbnail_url: Option<String>,
    ticket_price: Option<i32>,
    is_live: bool,
    host: User,
}

/// Ingress details, only ever returned to the host that provisioned them
#[derive(Debug, Serialize, ToSchema)]
pub struct Ingress {
    ingress_id: String,
    server_url: String,
    stream_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomToken {
    token: String,
}

/// A data-less confirmation
#[derive(Debug, Serialize, ToSchema)]
pub struct Message {
    message: String,
}

impl Message {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Channel> for ProfileData {
    fn to_serialized(&self) -> Channel {
        Channel {
            username: self.user.username.clone(),
            display_name: self.user.display_name.clone(),
            avatar_url: self.user.avatar_url.clone(),
            follower_count: self.follower_count,
            following_count: self.following_count,
            is_followed: self.is_followed,
        }
    }
}

impl ToSerialized<Song> for SongData {
    fn to_serialized(&self) -> Song {
        Song {
            id: self.id,
            title: self.title.clone(),
            album: self.album.clone(),
            artist: self.artist.clone(),
            media_url: self.media_url.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            duration: self.duration,
            genres: self.genres.clone(),
            language: self.language.clone(),
            published: self.published,
            likes_count: self.likes_count,
            owner: self.owner.to_serialized(),
        }
    }
}

impl ToSerialized<SongPage> for SocialSongPage {
    fn to_serialized(&self) -> SongPage {
        SongPage {
            songs: self.songs.to_serialized(),
            total: self.total,
        }
    }
}

impl ToSerialized<LikeToggle> for LikeToggleData {
    fn to_serialized(&self) -> LikeToggle {
        LikeToggle {
            liked: self.liked,
            likes_count: self.likes_count,
        }
    }
}

impl ToSerialized<SearchResults> for SocialSearchResults {
    fn to_serialized(&self) -> SearchResults {
        SearchResults {
            songs: self.songs.to_serialized(),
            channels: self.channels.to_serialized(),
        }
    }
}

impl ToSerialized<Playlist> for PlaylistData {
    fn to_serialized(&self) -> Playlist {
        Playlist {
            id: self.id,
            public_id: self.public_id.clone(),
            name: self.name.clone(),
            owner: self.owner.to_serialized(),
            songs: self.songs.to_serialized(),
        }
    }
}

impl ToSerialized<Stream> for StreamData {
    fn to_serialized(&self) -> Stream {
        Stream {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            ticket_price: self.ticket_price,
            is_live: self.is_live,
            host: self.host.to_serialized(),
        }
    }
}

impl ToSerialized<Ingress> for IngressData {
    fn to_serialized(&self) -> Ingress {
        Ingress {
            ingress_id: self.ingress_id.clone(),
            server_url: self.server_url.clone(),
            stream_key: self.stream_key.clone(),
        }
    }
}

impl ToSerialized<RoomToken> for String {
    fn to_serialized(&self) -> RoomToken {
        RoomToken {
            token: self.clone(),
        }
    }
}
