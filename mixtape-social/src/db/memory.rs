use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{
    Database, DatabaseError, LikeToggleData, NewPlaylist, NewSession, NewSong, NewStream, NewUser,
    PlaylistData, PlaylistPosition, PrimaryKey, ProfileData, Result, SessionData, SongData,
    SongFilter, SongPage, StreamData, UpdatedSong, UpdatedUser, UserData,
};

/// An in-memory database implementation for mixtape.
///
/// Semantics match [PgDatabase], with the whole state behind one lock so
/// every operation is atomic. Used by tests and local development.
///
/// [PgDatabase]: crate::PgDatabase
#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_id: PrimaryKey,
    users: Vec<UserData>,
    sessions: Vec<StoredSession>,
    songs: Vec<StoredSong>,
    likes: Vec<Edge>,
    listen_later: Vec<Edge>,
    follows: Vec<FollowEdge>,
    playlists: Vec<StoredPlaylist>,
    streams: Vec<StoredStream>,
}

struct StoredSession {
    id: PrimaryKey,
    token: String,
    user_id: PrimaryKey,
    expires_at: DateTime<Utc>,
}

struct StoredSong {
    id: PrimaryKey,
    title: String,
    album: String,
    artist: Option<String>,
    owner_id: PrimaryKey,
    media_url: String,
    thumbnail_url: Option<String>,
    duration: f32,
    genres: Vec<String>,
    language: String,
    published: bool,
    likes_count: i64,
}

/// A (user, song) membership edge
struct Edge {
    user_id: PrimaryKey,
    song_id: PrimaryKey,
    created_at: DateTime<Utc>,
}

struct FollowEdge {
    follower_id: PrimaryKey,
    followee_id: PrimaryKey,
    created_at: DateTime<Utc>,
}

struct StoredPlaylist {
    id: PrimaryKey,
    public_id: String,
    name: String,
    owner_id: PrimaryKey,
    /// Song references in playlist order
    songs: Vec<PrimaryKey>,
    updated_at: DateTime<Utc>,
}

struct StoredStream {
    id: PrimaryKey,
    user_id: PrimaryKey,
    title: String,
    description: Option<String>,
    thumbnail_url: Option<String>,
    ticket_price: Option<i32>,
    ingress_id: Option<String>,
    is_live: bool,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Default::default()
    }
}

impl State {
    fn assign_id(&mut self) -> PrimaryKey {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })
    }

    fn song(&self, song_id: PrimaryKey) -> Result<SongData> {
        let stored = self
            .songs
            .iter()
            .find(|s| s.id == song_id)
            .ok_or(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            })?;

        self.song_data(stored)
    }

    fn song_data(&self, stored: &StoredSong) -> Result<SongData> {
        Ok(SongData {
            id: stored.id,
            title: stored.title.clone(),
            album: stored.album.clone(),
            artist: stored.artist.clone(),
            media_url: stored.media_url.clone(),
            thumbnail_url: stored.thumbnail_url.clone(),
            duration: stored.duration,
            genres: stored.genres.clone(),
            language: stored.language.clone(),
            published: stored.published,
            likes_count: stored.likes_count,
            owner: self.user(stored.owner_id)?,
        })
    }

    fn playlist_data(&self, stored: &StoredPlaylist) -> Result<PlaylistData> {
        let songs = stored
            .songs
            .iter()
            .map(|id| self.song(*id))
            .collect::<Result<_>>()?;

        Ok(PlaylistData {
            id: stored.id,
            public_id: stored.public_id.clone(),
            name: stored.name.clone(),
            owner: self.user(stored.owner_id)?,
            songs,
            updated_at: stored.updated_at,
        })
    }

    fn playlist_mut(&mut self, playlist_id: PrimaryKey) -> Result<&mut StoredPlaylist> {
        self.playlists
            .iter_mut()
            .find(|p| p.id == playlist_id)
            .ok_or(DatabaseError::NotFound {
                resource: "playlist",
                identifier: "id",
            })
    }

    fn stream_data(&self, stored: &StoredStream) -> Result<StreamData> {
        Ok(StreamData {
            id: stored.id,
            title: stored.title.clone(),
            description: stored.description.clone(),
            thumbnail_url: stored.thumbnail_url.clone(),
            ticket_price: stored.ticket_price,
            ingress_id: stored.ingress_id.clone(),
            is_live: stored.is_live,
            host: self.user(stored.user_id)?,
        })
    }

    fn profile_data(&self, user: UserData, viewer_id: Option<PrimaryKey>) -> ProfileData {
        let follower_count = self
            .follows
            .iter()
            .filter(|f| f.followee_id == user.id)
            .count() as i64;

        let following_count = self
            .follows
            .iter()
            .filter(|f| f.follower_id == user.id)
            .count() as i64;

        let is_followed = viewer_id.is_some_and(|viewer| {
            self.follows
                .iter()
                .any(|f| f.followee_id == user.id && f.follower_id == viewer)
        });

        ProfileData {
            user,
            follower_count,
            following_count,
            is_followed,
        }
    }
}

fn matches(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.state.lock().user(user_id)
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        self.state
            .lock()
            .users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "username",
            })
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        self.state
            .lock()
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "email",
            })
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let mut state = self.state.lock();

        if state
            .users
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(&new_user.username))
        {
            return Err(DatabaseError::Conflict {
                resource: "user",
                field: "username",
                value: new_user.username,
            });
        }

        if state
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&new_user.email))
        {
            return Err(DatabaseError::Conflict {
                resource: "user",
                field: "email",
                value: new_user.email,
            });
        }

        let user = UserData {
            id: state.assign_id(),
            username: new_user.username,
            email: new_user.email,
            password: new_user.password,
            display_name: new_user.display_name,
            avatar_url: new_user.avatar_url,
        };

        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        let mut state = self.state.lock();

        if let Some(email) = &updated_user.email {
            if state
                .users
                .iter()
                .any(|u| u.id != updated_user.id && u.email.eq_ignore_ascii_case(email))
            {
                return Err(DatabaseError::Conflict {
                    resource: "user",
                    field: "email",
                    value: email.clone(),
                });
            }
        }

        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == updated_user.id)
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })?;

        if let Some(display_name) = updated_user.display_name {
            user.display_name = display_name;
        }

        if let Some(email) = updated_user.email {
            user.email = email;
        }

        if let Some(avatar_url) = updated_user.avatar_url {
            user.avatar_url = Some(avatar_url);
        }

        Ok(user.clone())
    }

    async fn update_user_password(&self, user_id: PrimaryKey, password: String) -> Result<()> {
        let mut state = self.state.lock();

        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })?;

        user.password = password;
        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let state = self.state.lock();

        let session = state
            .sessions
            .iter()
            .find(|s| s.token == token)
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            })?;

        Ok(SessionData {
            id: session.id,
            token: session.token.clone(),
            expires_at: session.expires_at,
            user: state.user(session.user_id)?,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let mut state = self.state.lock();

        if state.sessions.iter().any(|s| s.token == new_session.token) {
            return Err(DatabaseError::Conflict {
                resource: "session",
                field: "token",
                value: new_session.token,
            });
        }

        let user = state.user(new_session.user_id)?;
        let session = StoredSession {
            id: state.assign_id(),
            token: new_session.token,
            user_id: new_session.user_id,
            expires_at: new_session.expires_at,
        };

        let data = SessionData {
            id: session.id,
            token: session.token.clone(),
            expires_at: session.expires_at,
            user,
        };

        state.sessions.push(session);
        Ok(data)
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.sessions.len();

        state.sessions.retain(|s| s.token != token);

        if state.sessions.len() == before {
            return Err(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            });
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();
        self.state.lock().sessions.retain(|s| s.expires_at >= now);
        Ok(())
    }

    async fn song_by_id(&self, song_id: PrimaryKey) -> Result<SongData> {
        self.state.lock().song(song_id)
    }

    async fn create_song(&self, new_song: NewSong) -> Result<SongData> {
        let mut state = self.state.lock();

        // Mirrors the foreign key on owner_id
        let _ = state.user(new_song.owner_id)?;

        let song = StoredSong {
            id: state.assign_id(),
            title: new_song.title,
            album: new_song.album,
            artist: new_song.artist,
            owner_id: new_song.owner_id,
            media_url: new_song.media_url,
            thumbnail_url: new_song.thumbnail_url,
            duration: new_song.duration,
            genres: new_song.genres,
            language: new_song.language,
            published: true,
            likes_count: 0,
        };

        let data = state.song_data(&song)?;
        state.songs.push(song);

        Ok(data)
    }

    async fn update_song(&self, updated_song: UpdatedSong) -> Result<SongData> {
        let mut state = self.state.lock();

        let song = state
            .songs
            .iter_mut()
            .find(|s| s.id == updated_song.id)
            .ok_or(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            })?;

        if let Some(title) = updated_song.title {
            song.title = title;
        }

        if let Some(album) = updated_song.album {
            song.album = album;
        }

        if let Some(thumbnail_url) = updated_song.thumbnail_url {
            song.thumbnail_url = Some(thumbnail_url);
        }

        state.song(updated_song.id)
    }

    async fn set_song_published(&self, song_id: PrimaryKey, published: bool) -> Result<SongData> {
        let mut state = self.state.lock();

        let song = state
            .songs
            .iter_mut()
            .find(|s| s.id == song_id)
            .ok_or(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            })?;

        song.published = published;
        state.song(song_id)
    }

    async fn delete_song(&self, song_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.songs.len();

        state.songs.retain(|s| s.id != song_id);

        if state.songs.len() == before {
            return Err(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            });
        }

        // Mirrors the cascading foreign keys
        state.likes.retain(|e| e.song_id != song_id);
        state.listen_later.retain(|e| e.song_id != song_id);

        for playlist in state.playlists.iter_mut() {
            playlist.songs.retain(|id| *id != song_id);
        }

        Ok(())
    }

    async fn list_songs(&self, offset: i64, limit: i64) -> Result<SongPage> {
        let state = self.state.lock();

        let mut sorted: Vec<_> = state.songs.iter().collect();
        sorted.sort_by(|a, b| b.likes_count.cmp(&a.likes_count).then(a.id.cmp(&b.id)));

        let songs = sorted
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|s| state.song_data(s))
            .collect::<Result<_>>()?;

        Ok(SongPage {
            songs,
            total: state.songs.len() as i64,
        })
    }

    async fn songs_by_filter(&self, filter: SongFilter) -> Result<Vec<SongData>> {
        let state = self.state.lock();

        state
            .songs
            .iter()
            .filter(|s| match &filter {
                SongFilter::Title(title) => matches(&s.title, title),
                SongFilter::Genre(genre) => s.genres.iter().any(|g| g == genre),
                SongFilter::Language(language) => &s.language == language,
                SongFilter::Album(album) => &s.album == album,
                SongFilter::Artist(artist) => s.artist.as_ref() == Some(artist),
                SongFilter::Owner(owner_id) => s.owner_id == *owner_id,
            })
            .map(|s| state.song_data(s))
            .collect()
    }

    async fn search_songs(&self, query: &str, limit: i64) -> Result<Vec<SongData>> {
        let state = self.state.lock();

        let mut hits: Vec<_> = state
            .songs
            .iter()
            .filter(|s| {
                matches(&s.title, query)
                    || s.artist.as_deref().is_some_and(|a| matches(a, query))
                    || matches(&s.album, query)
                    || matches(&s.language, query)
                    || s.genres.iter().any(|g| matches(g, query))
            })
            .collect();

        hits.sort_by(|a, b| b.likes_count.cmp(&a.likes_count).then(a.id.cmp(&b.id)));
        hits.truncate(limit.max(0) as usize);

        hits.into_iter().map(|s| state.song_data(s)).collect()
    }

    async fn toggle_like(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<LikeToggleData> {
        let mut state = self.state.lock();

        if !state.songs.iter().any(|s| s.id == song_id) {
            return Err(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            });
        }

        let before = state.likes.len();
        state
            .likes
            .retain(|e| !(e.user_id == user_id && e.song_id == song_id));
        let deleted = before != state.likes.len();

        let delta = if deleted {
            -1
        } else {
            state.likes.push(Edge {
                user_id,
                song_id,
                created_at: Utc::now(),
            });

            1
        };

        let song = state
            .songs
            .iter_mut()
            .find(|s| s.id == song_id)
            .ok_or(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            })?;

        song.likes_count += delta;

        Ok(LikeToggleData {
            liked: !deleted,
            likes_count: song.likes_count,
        })
    }

    async fn liked_songs(&self, user_id: PrimaryKey) -> Result<Vec<SongData>> {
        let state = self.state.lock();

        let mut edges: Vec<_> = state.likes.iter().filter(|e| e.user_id == user_id).collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        edges.into_iter().map(|e| state.song(e.song_id)).collect()
    }

    async fn count_likes(&self, song_id: PrimaryKey) -> Result<i64> {
        let count = self
            .state
            .lock()
            .likes
            .iter()
            .filter(|e| e.song_id == song_id)
            .count();

        Ok(count as i64)
    }

    async fn recount_song_likes(&self, song_id: PrimaryKey) -> Result<i64> {
        let mut state = self.state.lock();

        let count = state.likes.iter().filter(|e| e.song_id == song_id).count() as i64;

        let song = state
            .songs
            .iter_mut()
            .find(|s| s.id == song_id)
            .ok_or(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            })?;

        song.likes_count = count;
        Ok(count)
    }

    async fn create_listen_later(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();

        if !state.songs.iter().any(|s| s.id == song_id) {
            return Err(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            });
        }

        if state
            .listen_later
            .iter()
            .any(|e| e.user_id == user_id && e.song_id == song_id)
        {
            return Err(DatabaseError::Conflict {
                resource: "listen later entry",
                field: "song_id",
                value: song_id.to_string(),
            });
        }

        state.listen_later.push(Edge {
            user_id,
            song_id,
            created_at: Utc::now(),
        });

        Ok(())
    }

    async fn delete_listen_later(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.listen_later.len();

        state
            .listen_later
            .retain(|e| !(e.user_id == user_id && e.song_id == song_id));

        if state.listen_later.len() == before {
            return Err(DatabaseError::NotFound {
                resource: "listen later entry",
                identifier: "song_id",
            });
        }

        Ok(())
    }

    async fn listen_later_songs(&self, user_id: PrimaryKey) -> Result<Vec<SongData>> {
        let state = self.state.lock();

        let mut edges: Vec<_> = state
            .listen_later
            .iter()
            .filter(|e| e.user_id == user_id)
            .collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        edges.into_iter().map(|e| state.song(e.song_id)).collect()
    }

    async fn create_follow(&self, follower_id: PrimaryKey, followee_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();

        // Mirrors the foreign keys and the self-loop check constraint
        let _ = state.user(follower_id)?;
        let _ = state.user(followee_id)?;

        if follower_id == followee_id {
            return Err(DatabaseError::Internal(
                "follow edges may not be self-loops".into(),
            ));
        }

        if state
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.followee_id == followee_id)
        {
            return Err(DatabaseError::Conflict {
                resource: "follow",
                field: "follower:followee",
                value: format!("{}:{}", follower_id, followee_id),
            });
        }

        state.follows.push(FollowEdge {
            follower_id,
            followee_id,
            created_at: Utc::now(),
        });

        Ok(())
    }

    async fn delete_follow(&self, follower_id: PrimaryKey, followee_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.follows.len();

        state
            .follows
            .retain(|f| !(f.follower_id == follower_id && f.followee_id == followee_id));

        if state.follows.len() == before {
            return Err(DatabaseError::NotFound {
                resource: "follow",
                identifier: "follower:followee",
            });
        }

        Ok(())
    }

    async fn is_following(
        &self,
        follower_id: PrimaryKey,
        followee_id: PrimaryKey,
    ) -> Result<bool> {
        let exists = self
            .state
            .lock()
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.followee_id == followee_id);

        Ok(exists)
    }

    async fn followers_of(&self, user_id: PrimaryKey) -> Result<Vec<UserData>> {
        let state = self.state.lock();

        let mut edges: Vec<_> = state
            .follows
            .iter()
            .filter(|f| f.followee_id == user_id)
            .collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        edges.into_iter().map(|f| state.user(f.follower_id)).collect()
    }

    async fn following_of(&self, user_id: PrimaryKey) -> Result<Vec<UserData>> {
        let state = self.state.lock();

        let mut edges: Vec<_> = state
            .follows
            .iter()
            .filter(|f| f.follower_id == user_id)
            .collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        edges.into_iter().map(|f| state.user(f.followee_id)).collect()
    }

    async fn profile_by_username(
        &self,
        username: &str,
        viewer_id: Option<PrimaryKey>,
    ) -> Result<ProfileData> {
        let state = self.state.lock();

        let user = state
            .users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "channel",
                identifier: "username",
            })?;

        Ok(state.profile_data(user, viewer_id))
    }

    async fn search_profiles(
        &self,
        query: &str,
        viewer_id: Option<PrimaryKey>,
        limit: i64,
    ) -> Result<Vec<ProfileData>> {
        let state = self.state.lock();

        let profiles = state
            .users
            .iter()
            .filter(|u| matches(&u.username, query) || matches(&u.display_name, query))
            .take(limit.max(0) as usize)
            .map(|u| state.profile_data(u.clone(), viewer_id))
            .collect();

        Ok(profiles)
    }

    async fn playlist_by_id(&self, playlist_id: PrimaryKey) -> Result<PlaylistData> {
        let state = self.state.lock();

        let playlist = state
            .playlists
            .iter()
            .find(|p| p.id == playlist_id)
            .ok_or(DatabaseError::NotFound {
                resource: "playlist",
                identifier: "id",
            })?;

        state.playlist_data(playlist)
    }

    async fn playlists_by_owner(&self, owner_id: PrimaryKey) -> Result<Vec<PlaylistData>> {
        let state = self.state.lock();

        let mut playlists: Vec<_> = state
            .playlists
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .collect();
        playlists.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        playlists.into_iter().map(|p| state.playlist_data(p)).collect()
    }

    async fn latest_playlists(
        &self,
        owner_id: PrimaryKey,
        limit: i64,
    ) -> Result<Vec<PlaylistData>> {
        let mut playlists = self.playlists_by_owner(owner_id).await?;
        playlists.truncate(limit.max(0) as usize);

        Ok(playlists)
    }

    async fn search_playlists(
        &self,
        owner_id: PrimaryKey,
        name: &str,
    ) -> Result<Vec<PlaylistData>> {
        let mut playlists = self.playlists_by_owner(owner_id).await?;
        playlists.retain(|p| matches(&p.name, name));

        Ok(playlists)
    }

    async fn create_playlist(&self, new_playlist: NewPlaylist) -> Result<PlaylistData> {
        let mut state = self.state.lock();

        let _ = state.user(new_playlist.owner_id)?;

        if state
            .playlists
            .iter()
            .any(|p| p.owner_id == new_playlist.owner_id && p.name == new_playlist.name)
        {
            return Err(DatabaseError::Conflict {
                resource: "playlist",
                field: "name",
                value: new_playlist.name,
            });
        }

        let playlist = StoredPlaylist {
            id: state.assign_id(),
            public_id: new_playlist.public_id,
            name: new_playlist.name,
            owner_id: new_playlist.owner_id,
            songs: Vec::new(),
            updated_at: Utc::now(),
        };

        let data = state.playlist_data(&playlist)?;
        state.playlists.push(playlist);

        Ok(data)
    }

    async fn rename_playlist(&self, playlist_id: PrimaryKey, name: String) -> Result<PlaylistData> {
        let mut state = self.state.lock();

        let owner_id = state.playlist_mut(playlist_id)?.owner_id;

        if state
            .playlists
            .iter()
            .any(|p| p.id != playlist_id && p.owner_id == owner_id && p.name == name)
        {
            return Err(DatabaseError::Conflict {
                resource: "playlist",
                field: "name",
                value: name,
            });
        }

        let playlist = state.playlist_mut(playlist_id)?;
        playlist.name = name;
        playlist.updated_at = Utc::now();

        let playlist = state
            .playlists
            .iter()
            .find(|p| p.id == playlist_id)
            .expect("playlist exists after rename");

        state.playlist_data(playlist)
    }

    async fn delete_playlist(&self, playlist_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.playlists.len();

        state.playlists.retain(|p| p.id != playlist_id);

        if state.playlists.len() == before {
            return Err(DatabaseError::NotFound {
                resource: "playlist",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn add_playlist_song(
        &self,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<PlaylistData> {
        let mut state = self.state.lock();

        if !state.songs.iter().any(|s| s.id == song_id) {
            return Err(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            });
        }

        let playlist = state.playlist_mut(playlist_id)?;

        if playlist.songs.contains(&song_id) {
            return Err(DatabaseError::Conflict {
                resource: "playlist song",
                field: "song_id",
                value: song_id.to_string(),
            });
        }

        playlist.songs.push(song_id);
        playlist.updated_at = Utc::now();

        let playlist = state
            .playlists
            .iter()
            .find(|p| p.id == playlist_id)
            .expect("playlist exists after update");

        state.playlist_data(playlist)
    }

    async fn remove_playlist_song(
        &self,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<PlaylistData> {
        let mut state = self.state.lock();

        // Removing an absent member is not an error
        let playlist = state.playlist_mut(playlist_id)?;
        playlist.songs.retain(|id| *id != song_id);
        playlist.updated_at = Utc::now();

        let playlist = state
            .playlists
            .iter()
            .find(|p| p.id == playlist_id)
            .expect("playlist exists after update");

        state.playlist_data(playlist)
    }

    async fn move_playlist_song(
        &self,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
        to: PlaylistPosition,
    ) -> Result<PlaylistData> {
        let mut state = self.state.lock();

        let playlist = state.playlist_mut(playlist_id)?;

        let index = playlist
            .songs
            .iter()
            .position(|id| *id == song_id)
            .ok_or(DatabaseError::NotFound {
                resource: "playlist song",
                identifier: "song_id",
            })?;

        playlist.songs.remove(index);

        match to {
            PlaylistPosition::Top => playlist.songs.insert(0, song_id),
            PlaylistPosition::Bottom => playlist.songs.push(song_id),
        }

        playlist.updated_at = Utc::now();

        let playlist = state
            .playlists
            .iter()
            .find(|p| p.id == playlist_id)
            .expect("playlist exists after update");

        state.playlist_data(playlist)
    }

    async fn stream_by_user(&self, user_id: PrimaryKey) -> Result<StreamData> {
        let state = self.state.lock();

        let stream = state
            .streams
            .iter()
            .find(|s| s.user_id == user_id)
            .ok_or(DatabaseError::NotFound {
                resource: "stream",
                identifier: "user_id",
            })?;

        state.stream_data(stream)
    }

    async fn upsert_stream(&self, new_stream: NewStream) -> Result<StreamData> {
        let mut state = self.state.lock();

        let _ = state.user(new_stream.user_id)?;

        let exists = state
            .streams
            .iter()
            .any(|s| s.user_id == new_stream.user_id);

        if exists {
            let stream = state
                .streams
                .iter_mut()
                .find(|s| s.user_id == new_stream.user_id)
                .expect("stream exists");

            stream.title = new_stream.title;
            stream.description = new_stream.description;

            if let Some(thumbnail_url) = new_stream.thumbnail_url {
                stream.thumbnail_url = Some(thumbnail_url);
            }

            if let Some(ticket_price) = new_stream.ticket_price {
                stream.ticket_price = Some(ticket_price);
            }
        } else {
            let stream = StoredStream {
                id: state.assign_id(),
                user_id: new_stream.user_id,
                title: new_stream.title,
                description: new_stream.description,
                thumbnail_url: new_stream.thumbnail_url,
                ticket_price: new_stream.ticket_price,
                ingress_id: None,
                is_live: false,
            };

            state.streams.push(stream);
        }

        let stream = state
            .streams
            .iter()
            .find(|s| s.user_id == new_stream.user_id)
            .expect("stream exists after upsert");

        state.stream_data(stream)
    }

    async fn set_stream_ingress(
        &self,
        user_id: PrimaryKey,
        ingress_id: String,
    ) -> Result<StreamData> {
        let mut state = self.state.lock();

        let stream = state
            .streams
            .iter_mut()
            .find(|s| s.user_id == user_id)
            .ok_or(DatabaseError::NotFound {
                resource: "stream",
                identifier: "user_id",
            })?;

        stream.ingress_id = Some(ingress_id);

        let stream = state
            .streams
            .iter()
            .find(|s| s.user_id == user_id)
            .expect("stream exists after update");

        state.stream_data(stream)
    }

    async fn set_stream_live_by_ingress(
        &self,
        ingress_id: &str,
        is_live: bool,
    ) -> Result<StreamData> {
        let mut state = self.state.lock();

        let stream = state
            .streams
            .iter_mut()
            .find(|s| s.ingress_id.as_deref() == Some(ingress_id))
            .ok_or(DatabaseError::NotFound {
                resource: "stream",
                identifier: "ingress_id",
            })?;

        stream.is_live = is_live;
        let user_id = stream.user_id;

        let stream = state
            .streams
            .iter()
            .find(|s| s.user_id == user_id)
            .expect("stream exists after update");

        state.stream_data(stream)
    }

    async fn live_streams(&self) -> Result<Vec<StreamData>> {
        let state = self.state.lock();

        state
            .streams
            .iter()
            .filter(|s| s.is_live)
            .map(|s| state.stream_data(s))
            .collect()
    }
}
