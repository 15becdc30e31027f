use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Error as SqlxError, FromRow, PgPool};

use crate::{
    Database, DatabaseError, IntoDatabaseError, LikeToggleData, NewPlaylist, NewSession, NewSong,
    NewStream, NewUser, PlaylistData, PlaylistPosition, PrimaryKey, ProfileData, Result,
    SessionData, SongData, SongFilter, SongPage, StreamData, UpdatedSong, UpdatedUser, UserData,
};

/// The schema is embedded and applied statement by statement on connect.
const SCHEMA: &str = include_str!("schema.sql");

const USER_SELECT: &str = "
    SELECT id, username, email, password, display_name, avatar_url
    FROM users";

const SONG_SELECT: &str = "
    SELECT
        songs.id, songs.title, songs.album, songs.artist, songs.media_url,
        songs.thumbnail_url, songs.duration, songs.genres, songs.language,
        songs.published, songs.likes_count,
        users.id AS owner_id,
        users.username AS owner_username,
        users.email AS owner_email,
        users.password AS owner_password,
        users.display_name AS owner_display_name,
        users.avatar_url AS owner_avatar_url
    FROM songs
        INNER JOIN users ON users.id = songs.owner_id";

const STREAM_SELECT: &str = "
    SELECT
        streams.id, streams.title, streams.description, streams.thumbnail_url,
        streams.ticket_price, streams.ingress_id, streams.is_live,
        users.id AS host_id,
        users.username AS host_username,
        users.email AS host_email,
        users.password AS host_password,
        users.display_name AS host_display_name,
        users.avatar_url AS host_avatar_url
    FROM streams
        INNER JOIN users ON users.id = streams.user_id";

/// A postgres database implementation for mixtape
pub struct PgDatabase {
    pool: PgPool,
}

#[derive(FromRow)]
struct UserRow {
    id: PrimaryKey,
    username: String,
    email: String,
    password: String,
    display_name: String,
    avatar_url: Option<String>,
}

#[derive(FromRow)]
struct SessionRow {
    id: PrimaryKey,
    token: String,
    expires_at: DateTime<Utc>,
    user_id: PrimaryKey,
    username: String,
    email: String,
    password: String,
    display_name: String,
    avatar_url: Option<String>,
}

#[derive(FromRow)]
struct SongRow {
    id: PrimaryKey,
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
    owner_id: PrimaryKey,
    owner_username: String,
    owner_email: String,
    owner_password: String,
    owner_display_name: String,
    owner_avatar_url: Option<String>,
}

#[derive(FromRow)]
struct ProfileRow {
    id: PrimaryKey,
    username: String,
    email: String,
    password: String,
    display_name: String,
    avatar_url: Option<String>,
    follower_count: i64,
    following_count: i64,
    is_followed: bool,
}

#[derive(FromRow)]
struct PlaylistRow {
    id: PrimaryKey,
    public_id: String,
    name: String,
    owner_id: PrimaryKey,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct StreamRow {
    id: PrimaryKey,
    title: String,
    description: Option<String>,
    thumbnail_url: Option<String>,
    ticket_price: Option<i32>,
    ingress_id: Option<String>,
    is_live: bool,
    host_id: PrimaryKey,
    host_username: String,
    host_email: String,
    host_password: String,
    host_display_name: String,
    host_avatar_url: Option<String>,
}

impl From<UserRow> for UserData {
    fn from(row: UserRow) -> Self {
        UserData {
            id: row.id,
            username: row.username,
            email: row.email,
            password: row.password,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
        }
    }
}

impl From<SongRow> for SongData {
    fn from(row: SongRow) -> Self {
        SongData {
            id: row.id,
            title: row.title,
            album: row.album,
            artist: row.artist,
            media_url: row.media_url,
            thumbnail_url: row.thumbnail_url,
            duration: row.duration,
            genres: row.genres,
            language: row.language,
            published: row.published,
            likes_count: row.likes_count,
            owner: UserData {
                id: row.owner_id,
                username: row.owner_username,
                email: row.owner_email,
                password: row.owner_password,
                display_name: row.owner_display_name,
                avatar_url: row.owner_avatar_url,
            },
        }
    }
}

impl From<ProfileRow> for ProfileData {
    fn from(row: ProfileRow) -> Self {
        ProfileData {
            user: UserData {
                id: row.id,
                username: row.username,
                email: row.email,
                password: row.password,
                display_name: row.display_name,
                avatar_url: row.avatar_url,
            },
            follower_count: row.follower_count,
            following_count: row.following_count,
            is_followed: row.is_followed,
        }
    }
}

impl From<StreamRow> for StreamData {
    fn from(row: StreamRow) -> Self {
        StreamData {
            id: row.id,
            title: row.title,
            description: row.description,
            thumbnail_url: row.thumbnail_url,
            ticket_price: row.ticket_price,
            ingress_id: row.ingress_id,
            is_live: row.is_live,
            host: UserData {
                id: row.host_id,
                username: row.host_username,
                email: row.host_email,
                password: row.host_password,
                display_name: row.host_display_name,
                avatar_url: row.host_avatar_url,
            },
        }
    }
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        let database = Self { pool };
        database.migrate().await?;

        Ok(database)
    }

    /// Applies the embedded schema. Every statement is idempotent.
    async fn migrate(&self) -> Result<()> {
        let statements = SCHEMA.split(';').map(str::trim).filter(|chunk| {
            chunk.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            })
        });

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| e.any())?;
        }

        Ok(())
    }

    /// The songs of a playlist, in playlist order
    async fn playlist_songs(&self, playlist_id: PrimaryKey) -> Result<Vec<SongData>> {
        let query = format!(
            "{SONG_SELECT}
                INNER JOIN playlist_songs ON playlist_songs.song_id = songs.id
            WHERE playlist_songs.playlist_id = $1
            ORDER BY playlist_songs.position"
        );

        let rows = sqlx::query_as::<_, SongRow>(&query)
            .bind(playlist_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn assemble_playlist(&self, row: PlaylistRow) -> Result<PlaylistData> {
        let owner = self.user_by_id(row.owner_id).await?;
        let songs = self.playlist_songs(row.id).await?;

        Ok(PlaylistData {
            id: row.id,
            public_id: row.public_id,
            name: row.name,
            owner,
            songs,
            updated_at: row.updated_at,
        })
    }

    async fn assemble_playlists(&self, rows: Vec<PlaylistRow>) -> Result<Vec<PlaylistData>> {
        let mut playlists = Vec::with_capacity(rows.len());

        for row in rows {
            playlists.push(self.assemble_playlist(row).await?);
        }

        Ok(playlists)
    }

    /// Marks a playlist as updated, failing if it doesn't exist
    async fn touch_playlist<'a, E>(&self, executor: E, playlist_id: PrimaryKey) -> Result<()>
    where
        E: sqlx::PgExecutor<'a>,
    {
        let result = sqlx::query("UPDATE playlists SET updated_at = now() WHERE id = $1")
            .bind(playlist_id)
            .execute(executor)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "playlist",
                identifier: "id",
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        let query = format!("{USER_SELECT} WHERE id = $1");

        sqlx::query_as::<_, UserRow>(&query)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        let query = format!("{USER_SELECT} WHERE lower(username) = lower($1)");

        sqlx::query_as::<_, UserRow>(&query)
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("user", "username"))
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        let query = format!("{USER_SELECT} WHERE lower(email) = lower($1)");

        sqlx::query_as::<_, UserRow>(&query)
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("user", "email"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (username, email, password, display_name, avatar_url)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, username, email, password, display_name, avatar_url",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password)
        .bind(&new_user.display_name)
        .bind(&new_user.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| {
            if let Some(db_error) = e.as_database_error() {
                if db_error.is_unique_violation() {
                    let (field, value) = if db_error.constraint() == Some("users_email_key") {
                        ("email", new_user.email.clone())
                    } else {
                        ("username", new_user.username.clone())
                    };

                    return DatabaseError::Conflict {
                        resource: "user",
                        field,
                        value,
                    };
                }
            }

            e.any()
        })
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        let user = self.user_by_id(updated_user.id).await?;

        let email = updated_user.email.unwrap_or(user.email);

        sqlx::query(
            "UPDATE users SET
                display_name = $1,
                email = $2,
                avatar_url = $3
            WHERE id = $4",
        )
        .bind(updated_user.display_name.unwrap_or(user.display_name))
        .bind(&email)
        .bind(updated_user.avatar_url.or(user.avatar_url))
        .bind(updated_user.id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.conflict_or("user", "email", &email))?;

        self.user_by_id(updated_user.id).await
    }

    async fn update_user_password(&self, user_id: PrimaryKey, password: String) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(password)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT
                sessions.id, sessions.token, sessions.expires_at,
                users.id AS user_id,
                users.username, users.email, users.password,
                users.display_name, users.avatar_url
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
            WHERE token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "token"))?;

        Ok(SessionData {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user: UserData {
                id: row.user_id,
                username: row.username,
                email: row.email,
                password: row.password,
                display_name: row.display_name,
                avatar_url: row.avatar_url,
            },
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let token: String = sqlx::query_scalar(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3) RETURNING token",
        )
        .bind(&new_session.token)
        .bind(new_session.user_id)
        .bind(new_session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or("session", "token", &new_session.token))?;

        self.session_by_token(&token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            });
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE timezone('UTC', now()) > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn song_by_id(&self, song_id: PrimaryKey) -> Result<SongData> {
        let query = format!("{SONG_SELECT} WHERE songs.id = $1");

        sqlx::query_as::<_, SongRow>(&query)
            .bind(song_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("song", "id"))
    }

    async fn create_song(&self, new_song: NewSong) -> Result<SongData> {
        let song_id: PrimaryKey = sqlx::query_scalar(
            "INSERT INTO songs
                (title, album, artist, owner_id, media_url, thumbnail_url, duration, genres, language)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING id",
        )
        .bind(&new_song.title)
        .bind(&new_song.album)
        .bind(&new_song.artist)
        .bind(new_song.owner_id)
        .bind(&new_song.media_url)
        .bind(&new_song.thumbnail_url)
        .bind(new_song.duration)
        .bind(&new_song.genres)
        .bind(&new_song.language)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.song_by_id(song_id).await
    }

    async fn update_song(&self, updated_song: UpdatedSong) -> Result<SongData> {
        let song = self.song_by_id(updated_song.id).await?;

        sqlx::query(
            "UPDATE songs SET
                title = $1,
                album = $2,
                thumbnail_url = $3
            WHERE id = $4",
        )
        .bind(updated_song.title.unwrap_or(song.title))
        .bind(updated_song.album.unwrap_or(song.album))
        .bind(updated_song.thumbnail_url.or(song.thumbnail_url))
        .bind(updated_song.id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.song_by_id(updated_song.id).await
    }

    async fn set_song_published(&self, song_id: PrimaryKey, published: bool) -> Result<SongData> {
        let result = sqlx::query("UPDATE songs SET published = $1 WHERE id = $2")
            .bind(published)
            .bind(song_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            });
        }

        self.song_by_id(song_id).await
    }

    async fn delete_song(&self, song_id: PrimaryKey) -> Result<()> {
        let result = sqlx::query("DELETE FROM songs WHERE id = $1")
            .bind(song_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn list_songs(&self, offset: i64, limit: i64) -> Result<SongPage> {
        let query = format!(
            "{SONG_SELECT} ORDER BY songs.likes_count DESC, songs.id OFFSET $1 LIMIT $2"
        );

        let rows = sqlx::query_as::<_, SongRow>(&query)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(SongPage {
            songs: rows.into_iter().map(Into::into).collect(),
            total,
        })
    }

    async fn songs_by_filter(&self, filter: SongFilter) -> Result<Vec<SongData>> {
        let rows = match filter {
            SongFilter::Title(title) => {
                let query =
                    format!("{SONG_SELECT} WHERE songs.title ILIKE '%' || $1 || '%' ORDER BY songs.id");

                sqlx::query_as::<_, SongRow>(&query)
                    .bind(title)
                    .fetch_all(&self.pool)
                    .await
            }
            SongFilter::Genre(genre) => {
                let query = format!("{SONG_SELECT} WHERE $1 = ANY(songs.genres) ORDER BY songs.id");

                sqlx::query_as::<_, SongRow>(&query)
                    .bind(genre)
                    .fetch_all(&self.pool)
                    .await
            }
            SongFilter::Language(language) => {
                let query = format!("{SONG_SELECT} WHERE songs.language = $1 ORDER BY songs.id");

                sqlx::query_as::<_, SongRow>(&query)
                    .bind(language)
                    .fetch_all(&self.pool)
                    .await
            }
            SongFilter::Album(album) => {
                let query = format!("{SONG_SELECT} WHERE songs.album = $1 ORDER BY songs.id");

                sqlx::query_as::<_, SongRow>(&query)
                    .bind(album)
                    .fetch_all(&self.pool)
                    .await
            }
            SongFilter::Artist(artist) => {
                let query = format!("{SONG_SELECT} WHERE songs.artist = $1 ORDER BY songs.id");

                sqlx::query_as::<_, SongRow>(&query)
                    .bind(artist)
                    .fetch_all(&self.pool)
                    .await
            }
            SongFilter::Owner(owner_id) => {
                let query = format!("{SONG_SELECT} WHERE songs.owner_id = $1 ORDER BY songs.id");

                sqlx::query_as::<_, SongRow>(&query)
                    .bind(owner_id)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn search_songs(&self, query: &str, limit: i64) -> Result<Vec<SongData>> {
        let statement = format!(
            "{SONG_SELECT}
            WHERE songs.title ILIKE '%' || $1 || '%'
                OR songs.artist ILIKE '%' || $1 || '%'
                OR songs.album ILIKE '%' || $1 || '%'
                OR songs.language ILIKE '%' || $1 || '%'
                OR EXISTS (
                    SELECT 1 FROM unnest(songs.genres) AS genre
                    WHERE genre ILIKE '%' || $1 || '%'
                )
            ORDER BY songs.likes_count DESC, songs.id
            LIMIT $2"
        );

        let rows = sqlx::query_as::<_, SongRow>(&statement)
            .bind(query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn toggle_like(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<LikeToggleData> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let deleted = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND song_id = $2")
            .bind(user_id)
            .bind(song_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?
            .rows_affected();

        let (liked, delta) = if deleted > 0 {
            (false, -1)
        } else {
            let inserted = sqlx::query(
                "INSERT INTO likes (user_id, song_id) VALUES ($1, $2)
                 ON CONFLICT (user_id, song_id) DO NOTHING",
            )
            .bind(user_id)
            .bind(song_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let Some(db_error) = e.as_database_error() {
                    if db_error.is_foreign_key_violation() {
                        return DatabaseError::NotFound {
                            resource: "song",
                            identifier: "id",
                        };
                    }
                }

                e.any()
            })?
            .rows_affected();

            // Zero inserted rows means a concurrent toggle already created the
            // edge, in which case the counter must not move.
            (true, inserted as i64)
        };

        let likes_count: i64 = if delta == 0 {
            sqlx::query_scalar("SELECT likes_count FROM songs WHERE id = $1")
                .bind(song_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| e.not_found_or("song", "id"))?
        } else {
            sqlx::query_scalar(
                "UPDATE songs SET likes_count = likes_count + $1 WHERE id = $2 RETURNING likes_count",
            )
            .bind(delta)
            .bind(song_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| e.not_found_or("song", "id"))?
        };

        tx.commit().await.map_err(|e| e.any())?;

        Ok(LikeToggleData { liked, likes_count })
    }

    async fn liked_songs(&self, user_id: PrimaryKey) -> Result<Vec<SongData>> {
        let query = format!(
            "{SONG_SELECT}
                INNER JOIN likes ON likes.song_id = songs.id
            WHERE likes.user_id = $1
            ORDER BY likes.created_at DESC"
        );

        let rows = sqlx::query_as::<_, SongRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_likes(&self, song_id: PrimaryKey) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE song_id = $1")
            .bind(song_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn recount_song_likes(&self, song_id: PrimaryKey) -> Result<i64> {
        sqlx::query_scalar(
            "UPDATE songs
             SET likes_count = (SELECT COUNT(*) FROM likes WHERE song_id = $1)
             WHERE id = $1
             RETURNING likes_count",
        )
        .bind(song_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("song", "id"))
    }

    async fn create_listen_later(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<()> {
        sqlx::query("INSERT INTO listen_later (user_id, song_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(song_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let Some(db_error) = e.as_database_error() {
                    if db_error.is_foreign_key_violation() {
                        return DatabaseError::NotFound {
                            resource: "song",
                            identifier: "id",
                        };
                    }
                }

                e.conflict_or("listen later entry", "song_id", &song_id.to_string())
            })
            .map(|_| ())
    }

    async fn delete_listen_later(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<()> {
        let result = sqlx::query("DELETE FROM listen_later WHERE user_id = $1 AND song_id = $2")
            .bind(user_id)
            .bind(song_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "listen later entry",
                identifier: "song_id",
            });
        }

        Ok(())
    }

    async fn listen_later_songs(&self, user_id: PrimaryKey) -> Result<Vec<SongData>> {
        let query = format!(
            "{SONG_SELECT}
                INNER JOIN listen_later ON listen_later.song_id = songs.id
            WHERE listen_later.user_id = $1
            ORDER BY listen_later.created_at DESC"
        );

        let rows = sqlx::query_as::<_, SongRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_follow(&self, follower_id: PrimaryKey, followee_id: PrimaryKey) -> Result<()> {
        sqlx::query("INSERT INTO follows (follower_id, followee_id) VALUES ($1, $2)")
            .bind(follower_id)
            .bind(followee_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let Some(db_error) = e.as_database_error() {
                    if db_error.is_foreign_key_violation() {
                        return DatabaseError::NotFound {
                            resource: "user",
                            identifier: "id",
                        };
                    }
                }

                e.conflict_or(
                    "follow",
                    "follower:followee",
                    &format!("{}:{}", follower_id, followee_id),
                )
            })
            .map(|_| ())
    }

    async fn delete_follow(&self, follower_id: PrimaryKey, followee_id: PrimaryKey) -> Result<()> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower_id)
            .bind(followee_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
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
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn followers_of(&self, user_id: PrimaryKey) -> Result<Vec<UserData>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT users.id, users.username, users.email, users.password,
                    users.display_name, users.avatar_url
             FROM users
                INNER JOIN follows ON follows.follower_id = users.id
             WHERE follows.followee_id = $1
             ORDER BY follows.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn following_of(&self, user_id: PrimaryKey) -> Result<Vec<UserData>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT users.id, users.username, users.email, users.password,
                    users.display_name, users.avatar_url
             FROM users
                INNER JOIN follows ON follows.followee_id = users.id
             WHERE follows.follower_id = $1
             ORDER BY follows.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn profile_by_username(
        &self,
        username: &str,
        viewer_id: Option<PrimaryKey>,
    ) -> Result<ProfileData> {
        sqlx::query_as::<_, ProfileRow>(
            "SELECT
                users.id, users.username, users.email, users.password,
                users.display_name, users.avatar_url,
                (SELECT COUNT(*) FROM follows WHERE followee_id = users.id) AS follower_count,
                (SELECT COUNT(*) FROM follows WHERE follower_id = users.id) AS following_count,
                EXISTS(
                    SELECT 1 FROM follows
                    WHERE followee_id = users.id AND follower_id = $2
                ) AS is_followed
            FROM users
            WHERE lower(username) = lower($1)",
        )
        .bind(username)
        .bind(viewer_id)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("channel", "username"))
    }

    async fn search_profiles(
        &self,
        query: &str,
        viewer_id: Option<PrimaryKey>,
        limit: i64,
    ) -> Result<Vec<ProfileData>> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            "SELECT
                users.id, users.username, users.email, users.password,
                users.display_name, users.avatar_url,
                (SELECT COUNT(*) FROM follows WHERE followee_id = users.id) AS follower_count,
                (SELECT COUNT(*) FROM follows WHERE follower_id = users.id) AS following_count,
                EXISTS(
                    SELECT 1 FROM follows
                    WHERE followee_id = users.id AND follower_id = $2
                ) AS is_followed
            FROM users
            WHERE users.username ILIKE '%' || $1 || '%'
                OR users.display_name ILIKE '%' || $1 || '%'
            ORDER BY users.id
            LIMIT $3",
        )
        .bind(query)
        .bind(viewer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn playlist_by_id(&self, playlist_id: PrimaryKey) -> Result<PlaylistData> {
        let row = sqlx::query_as::<_, PlaylistRow>(
            "SELECT id, public_id, name, owner_id, updated_at FROM playlists WHERE id = $1",
        )
        .bind(playlist_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("playlist", "id"))?;

        self.assemble_playlist(row).await
    }

    async fn playlists_by_owner(&self, owner_id: PrimaryKey) -> Result<Vec<PlaylistData>> {
        let rows = sqlx::query_as::<_, PlaylistRow>(
            "SELECT id, public_id, name, owner_id, updated_at
             FROM playlists
             WHERE owner_id = $1
             ORDER BY updated_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.assemble_playlists(rows).await
    }

    async fn latest_playlists(
        &self,
        owner_id: PrimaryKey,
        limit: i64,
    ) -> Result<Vec<PlaylistData>> {
        let rows = sqlx::query_as::<_, PlaylistRow>(
            "SELECT id, public_id, name, owner_id, updated_at
             FROM playlists
             WHERE owner_id = $1
             ORDER BY updated_at DESC
             LIMIT $2",
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.assemble_playlists(rows).await
    }

    async fn search_playlists(
        &self,
        owner_id: PrimaryKey,
        name: &str,
    ) -> Result<Vec<PlaylistData>> {
        let rows = sqlx::query_as::<_, PlaylistRow>(
            "SELECT id, public_id, name, owner_id, updated_at
             FROM playlists
             WHERE owner_id = $1 AND name ILIKE '%' || $2 || '%'
             ORDER BY updated_at DESC",
        )
        .bind(owner_id)
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.assemble_playlists(rows).await
    }

    async fn create_playlist(&self, new_playlist: NewPlaylist) -> Result<PlaylistData> {
        let playlist_id: PrimaryKey = sqlx::query_scalar(
            "INSERT INTO playlists (name, public_id, owner_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&new_playlist.name)
        .bind(&new_playlist.public_id)
        .bind(new_playlist.owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or("playlist", "name", &new_playlist.name))?;

        self.playlist_by_id(playlist_id).await
    }

    async fn rename_playlist(&self, playlist_id: PrimaryKey, name: String) -> Result<PlaylistData> {
        let result =
            sqlx::query("UPDATE playlists SET name = $1, updated_at = now() WHERE id = $2")
                .bind(&name)
                .bind(playlist_id)
                .execute(&self.pool)
                .await
                .map_err(|e| e.conflict_or("playlist", "name", &name))?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "playlist",
                identifier: "id",
            });
        }

        self.playlist_by_id(playlist_id).await
    }

    async fn delete_playlist(&self, playlist_id: PrimaryKey) -> Result<()> {
        let result = sqlx::query("DELETE FROM playlists WHERE id = $1")
            .bind(playlist_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
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
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        sqlx::query(
            "INSERT INTO playlist_songs (playlist_id, song_id, position)
             SELECT $1, $2, COALESCE(MAX(position) + 1, 0)
             FROM playlist_songs WHERE playlist_id = $1",
        )
        .bind(playlist_id)
        .bind(song_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let Some(db_error) = e.as_database_error() {
                if db_error.is_foreign_key_violation() {
                    let resource = if db_error.constraint() == Some("playlist_songs_song_id_fkey")
                    {
                        "song"
                    } else {
                        "playlist"
                    };

                    return DatabaseError::NotFound {
                        resource,
                        identifier: "id",
                    };
                }
            }

            e.conflict_or("playlist song", "song_id", &song_id.to_string())
        })?;

        self.touch_playlist(&mut *tx, playlist_id).await?;
        tx.commit().await.map_err(|e| e.any())?;

        self.playlist_by_id(playlist_id).await
    }

    async fn remove_playlist_song(
        &self,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<PlaylistData> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let position: Option<i32> = sqlx::query_scalar(
            "SELECT position FROM playlist_songs WHERE playlist_id = $1 AND song_id = $2",
        )
        .bind(playlist_id)
        .bind(song_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        // Removing an absent member is not an error
        if let Some(position) = position {
            sqlx::query("DELETE FROM playlist_songs WHERE playlist_id = $1 AND song_id = $2")
                .bind(playlist_id)
                .bind(song_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;

            sqlx::query(
                "UPDATE playlist_songs SET position = position - 1
                 WHERE playlist_id = $1 AND position > $2",
            )
            .bind(playlist_id)
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;
        }

        self.touch_playlist(&mut *tx, playlist_id).await?;
        tx.commit().await.map_err(|e| e.any())?;

        self.playlist_by_id(playlist_id).await
    }

    async fn move_playlist_song(
        &self,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
        to: PlaylistPosition,
    ) -> Result<PlaylistData> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let position: i32 = sqlx::query_scalar(
            "SELECT position FROM playlist_songs WHERE playlist_id = $1 AND song_id = $2",
        )
        .bind(playlist_id)
        .bind(song_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.not_found_or("playlist song", "song_id"))?;

        match to {
            PlaylistPosition::Top => {
                sqlx::query(
                    "UPDATE playlist_songs SET position = position + 1
                     WHERE playlist_id = $1 AND position < $2",
                )
                .bind(playlist_id)
                .bind(position)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;

                sqlx::query(
                    "UPDATE playlist_songs SET position = 0
                     WHERE playlist_id = $1 AND song_id = $2",
                )
                .bind(playlist_id)
                .bind(song_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;
            }
            PlaylistPosition::Bottom => {
                let last: i32 = sqlx::query_scalar(
                    "SELECT MAX(position) FROM playlist_songs WHERE playlist_id = $1",
                )
                .bind(playlist_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| e.any())?;

                sqlx::query(
                    "UPDATE playlist_songs SET position = position - 1
                     WHERE playlist_id = $1 AND position > $2",
                )
                .bind(playlist_id)
                .bind(position)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;

                sqlx::query(
                    "UPDATE playlist_songs SET position = $3
                     WHERE playlist_id = $1 AND song_id = $2",
                )
                .bind(playlist_id)
                .bind(song_id)
                .bind(last)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;
            }
        }

        self.touch_playlist(&mut *tx, playlist_id).await?;
        tx.commit().await.map_err(|e| e.any())?;

        self.playlist_by_id(playlist_id).await
    }

    async fn stream_by_user(&self, user_id: PrimaryKey) -> Result<StreamData> {
        let query = format!("{STREAM_SELECT} WHERE streams.user_id = $1");

        sqlx::query_as::<_, StreamRow>(&query)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("stream", "user_id"))
    }

    async fn upsert_stream(&self, new_stream: NewStream) -> Result<StreamData> {
        sqlx::query(
            "INSERT INTO streams (user_id, title, description, thumbnail_url, ticket_price)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                thumbnail_url = COALESCE(EXCLUDED.thumbnail_url, streams.thumbnail_url),
                ticket_price = COALESCE(EXCLUDED.ticket_price, streams.ticket_price)",
        )
        .bind(new_stream.user_id)
        .bind(&new_stream.title)
        .bind(&new_stream.description)
        .bind(&new_stream.thumbnail_url)
        .bind(new_stream.ticket_price)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_error) = e.as_database_error() {
                if db_error.is_foreign_key_violation() {
                    return DatabaseError::NotFound {
                        resource: "user",
                        identifier: "id",
                    };
                }
            }

            e.any()
        })?;

        self.stream_by_user(new_stream.user_id).await
    }

    async fn set_stream_ingress(
        &self,
        user_id: PrimaryKey,
        ingress_id: String,
    ) -> Result<StreamData> {
        let result = sqlx::query("UPDATE streams SET ingress_id = $1 WHERE user_id = $2")
            .bind(&ingress_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "stream",
                identifier: "user_id",
            });
        }

        self.stream_by_user(user_id).await
    }

    async fn set_stream_live_by_ingress(
        &self,
        ingress_id: &str,
        is_live: bool,
    ) -> Result<StreamData> {
        let user_id: PrimaryKey = sqlx::query_scalar(
            "UPDATE streams SET is_live = $1 WHERE ingress_id = $2 RETURNING user_id",
        )
        .bind(is_live)
        .bind(ingress_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("stream", "ingress_id"))?;

        self.stream_by_user(user_id).await
    }

    async fn live_streams(&self) -> Result<Vec<StreamData>> {
        let query = format!("{STREAM_SELECT} WHERE streams.is_live = true ORDER BY streams.id");

        let rows = sqlx::query_as::<_, StreamRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }

    fn conflict_or(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DatabaseError {
        if let Some(db_error) = self.as_database_error() {
            if db_error.is_unique_violation() {
                return DatabaseError::Conflict {
                    resource,
                    field,
                    value: value.to_string(),
                };
            }
        }

        Self::any(self)
    }
}
