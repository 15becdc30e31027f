use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{delete, get, patch, post},
    Json,
};
use mixtape_social::{NewSongUpload, SongData, UpdatedSongUpload};
use serde::Deserialize;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    serialized::{Message, SearchResults, Song, SongPage, ToSerialized},
    upload::FormData,
    Router,
};

#[derive(Debug, Deserialize)]
struct SearchQuery {
    query: String,
}

/// Maps an empty filter result to a not-found failure
fn not_empty(songs: Vec<SongData>) -> ServerResult<Json<Vec<Song>>> {
    if songs.is_empty() {
        return Err(ServerError::NotFound {
            resource: "songs",
            identifier: "filter",
        });
    }

    Ok(Json(songs.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/songs/{page}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = SongPage)
    )
)]
async fn list(
    _session: Session,
    State(context): State<ServerContext>,
    Path(page): Path<i64>,
) -> ServerResult<Json<SongPage>> {
    let page = context.social.catalog.page(page).await?;

    Ok(Json(page.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/songs/add-song",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Song)
    )
)]
async fn add_song(
    session: Session,
    State(context): State<ServerContext>,
    multipart: Multipart,
) -> ServerResult<Json<Song>> {
    let mut form = FormData::from_multipart(multipart).await?;

    // The genre field carries a JSON array of strings
    let genres = match form.optional_text("genre") {
        Some(raw) => serde_json::from_str::<Vec<String>>(&raw)
            .map_err(|_| ServerError::BadRequest("genre must be a JSON string array".to_string()))?,
        None => Vec::new(),
    };

    let upload = NewSongUpload {
        title: form.text("title")?,
        album: form.text("album")?,
        artist: form.optional_text("artist"),
        genres,
        language: form.text("language")?,
        media: form.file("songUrl")?,
        thumbnail: form.optional_file("thumbnailUrl"),
    };

    let song = context
        .social
        .catalog
        .publish(session.user().id, upload)
        .await?;

    Ok(Json(song.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/songs/songid/{song_id}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Song)
    )
)]
async fn song_by_id(
    _session: Session,
    State(context): State<ServerContext>,
    Path(song_id): Path<i32>,
) -> ServerResult<Json<Song>> {
    let song = context.social.catalog.song_by_id(song_id).await?;

    Ok(Json(song.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/songs/s/{name}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Song>)
    )
)]
async fn by_name(
    _session: Session,
    State(context): State<ServerContext>,
    Path(name): Path<String>,
) -> ServerResult<Json<Vec<Song>>> {
    not_empty(context.social.catalog.by_title(&name).await?)
}

#[utoipa::path(
    get,
    path = "/v1/songs/search",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = SearchResults)
    )
)]
async fn search(
    session: Session,
    State(context): State<ServerContext>,
    Query(params): Query<SearchQuery>,
) -> ServerResult<Json<SearchResults>> {
    let results = context
        .social
        .catalog
        .search(&params.query, Some(session.user().id))
        .await?;

    Ok(Json(results.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/songs/type/{genre}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Song>)
    )
)]
async fn by_genre(
    _session: Session,
    State(context): State<ServerContext>,
    Path(genre): Path<String>,
) -> ServerResult<Json<Vec<Song>>> {
    not_empty(context.social.catalog.by_genre(&genre).await?)
}

#[utoipa::path(
    get,
    path = "/v1/songs/language/{language}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Song>)
    )
)]
async fn by_language(
    _session: Session,
    State(context): State<ServerContext>,
    Path(language): Path<String>,
) -> ServerResult<Json<Vec<Song>>> {
    not_empty(context.social.catalog.by_language(&language).await?)
}

#[utoipa::path(
    get,
    path = "/v1/songs/album/{album}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Song>)
    )
)]
async fn by_album(
    _session: Session,
    State(context): State<ServerContext>,
    Path(album): Path<String>,
) -> ServerResult<Json<Vec<Song>>> {
    not_empty(context.social.catalog.by_album(&album).await?)
}

#[utoipa::path(
    get,
    path = "/v1/songs/artist/{artist}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Song>)
    )
)]
async fn by_artist(
    _session: Session,
    State(context): State<ServerContext>,
    Path(artist): Path<String>,
) -> ServerResult<Json<Vec<Song>>> {
    not_empty(context.social.catalog.by_artist(&artist).await?)
}

#[utoipa::path(
    get,
    path = "/v1/songs/owner/{username}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Song>)
    )
)]
async fn by_owner(
    _session: Session,
    State(context): State<ServerContext>,
    Path(username): Path<String>,
) -> ServerResult<Json<Vec<Song>>> {
    not_empty(context.social.catalog.by_owner(&username).await?)
}

#[utoipa::path(
    get,
    path = "/v1/songs/popular/{page}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = SongPage)
    )
)]
async fn popular(
    _session: Session,
    State(context): State<ServerContext>,
    Path(page): Path<i64>,
) -> ServerResult<Json<SongPage>> {
    let page = context.social.catalog.popular(page).await?;

    Ok(Json(page.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/songs/update-song/{song_id}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Song)
    )
)]
async fn update_song(
    session: Session,
    State(context): State<ServerContext>,
    Path(song_id): Path<i32>,
    multipart: Multipart,
) -> ServerResult<Json<Song>> {
    let mut form = FormData::from_multipart(multipart).await?;

    let update = UpdatedSongUpload {
        song_id,
        title: form.optional_text("title"),
        album: form.optional_text("album"),
        thumbnail: form.optional_file("thumbnailUrl"),
    };

    let song = context
        .social
        .catalog
        .update(session.user().id, update)
        .await?;

    Ok(Json(song.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/songs/delete/songid/{song_id}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message)
    )
)]
async fn delete_song(
    session: Session,
    State(context): State<ServerContext>,
    Path(song_id): Path<i32>,
) -> ServerResult<Json<Message>> {
    context
        .social
        .catalog
        .delete(session.user().id, song_id)
        .await?;

    Ok(Json(Message::new("Song deleted successfully")))
}

#[utoipa::path(
    patch,
    path = "/v1/songs/publish-status/{song_id}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Song)
    )
)]
async fn toggle_publish(
    session: Session,
    State(context): State<ServerContext>,
    Path(song_id): Path<i32>,
) -> ServerResult<Json<Song>> {
    let song = context
        .social
        .catalog
        .toggle_publish(session.user().id, song_id)
        .await?;

    Ok(Json(song.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/type/:genre", get(by_genre))
        .route("/popular/:page", get(popular))
        .route("/language/:language", get(by_language))
        .route("/album/:album", get(by_album))
        .route("/artist/:artist", get(by_artist))
        .route("/owner/:username", get(by_owner))
        .route("/:page", get(list))
        .route("/add-song", post(add_song))
        .route("/songid/:song_id", get(song_by_id))
        .route("/s/:name", get(by_name))
        .route("/update-song/:song_id", patch(update_song))
        .route("/delete/songid/:song_id", delete(delete_song))
        .route("/publish-status/:song_id", patch(toggle_publish))
}
