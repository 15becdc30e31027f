use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch, post},
    Json,
};
use mixtape_social::PlaylistPosition;
use serde::Deserialize;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewPlaylistSchema, RenamePlaylistSchema, ValidatedJson},
    serialized::{Message, Playlist, ToSerialized},
    Router,
};

#[derive(Debug, Deserialize)]
struct NameQuery {
    name: String,
}

#[utoipa::path(
    get,
    path = "/v1/playlists",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Playlist>)
    )
)]
async fn list(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Playlist>>> {
    let playlists = context.social.playlists.by_owner(session.user().id).await?;

    Ok(Json(playlists.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/playlists/create",
    tag = "playlists",
    request_body = NewPlaylistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist)
    )
)]
async fn create(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewPlaylistSchema>,
) -> ServerResult<Json<Playlist>> {
    let playlist = context
        .social
        .playlists
        .create(session.user().id, body.name)
        .await?;

    Ok(Json(playlist.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/playlists/user/{playlist_id}",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist)
    )
)]
async fn playlist_by_id(
    _session: Session,
    State(context): State<ServerContext>,
    Path(playlist_id): Path<i32>,
) -> ServerResult<Json<Playlist>> {
    let playlist = context.social.playlists.playlist_by_id(playlist_id).await?;

    Ok(Json(playlist.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/playlists/add/{playlist_id}/{song_id}",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist)
    )
)]
async fn add_song(
    session: Session,
    State(context): State<ServerContext>,
    Path((playlist_id, song_id)): Path<(i32, i32)>,
) -> ServerResult<Json<Playlist>> {
    let playlist = context
        .social
        .playlists
        .add_song(session.user().id, playlist_id, song_id)
        .await?;

    Ok(Json(playlist.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/playlists/remove/{playlist_id}/{song_id}",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist)
    )
)]
async fn remove_song(
    session: Session,
    State(context): State<ServerContext>,
    Path((playlist_id, song_id)): Path<(i32, i32)>,
) -> ServerResult<Json<Playlist>> {
    let playlist = context
        .social
        .playlists
        .remove_song(session.user().id, playlist_id, song_id)
        .await?;

    Ok(Json(playlist.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/playlists/update/{playlist_id}",
    tag = "playlists",
    request_body = RenamePlaylistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist)
    )
)]
async fn rename(
    session: Session,
    State(context): State<ServerContext>,
    Path(playlist_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<RenamePlaylistSchema>,
) -> ServerResult<Json<Playlist>> {
    let playlist = context
        .social
        .playlists
        .rename(session.user().id, playlist_id, body.name)
        .await?;

    Ok(Json(playlist.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/playlists/delete/{playlist_id}",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message)
    )
)]
async fn delete_playlist(
    session: Session,
    State(context): State<ServerContext>,
    Path(playlist_id): Path<i32>,
) -> ServerResult<Json<Message>> {
    context
        .social
        .playlists
        .delete(session.user().id, playlist_id)
        .await?;

    Ok(Json(Message::new("Playlist was removed")))
}

#[utoipa::path(
    patch,
    path = "/v1/playlists/move-to-top/{playlist_id}/{song_id}",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist)
    )
)]
async fn move_to_top(
    session: Session,
    State(context): State<ServerContext>,
    Path((playlist_id, song_id)): Path<(i32, i32)>,
) -> ServerResult<Json<Playlist>> {
    let playlist = context
        .social
        .playlists
        .move_song(
            session.user().id,
            playlist_id,
            song_id,
            PlaylistPosition::Top,
        )
        .await?;

    Ok(Json(playlist.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/playlists/move-to-bottom/{playlist_id}/{song_id}",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist)
    )
)]
async fn move_to_bottom(
    session: Session,
    State(context): State<ServerContext>,
    Path((playlist_id, song_id)): Path<(i32, i32)>,
) -> ServerResult<Json<Playlist>> {
    let playlist = context
        .social
        .playlists
        .move_song(
            session.user().id,
            playlist_id,
            song_id,
            PlaylistPosition::Bottom,
        )
        .await?;

    Ok(Json(playlist.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/playlists/latest",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Playlist>)
    )
)]
async fn latest(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Playlist>>> {
    let playlists = context.social.playlists.latest(session.user().id).await?;

    Ok(Json(playlists.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/playlists/search",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Playlist>)
    )
)]
async fn search(
    session: Session,
    State(context): State<ServerContext>,
    Query(params): Query<NameQuery>,
) -> ServerResult<Json<Vec<Playlist>>> {
    let playlists = context
        .social
        .playlists
        .search(session.user().id, &params.name)
        .await?;

    Ok(Json(playlists.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/create", post(create))
        .route("/user/:playlist_id", get(playlist_by_id))
        .route("/add/:playlist_id/:song_id", post(add_song))
        .route("/remove/:playlist_id/:song_id", delete(remove_song))
        .route("/update/:playlist_id", patch(rename))
        .route("/delete/:playlist_id", delete(delete_playlist))
        .route("/move-to-top/:playlist_id/:song_id", patch(move_to_top))
        .route(
            "/move-to-bottom/:playlist_id/:song_id",
            patch(move_to_bottom),
        )
        .route("/latest", get(latest))
        .route("/search", get(search))
}
