use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    serialized::{LikeToggle, Song, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/likedsongs",
    tag = "likes",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Song>)
    )
)]
async fn liked_songs(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Song>>> {
    let songs = context
        .social
        .engagement
        .liked_songs(session.user().id)
        .await?;

    Ok(Json(songs.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/likedsongs/toggle-like/{song_id}",
    tag = "likes",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = LikeToggle)
    )
)]
async fn toggle_like(
    session: Session,
    State(context): State<ServerContext>,
    Path(song_id): Path<i32>,
) -> ServerResult<Json<LikeToggle>> {
    let toggle = context
        .social
        .engagement
        .toggle_like(session.user().id, song_id)
        .await?;

    Ok(Json(toggle.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(liked_songs))
        .route("/toggle-like/:song_id", post(toggle_like))
}
