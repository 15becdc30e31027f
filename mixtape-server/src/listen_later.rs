use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    serialized::{Message, Song, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/listenlater",
    tag = "listen later",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Song>)
    )
)]
async fn listen_later_songs(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Song>>> {
    let songs = context
        .social
        .engagement
        .listen_later_songs(session.user().id)
        .await?;

    Ok(Json(songs.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/listenlater/add/{song_id}",
    tag = "listen later",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message)
    )
)]
async fn add(
    session: Session,
    State(context): State<ServerContext>,
    Path(song_id): Path<i32>,
) -> ServerResult<Json<Message>> {
    context
        .social
        .engagement
        .add_listen_later(session.user().id, song_id)
        .await?;

    Ok(Json(Message::new("Song added to listen later successfully")))
}

#[utoipa::path(
    delete,
    path = "/v1/listenlater/remove/{song_id}",
    tag = "listen later",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message)
    )
)]
async fn remove(
    session: Session,
    State(context): State<ServerContext>,
    Path(song_id): Path<i32>,
) -> ServerResult<Json<Message>> {
    context
        .social
        .engagement
        .remove_listen_later(session.user().id, song_id)
        .await?;

    Ok(Json(Message::new(
        "Song removed from listen later successfully",
    )))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(listen_later_songs))
        .route("/add/:song_id", post(add))
        .route("/remove/:song_id", delete(remove))
}
