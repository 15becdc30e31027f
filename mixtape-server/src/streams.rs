use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post},
    Json,
};
use mixtape_social::NewStreamSession;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    serialized::{Ingress, RoomToken, Stream, ToSerialized},
    upload::FormData,
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/streams/create",
    tag = "streams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Stream)
    )
)]
async fn create(
    session: Session,
    State(context): State<ServerContext>,
    multipart: Multipart,
) -> ServerResult<Json<Stream>> {
    let mut form = FormData::from_multipart(multipart).await?;

    let ticket_price = match form.optional_text("entryFee") {
        Some(raw) => Some(
            raw.parse::<i32>()
                .map_err(|_| ServerError::BadRequest("entryFee must be a number".to_string()))?,
        ),
        None => None,
    };

    let stream = context
        .social
        .streams
        .save_session(
            session.user().id,
            NewStreamSession {
                title: form.text("title")?,
                description: form.optional_text("description"),
                thumbnail: form.optional_file("thumbnail"),
                ticket_price,
            },
        )
        .await?;

    Ok(Json(stream.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/streams/live",
    tag = "streams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Stream>)
    )
)]
async fn live(
    _session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Stream>>> {
    let streams = context.social.streams.live().await?;

    Ok(Json(streams.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/streams/ingress",
    tag = "streams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Ingress)
    )
)]
async fn ingress(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Ingress>> {
    let ingress = context
        .social
        .streams
        .provision_ingress(session.user().id)
        .await?;

    Ok(Json(ingress.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/streams/token/{host_id}",
    tag = "streams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = RoomToken)
    )
)]
async fn room_token(
    session: Session,
    State(context): State<ServerContext>,
    Path(host_id): Path<i32>,
) -> ServerResult<Json<RoomToken>> {
    let token = context
        .social
        .streams
        .room_token(session.user().id, host_id)
        .await?;

    Ok(Json(token.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/create", post(create))
        .route("/live", get(live))
        .route("/ingress", post(ingress))
        .route("/token/:host_id", post(room_token))
}
