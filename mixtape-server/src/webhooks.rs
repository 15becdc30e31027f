use axum::{
    extract::State,
    http::{header, HeaderMap},
    routing::post,
    Json,
};

use crate::{
    context::ServerContext,
    errors::ServerResult,
    serialized::Message,
    Router,
};

/// Status webhooks pushed by the stream control plane. Verification is
/// the control plane boundary's job, this route just hands the raw body
/// and credential over.
#[utoipa::path(
    post,
    path = "/v1/webhooks/stream",
    tag = "webhooks",
    responses(
        (status = 200, body = Message)
    )
)]
async fn stream_status(
    State(context): State<ServerContext>,
    headers: HeaderMap,
    body: String,
) -> ServerResult<Json<Message>> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    context
        .social
        .streams
        .handle_webhook(&body, authorization)
        .await?;

    Ok(Json(Message::new("Event received")))
}

pub fn router() -> Router {
    Router::new().route("/stream", post(stream_status))
}
