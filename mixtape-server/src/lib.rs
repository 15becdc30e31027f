use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::routing::get;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod auth;
mod context;
mod docs;
mod errors;
mod likes;
mod listen_later;
mod playlists;
mod schemas;
mod serialized;
mod songs;
mod streams;
mod upload;
mod users;
mod webhooks;

pub use context::{ServerContext, SocialSystem};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9080;

pub type Router = axum::Router<ServerContext>;

/// Starts the mixtape server
pub async fn run_server(social: Arc<SocialSystem>) {
    let port = env::var("MIXTAPE_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/users", users::router())
        .nest("/songs", songs::router())
        .nest("/likedsongs", likes::router())
        .nest("/listenlater", listen_later::router())
        .nest("/playlists", playlists::router())
        .nest("/streams", streams::router())
        .nest("/webhooks", webhooks::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(ServerContext { social });

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {}", port);

    axum::serve(listener, root_router.into_make_service())
        .await
        .unwrap();
}
