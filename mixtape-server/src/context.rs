use std::sync::Arc;

use axum::extract::FromRef;
use mixtape_social::{HttpControlPlane, HttpMediaStorage, PgDatabase, Social};

/// The concrete social system this server exposes
pub type SocialSystem = Social<PgDatabase, HttpMediaStorage, HttpControlPlane>;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub social: Arc<SocialSystem>,
}
