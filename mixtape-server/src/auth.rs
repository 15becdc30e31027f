use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use mixtape_social::{PrimaryKey, SessionData, UserData};

use crate::{context::ServerContext, errors::ServerError};

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(SessionData);

impl Session {
    /// Returns the user of the session
    pub fn user(&self) -> UserData {
        self.0.user.clone()
    }

    /// Returns the raw session token
    pub fn token(&self) -> &str {
        &self.0.token
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token =
            bearer_token(parts)?.ok_or(ServerError::Unauthorized("Missing authorization"))?;

        let session = state
            .social
            .auth
            .session(&token)
            .await
            .map_err(|_| ServerError::Unauthorized("Session does not exist"))?;

        Ok(Self(session))
    }
}

/// Like [Session], for routes that also serve anonymous viewers.
/// A missing Authorization header is fine, an invalid one is not.
pub struct OptionalSession(Option<SessionData>);

impl OptionalSession {
    pub fn viewer_id(&self) -> Option<PrimaryKey> {
        self.0.as_ref().map(|s| s.user.id)
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for OptionalSession {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(parts)? {
            Some(token) => token,
            None => return Ok(Self(None)),
        };

        let session = state
            .social
            .auth
            .session(&token)
            .await
            .map_err(|_| ServerError::Unauthorized("Session does not exist"))?;

        Ok(Self(Some(session)))
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<String>, ServerError> {
    let header_value = match parts.headers.get(header::AUTHORIZATION) {
        Some(value) => value,
        None => return Ok(None),
    };

    let value = header_value
        .to_str()
        .map_err(|_| ServerError::BadRequest("Authorization header is not valid text".to_string()))?;

    let parts: Vec<_> = value.split_ascii_whitespace().collect();

    match parts.as_slice() {
        ["Bearer", token] => Ok(Some(token.to_string())),
        _ => Err(ServerError::BadRequest(
            "Authorization must be Bearer".to_string(),
        )),
    }
}
