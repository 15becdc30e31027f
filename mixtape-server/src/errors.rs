use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use mixtape_social::{
    AuthError, CatalogError, ChannelsError, ControlPlaneError, DatabaseError, MediaStorageError,
    PlaylistsError, StreamsError,
};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Upstream service failure: {0}")]
    Upstream(String),
    #[error("Unknown internal error: {0}")]
    Internal(String),
}

/// The structured body every failed request carries
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();

        let body = ErrorBody {
            status: status.as_u16(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::InvalidUsername | AuthError::InvalidEmail => {
                Self::BadRequest(value.to_string())
            }
            AuthError::Db(e) => e.into(),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<ChannelsError> for ServerError {
    fn from(value: ChannelsError) -> Self {
        match value {
            ChannelsError::SelfFollow => Self::BadRequest(value.to_string()),
            ChannelsError::Db(e) => e.into(),
            ChannelsError::Storage(e) => e.into(),
        }
    }
}

impl From<CatalogError> for ServerError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::NotOwner => Self::Forbidden(value.to_string()),
            CatalogError::Db(e) => e.into(),
            CatalogError::Storage(e) => e.into(),
        }
    }
}

impl From<PlaylistsError> for ServerError {
    fn from(value: PlaylistsError) -> Self {
        match value {
            PlaylistsError::NotOwner => Self::Forbidden(value.to_string()),
            PlaylistsError::Db(e) => e.into(),
        }
    }
}

impl From<StreamsError> for ServerError {
    fn from(value: StreamsError) -> Self {
        match value {
            StreamsError::Db(e) => e.into(),
            StreamsError::ControlPlane(e) => e.into(),
            StreamsError::Storage(e) => e.into(),
        }
    }
}

impl From<MediaStorageError> for ServerError {
    fn from(value: MediaStorageError) -> Self {
        Self::Upstream(value.to_string())
    }
}

impl From<ControlPlaneError> for ServerError {
    fn from(value: ControlPlaneError) -> Self {
        match value {
            ControlPlaneError::InvalidWebhook => Self::Unauthorized("Webhook could not be verified"),
            ControlPlaneError::InvalidPayload(e) => Self::BadRequest(e),
            e => Self::Upstream(e.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_database_error_mapping() {
        let not_found: ServerError = DatabaseError::NotFound {
            resource: "song",
            identifier: "id",
        }
        .into();
        assert_eq!(not_found.as_status_code(), StatusCode::NOT_FOUND);

        let conflict: ServerError = DatabaseError::Conflict {
            resource: "playlist",
            field: "name",
            value: "Morning".to_string(),
        }
        .into();
        assert_eq!(conflict.as_status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_domain_error_mapping() {
        let forbidden: ServerError = CatalogError::NotOwner.into();
        assert_eq!(forbidden.as_status_code(), StatusCode::FORBIDDEN);

        let bad_request: ServerError = ChannelsError::SelfFollow.into();
        assert_eq!(bad_request.as_status_code(), StatusCode::BAD_REQUEST);

        let unauthorized: ServerError = ControlPlaneError::InvalidWebhook.into();
        assert_eq!(unauthorized.as_status_code(), StatusCode::UNAUTHORIZED);

        let upstream: ServerError =
            MediaStorageError::Unreachable("connection refused".to_string()).into();
        assert_eq!(upstream.as_status_code(), StatusCode::BAD_GATEWAY);
    }
}
