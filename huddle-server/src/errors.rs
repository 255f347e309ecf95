use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use huddle_collab::{CollabError, ErrorCode, GatewayError};
use log::error;
use thiserror::Error;

use crate::serialized::ErrorBody;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Collab(#[from] CollabError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// The request body could not be parsed or did not validate
    #[error("{0}")]
    BadRequest(String),
    #[error("Authorization must be Bearer")]
    MalformedAuthorization,
}

impl ServerError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Collab(e) => e.code(),
            Self::Gateway(e) => e.code(),
            Self::BadRequest(_) => ErrorCode::ValidationError,
            Self::MalformedAuthorization => ErrorCode::InvalidToken,
        }
    }

    fn as_status_code(&self) -> StatusCode {
        match self.code() {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::MissingToken | ErrorCode::InvalidToken | ErrorCode::UserNotFound => {
                StatusCode::UNAUTHORIZED
            }
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Cooldown
            | ErrorCode::StreamLimit
            | ErrorCode::ServerBusy
            | ErrorCode::StreamFull => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Collab(e) => e.retry_after(),
            _ => None,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Collab(e) => e.public_message(),
            Self::Gateway(GatewayError::Internal(details)) => {
                error!("Authentication failed unexpectedly: {}", details);
                self.to_string()
            }
            e => e.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let Self::Collab(CollabError::Internal(details)) = &self {
            error!("Request failed: {}", details);
        }

        let retry_after = self.retry_after();
        let body = ErrorBody {
            code: self.code(),
            message: self.public_message(),
            retry_after,
        };

        let mut response = (self.as_status_code(), Json(body)).into_response();

        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}
