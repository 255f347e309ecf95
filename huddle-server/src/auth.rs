use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use huddle_collab::{GatewayError, Identity};

use crate::{errors::ServerError, ServerContext};

/// The authenticated user making a request
pub struct Caller(pub Identity);

/// Reads the token out of an `Authorization: Bearer <token>` header.
///
/// Returns `Ok(None)` when there is no header at all.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ServerError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| ServerError::MalformedAuthorization)?;

    let parts: Vec<_> = value.split_ascii_whitespace().collect();

    match parts.as_slice() {
        ["Bearer", token] => Ok(Some(token)),
        ["Bearer"] => Ok(None),
        _ => Err(ServerError::MalformedAuthorization),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    ServerContext: FromRef<S>,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);
        let token = bearer_token(&parts.headers)?.ok_or(GatewayError::MissingToken)?;
        let identity = context.collab.authenticate(Some(token)).await?;

        Ok(Self(identity))
    }
}
