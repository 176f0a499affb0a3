use crate::{mail::Mailer, service::ServiceError};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use extract::Json;
use serde::Serialize;
use simpleblog_common::{
    model::auth::{AuthTokenDecodeError, AuthTokenHashError},
    util::PositiveDuration,
};
use simpleblog_db::store::{Store, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

mod auth;
mod extract;
mod routes;
#[cfg(test)]
mod tests;

pub type ServerRouter = Router<ServerState>;

/// Deployment settings the handlers need.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Settings {
    /// Base of the links handed out for sharing, without trailing slash.
    pub public_base_url: String,
    /// `None` issues tokens that never expire.
    pub auth_token_lifetime: Option<PositiveDuration>,
}

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    pub settings: Arc<Settings>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub fn app(state: ServerState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PathRejection(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken => StatusCode::UNAUTHORIZED,
            ServerError::JsonRejection(_)
            | ServerError::QueryRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Store(_)
            | ServerError::AuthTokenHash(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::Service(err) => service_status(err),
        }
    }

    /// The text put into the response body.
    pub fn public_message(&self) -> String {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PathRejection(_) => "Not found".to_owned(),
            ServerError::JsonRejection(rejection) => rejection.body_text(),
            ServerError::QueryRejection(rejection) => rejection.body_text(),
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                "Unauthorized".to_owned()
            }
            ServerError::InvalidAuthorizationHeader(_) => "Invalid authorization header".to_owned(),
            ServerError::InvalidAuthToken(_) => "Invalid auth token".to_owned(),
            ServerError::InvalidToken => "Unauthorized".to_owned(),
            ServerError::JsonResponse(_)
            | ServerError::Store(_)
            | ServerError::AuthTokenHash(_) => {
                "Internal server error".to_owned()
            }
            ServerError::Service(err) => err.public_message(),
        }
    }
}

fn service_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Validation(_)
        | ServiceError::InvalidState
        | ServiceError::InvalidCredential => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Expired => StatusCode::GONE,
        ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
        ServiceError::Store(_)
        | ServiceError::PasswordHash(_)
        | ServiceError::TokenHash(_)
        | ServiceError::SlugsExhausted(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            error: self.public_message(),
        };
        (status, Json(error_response)).into_response()
    }
}
