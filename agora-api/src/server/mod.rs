use crate::server::sync::QueryCache;
use agora_common::model::{ModelValidationError, auth::AuthTokenDecodeError};
use agora_db::client::{BackendClient, ClientError};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

mod auth;
mod json;
mod routes;
pub mod sync;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub client: BackendClient,
    pub cache: Arc<QueryCache>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
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
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Multipart form rejected: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Form field {0} is missing")]
    MissingField(&'static str),
    #[error("Form field {field} is invalid: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::Client(
                ClientError::PostNotFound(_) | ClientError::CommunityNotFound(_),
            ) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::Client(ClientError::Unauthorized) => StatusCode::UNAUTHORIZED,
            ServerError::JsonRejection(_)
            | ServerError::Multipart(_)
            | ServerError::MissingField(_)
            | ServerError::InvalidField { .. }
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::Validation(_)
            | ServerError::Client(ClientError::Validation(_)) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Client(
                ClientError::Store(_) | ClientError::Storage(_) | ClientError::AuthTokenHash(_),
            ) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(error_response)).into_response()
    }
}


#[cfg(test)]
mod tests {
    use super::ServerError;
    use agora_common::model::{Id, ModelValidationError, text::InvalidTextError};
    use agora_db::client::ClientError;
    use axum::http::StatusCode;

    #[test]
    fn errors_map_onto_statuses() {
        let cases = [
            (ServerError::Client(ClientError::Unauthorized), StatusCode::UNAUTHORIZED),
            (
                ServerError::Client(ClientError::PostNotFound(Id::new(1))),
                StatusCode::NOT_FOUND,
            ),
            (
                ServerError::Validation(ModelValidationError::Text(InvalidTextError::Empty {
                    field: "title",
                })),
                StatusCode::BAD_REQUEST,
            ),
            (ServerError::MissingField("image"), StatusCode::BAD_REQUEST),
        ];

        for (error, status) in cases {
            assert_eq!(error.status(), status, "{error}");
        }
    }
}
