use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use parley_core::RegistryError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("auth token is not provided in request")]
    Unauthorized,

    #[error("auth token does not exist")]
    Forbidden,

    #[error("username cannot be empty")]
    EmptyUsername,

    #[error("username is already in use")]
    UsernameTaken,

    #[error("cannot find user: {0}")]
    UserNotFound(String),

    #[error("unable to decode request body: {0}")]
    MalformedBody(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::EmptyUsername => ApiError::EmptyUsername,
            RegistryError::UsernameTaken(_) => ApiError::UsernameTaken,
            RegistryError::UnknownToken(_) => ApiError::Forbidden,
            RegistryError::UnknownUsername(name) => ApiError::UserNotFound(name),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::EmptyUsername => StatusCode::BAD_REQUEST,
            // A taken name answers 401 with a WWW-Authenticate challenge,
            // matching the original API.
            ApiError::UsernameTaken => StatusCode::UNAUTHORIZED,
            ApiError::UserNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        let mut response = (status, axum::Json(body)).into_response();

        if matches!(self, ApiError::UsernameTaken) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Token realm='Username is already in use'"),
            );
        }

        response
    }
}
