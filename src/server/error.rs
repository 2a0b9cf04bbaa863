use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

pub type AppResult<T> = Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// missing or malformed input, rejected before any network call
    #[error("{0}")]
    BadRequest(String),

    /// every search term and probe was tried, nothing matched
    #[error("{0}")]
    NotFound(String),

    /// transport failure talking to the upstream site
    #[error("{0}")]
    UpstreamUnreachable(String),

    #[error("unexpected error occurred")]
    InternalServerError,

    #[error("{0}")]
    InternalServerErrorWithContext(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::InternalServerError | Self::InternalServerErrorWithContext(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!("request failed with {}: {}", status, self);
        } else {
            debug!("request rejected with {}: {}", status, self);
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
