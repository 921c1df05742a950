use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error kinds surfaced by the scheduling core.
///
/// `Contention` never escapes a [`crate::store::Store`] call: it is caught
/// internally by the component that lost a skip-locked race and turned into
/// an ordinary "nothing available" result.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found")]
    NotFound,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("lost a skip-locked race")]
    Contention,

    #[error("store error")]
    Store(#[from] sqlx::Error),
}

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::InvalidState(_) => StatusCode::BAD_REQUEST,
            Error::Contention => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

// Tell axum how to convert `Error` into a response, the same way kumod's
// `AppError` wraps an `anyhow::Error` for its HTTP handlers.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Error::Store(err) = &self {
            tracing::error!(error = %err, "store error handling request");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
