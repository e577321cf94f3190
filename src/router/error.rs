//! Handler failures and their mapping onto HTTP responses.

use thiserror::Error;

use crate::http::IntoResponse;
use crate::{Method, Response, StatusCode};

/// Result type returned by fallible handlers.
pub type HandlerResult = Result<Response, HandlerError>;

/// Errors a request handler can fail with.
///
/// Wrappers such as the response cache pass these through untouched; the
/// conversion to an HTTP response only happens when the router writes the
/// result back to the client.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0} is not implemented for this resource")]
    NotImplemented(Method),

    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal handler error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Shorthand for an error that maps to an explicit status.
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Wraps any error as an internal failure.
    pub fn internal<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal(Box::new(err))
    }

    /// The status code this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotImplemented(_) => StatusCode::NotImplemented,
            Self::Status { status, .. } => *status,
            Self::Json(_) => StatusCode::BadRequest,
            Self::Internal(_) => StatusCode::InternalServerError,
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::InternalServerError {
            tracing::error!(error = %self, "handler failed");
        }
        Response::new(status).body(self.to_string())
    }
}
