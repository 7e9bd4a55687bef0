//! RPC error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cohort_groups::GroupError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Group(#[from] GroupError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("server error: {0}")]
    Server(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::Group(e) => match e {
                GroupError::NotFound(_) | GroupError::NotAMember { .. } => StatusCode::NOT_FOUND,
                GroupError::Unauthorized { .. } => StatusCode::FORBIDDEN,
                GroupError::Conflict(_) | GroupError::GroupFull(_) => StatusCode::CONFLICT,
                GroupError::InviteRejected(_)
                | GroupError::InvalidDepth(_)
                | GroupError::InvalidName(_) => StatusCode::BAD_REQUEST,
                GroupError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
                GroupError::Store(_) | GroupError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            RpcError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!(error = %self, "request failed");
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
