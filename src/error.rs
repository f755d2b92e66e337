use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::borrow::Cow;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    InternalServerError(#[from] anyhow::Error),
    #[error("{1}")]
    ResponseStatusError(StatusCode, Cow<'static, str>),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct AppErrorResponse {
            error: Cow<'static, str>,
        }

        match self {
            AppError::InternalServerError(err) => {
                tracing::error!(error = ?err, "request failed on a dependency");
                AppError::from(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                    .into_response()
            }
            AppError::ResponseStatusError(code, s) => {
                (code, Json(AppErrorResponse { error: s })).into_response()
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> AppError {
        match e {
            StoreError::DuplicateEmail => {
                AppError::from(StatusCode::CONFLICT, "Email already registered")
            }
            StoreError::DuplicateClub => AppError::from(StatusCode::CONFLICT, "Club already exists"),
            StoreError::EventNotFound => AppError::from(StatusCode::NOT_FOUND, "Event not found"),
            StoreError::AlreadyRegistered => {
                AppError::from(StatusCode::CONFLICT, "Already registered for this event")
            }
            StoreError::DeletionFailed(err) => {
                tracing::error!(error = ?err, "event deletion rolled back");
                AppError::from(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete event")
            }
            StoreError::Backend(err) => AppError::InternalServerError(err),
        }
    }
}

impl From<password_hash::Error> for AppError {
    fn from(e: password_hash::Error) -> AppError {
        AppError::InternalServerError(anyhow::anyhow!("password hashing failed: {e}"))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> AppError {
        AppError::InternalServerError(e.into())
    }
}

impl AppError {
    pub fn from(code: StatusCode, s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::ResponseStatusError(code, s.into())
    }

    pub fn bad_request(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::from(StatusCode::BAD_REQUEST, s)
    }

    pub fn not_found(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::from(StatusCode::NOT_FOUND, s)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ResponseStatusError(code, _) => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_map_to_conflict() {
        for e in [
            StoreError::DuplicateEmail,
            StoreError::DuplicateClub,
            StoreError::AlreadyRegistered,
        ] {
            let err: AppError = e.into();
            assert_eq!(err.status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn backend_failures_hide_their_cause() {
        let err: AppError = StoreError::Backend(anyhow::anyhow!("relation does not exist")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: AppError = StoreError::DeletionFailed(anyhow::anyhow!("deadlock")).into();
        assert_eq!(err.to_string(), "Failed to delete event");
    }
}
