use axum::{
    async_trait,
    extract::{FromRequest, Request},
    routing::get,
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppError;

pub mod auth;
pub mod club;
pub mod dashboard;
pub mod event;
pub mod registration;

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// `Json` whose rejections use the `{"error": ...}` body of every other failure.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(AppError::bad_request(rejection.body_text())),
        }
    }
}

async fn status() -> Json<MessageResponse> {
    MessageResponse::new("API is running")
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(status))
        .merge(auth::app())
        .merge(club::app())
        .merge(event::app())
        .merge(registration::app())
        .merge(dashboard::app())
}
