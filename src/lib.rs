use axum::{
    http::{Method, StatusCode, Uri},
    Extension, Router,
};
use tower_http::trace::TraceLayer;

use auth::SharedKeys;
use certificate::DynCertificates;
use email::DynMailer;
use store::DynStore;

pub mod api;
pub mod auth;
pub mod certificate;
pub mod email;
pub mod error;
pub mod models;
pub mod otp;
pub mod schema;
pub mod store;

/// Everything a request handler may reach for, injected as extensions.
#[derive(Clone)]
pub struct Services {
    pub store: DynStore,
    pub keys: SharedKeys,
    pub mailer: DynMailer,
    pub certificates: DynCertificates,
}

pub fn app(services: Services) -> Router {
    Router::new()
        .nest("/api", api::app())
        .fallback(not_found)
        .layer(Extension(services.store))
        .layer(Extension(services.keys))
        .layer(Extension(services.mailer))
        .layer(Extension(services.certificates))
        .layer(TraceLayer::new_for_http())
}

async fn not_found(method: Method, uri: Uri) -> error::AppError {
    error::AppError::from(StatusCode::NOT_FOUND, format!("Cannot {method} {uri}"))
}
