use crate::{
    auth::{AdminOnly, ExtractAuth},
    error::AppResult,
    models::{AdminDashboard, UserDashboard},
    store::DynStore,
};
use axum::{routing::get, Extension, Json, Router};

async fn admin(
    AdminOnly(_): AdminOnly,
    Extension(store): Extension<DynStore>,
) -> AppResult<Json<AdminDashboard>> {
    Ok(Json(store.admin_dashboard().await?))
}

async fn user(
    ExtractAuth(session): ExtractAuth,
    Extension(store): Extension<DynStore>,
) -> AppResult<Json<UserDashboard>> {
    let today = chrono::Local::now().date_naive();
    Ok(Json(store.user_dashboard(session.user_id, today).await?))
}

pub fn app() -> Router {
    Router::new()
        .route("/admin/dashboard", get(admin))
        .route("/user/dashboard", get(user))
}
