use super::JsonBody;
use crate::{
    auth::{self, AdminOnly, ExtractAuth},
    error::{AppError, AppResult},
    models::ClubSummary,
    store::{DynStore, NewClub},
};
use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct CreateClubRequest {
    name: Option<String>,
    description: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct CreateClubResponse {
    message: &'static str,
    id: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyClubRequest {
    club_id: i32,
    password: String,
}

#[derive(Serialize)]
struct VerifyClubResponse {
    success: bool,
}

async fn list(
    AdminOnly(_): AdminOnly,
    Extension(store): Extension<DynStore>,
) -> AppResult<Json<Vec<ClubSummary>>> {
    Ok(Json(store.list_clubs().await?))
}

async fn list_public(
    ExtractAuth(_): ExtractAuth,
    Extension(store): Extension<DynStore>,
) -> AppResult<Json<Vec<ClubSummary>>> {
    Ok(Json(store.list_clubs().await?))
}

async fn create(
    AdminOnly(admin): AdminOnly,
    Extension(store): Extension<DynStore>,
    JsonBody(req): JsonBody<CreateClubRequest>,
) -> AppResult<(StatusCode, Json<CreateClubResponse>)> {
    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    let password = req.password.unwrap_or_default();
    if name.is_empty() || password.is_empty() {
        return Err(AppError::bad_request("Club name and password are required"));
    }

    let id = store
        .create_club(NewClub {
            name: name.to_string(),
            description: req.description,
            password_hash: auth::hash_password(password)?,
        })
        .await?;

    tracing::info!(club_id = id, admin_id = admin.user_id, "created club");
    Ok((
        StatusCode::CREATED,
        Json(CreateClubResponse {
            message: "Club created successfully",
            id,
        }),
    ))
}

async fn verify(
    AdminOnly(admin): AdminOnly,
    Extension(store): Extension<DynStore>,
    JsonBody(req): JsonBody<VerifyClubRequest>,
) -> AppResult<Json<VerifyClubResponse>> {
    let club = store
        .find_club(req.club_id)
        .await?
        .ok_or_else(|| AppError::not_found("Club not found"))?;

    if !auth::verify_password(req.password, &club.password_hash)? {
        tracing::warn!(club_id = club.id, admin_id = admin.user_id, "club password rejected");
        return Err(AppError::from(StatusCode::UNAUTHORIZED, "Invalid password"));
    }

    Ok(Json(VerifyClubResponse { success: true }))
}

async fn info(
    AdminOnly(_): AdminOnly,
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
) -> AppResult<Json<ClubSummary>> {
    let club = store
        .find_club(club_id)
        .await?
        .ok_or_else(|| AppError::not_found("Club not found"))?;

    Ok(Json(ClubSummary::from(&club)))
}

pub fn app() -> Router {
    Router::new()
        .route("/clubs", get(list))
        .route("/clubs/public", get(list_public))
        .route("/createclubs", post(create))
        .route("/clubs/verify", post(verify))
        .route("/clubs/:club_id", get(info))
}
