use super::{JsonBody, MessageResponse};
use crate::{
    auth::{AdminOnly, ExtractAuth},
    certificate::DynCertificates,
    email::{self, DynMailer, Mail},
    error::{AppError, AppResult},
    models::{Event, Position, RegistrationDetail},
    store::DynStore,
};
use axum::{
    extract::Path,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct PositionRequest {
    position: Option<String>,
}

#[derive(Serialize)]
struct CertificatesResponse {
    message: String,
    sent: usize,
}

/// Loads the event only when it is listed under `club_id`.
async fn club_event(store: &DynStore, club_id: i32, event_id: i32) -> AppResult<Event> {
    store
        .find_event(event_id)
        .await?
        .filter(|event| event.club_id == club_id)
        .ok_or_else(|| AppError::not_found("Event not found in this club"))
}

fn certificate_mail(registration: &RegistrationDetail, path: std::path::PathBuf) -> Mail {
    Mail {
        to: registration.user_email.clone(),
        subject: format!("Certificate for {}", registration.event_title),
        body: format!(
            "Hi {}, congratulations! Please find your certificate attached.",
            registration.user_name
        ),
        attachments: vec![path],
    }
}

async fn event_registrations(
    AdminOnly(_): AdminOnly,
    Extension(store): Extension<DynStore>,
    Path((club_id, event_id)): Path<(i32, i32)>,
) -> AppResult<Json<Vec<RegistrationDetail>>> {
    club_event(&store, club_id, event_id).await?;
    Ok(Json(store.event_registrations(event_id).await?))
}

async fn list(
    ExtractAuth(session): ExtractAuth,
    Extension(store): Extension<DynStore>,
) -> AppResult<Json<Vec<RegistrationDetail>>> {
    let scope = (!session.is_admin()).then_some(session.user_id);
    Ok(Json(store.registrations(scope).await?))
}

async fn set_position(
    AdminOnly(_): AdminOnly,
    Extension(store): Extension<DynStore>,
    Path((club_id, registration_id)): Path<(i32, i32)>,
    JsonBody(req): JsonBody<PositionRequest>,
) -> AppResult<Json<MessageResponse>> {
    let position = req
        .position
        .as_deref()
        .and_then(|p| p.parse::<Position>().ok())
        .ok_or_else(|| AppError::bad_request("Invalid position"))?;

    if !store
        .set_registration_position(club_id, registration_id, position)
        .await?
    {
        return Err(AppError::not_found("Registration not found in this club"));
    }

    tracing::info!(registration_id, %position, "updated registration position");
    Ok(MessageResponse::new("Position updated successfully"))
}

async fn send_certificates(
    AdminOnly(admin): AdminOnly,
    Extension(store): Extension<DynStore>,
    Extension(certificates): Extension<DynCertificates>,
    Extension(mailer): Extension<DynMailer>,
    Path((club_id, event_id)): Path<(i32, i32)>,
) -> AppResult<Json<CertificatesResponse>> {
    let event = club_event(&store, club_id, event_id).await?;

    let mut sent = 0;
    for registration in store.event_registrations(event_id).await? {
        let position = registration.position.parse().unwrap_or(Position::Participation);
        match certificates
            .generate(&registration.user_name, &event.title, position)
            .await
        {
            Ok(path) => {
                email::dispatch(&mailer, certificate_mail(&registration, path));
                sent += 1;
            }
            Err(e) => tracing::error!(
                registration_id = registration.id,
                error = ?e,
                "failed to generate certificate"
            ),
        }
    }

    tracing::info!(event_id, sent, admin_id = admin.user_id, "dispatched certificates");
    Ok(Json(CertificatesResponse {
        message: format!("Certificates sent for {}", event.title),
        sent,
    }))
}

pub fn app() -> Router {
    Router::new()
        .route(
            "/clubs/:club_id/events/:event_id/registrations",
            get(event_registrations),
        )
        .route(
            "/clubs/:club_id/events/:event_id/send-certificates",
            post(send_certificates),
        )
        .route(
            "/clubs/:club_id/registrations/:registration_id/position",
            patch(set_position),
        )
        .route("/registrations", get(list))
}
