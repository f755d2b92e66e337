use super::{JsonBody, MessageResponse};
use crate::{
    auth::{AdminOnly, ExtractAuth},
    error::{AppError, AppResult},
    models::{Event, EventStatus, EventWithCount},
    store::{DynStore, NewEvent},
};
use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct CreateEventRequest {
    title: Option<String>,
    description: Option<String>,
    date: Option<NaiveDate>,
    venue: Option<String>,
    time: Option<String>,
    status: Option<String>,
}

#[derive(Serialize)]
struct CreatedResponse {
    message: &'static str,
    id: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisteredResponse {
    message: &'static str,
    registration_id: i32,
}

#[derive(Deserialize)]
struct StatusRequest {
    status: Option<String>,
}

fn parse_status(status: Option<&str>) -> AppResult<EventStatus> {
    status
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| AppError::bad_request("Invalid status"))
}

fn not_in_club() -> AppError {
    AppError::not_found("Event not found in this club")
}

async fn club_events(
    ExtractAuth(_): ExtractAuth,
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
) -> AppResult<Json<Vec<Event>>> {
    Ok(Json(store.club_events(club_id).await?))
}

async fn add_event(
    AdminOnly(admin): AdminOnly,
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    JsonBody(req): JsonBody<CreateEventRequest>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    let title = req.title.as_deref().map(str::trim).unwrap_or_default();
    let (false, Some(date)) = (title.is_empty(), req.date) else {
        return Err(AppError::bad_request("Event title and date are required"));
    };
    let status = match req.status.as_deref() {
        None => EventStatus::Upcoming,
        status => parse_status(status)?,
    };

    if store.find_club(club_id).await?.is_none() {
        return Err(AppError::not_found("Club not found"));
    }

    let id = store
        .create_event(NewEvent {
            club_id,
            title: title.to_string(),
            description: req.description,
            date,
            venue: req.venue,
            time: req.time,
            status,
            created_by: admin.user_id,
        })
        .await?;

    tracing::info!(event_id = id, club_id, admin_id = admin.user_id, "created event");
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Event added under club",
            id,
        }),
    ))
}

async fn manage_events(
    AdminOnly(_): AdminOnly,
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
) -> AppResult<Json<Vec<EventWithCount>>> {
    Ok(Json(store.club_events_with_counts(club_id).await?))
}

async fn update_status(
    AdminOnly(_): AdminOnly,
    Extension(store): Extension<DynStore>,
    Path((club_id, event_id)): Path<(i32, i32)>,
    JsonBody(req): JsonBody<StatusRequest>,
) -> AppResult<Json<MessageResponse>> {
    let status = parse_status(req.status.as_deref())?;

    if !store.update_event_status(club_id, event_id, status).await? {
        return Err(not_in_club());
    }

    tracing::info!(event_id, %status, "updated event status");
    Ok(MessageResponse::new("Event status updated successfully"))
}

async fn delete_event(
    AdminOnly(admin): AdminOnly,
    Extension(store): Extension<DynStore>,
    Path((club_id, event_id)): Path<(i32, i32)>,
) -> AppResult<StatusCode> {
    if !store.delete_event(club_id, event_id).await? {
        return Err(not_in_club());
    }

    tracing::info!(event_id, club_id, admin_id = admin.user_id, "deleted event");
    Ok(StatusCode::NO_CONTENT)
}

async fn upcoming(
    ExtractAuth(_): ExtractAuth,
    Extension(store): Extension<DynStore>,
) -> AppResult<Json<Vec<EventWithCount>>> {
    Ok(Json(store.events_by_status(EventStatus::Upcoming).await?))
}

async fn past(
    ExtractAuth(_): ExtractAuth,
    Extension(store): Extension<DynStore>,
) -> AppResult<Json<Vec<EventWithCount>>> {
    Ok(Json(store.events_by_status(EventStatus::Past).await?))
}

async fn details(
    ExtractAuth(_): ExtractAuth,
    Extension(store): Extension<DynStore>,
    Path(event_id): Path<i32>,
) -> AppResult<Json<Event>> {
    let event = store
        .find_event(event_id)
        .await?
        .ok_or_else(|| AppError::not_found("Event not found"))?;

    Ok(Json(event))
}

async fn register(
    ExtractAuth(session): ExtractAuth,
    Extension(store): Extension<DynStore>,
    Path(event_id): Path<i32>,
) -> AppResult<(StatusCode, Json<RegisteredResponse>)> {
    let registration_id = store.create_registration(event_id, session.user_id).await?;

    tracing::info!(
        registration_id,
        event_id,
        user_id = session.user_id,
        "registered for event"
    );
    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            message: "Successfully registered for the event",
            registration_id,
        }),
    ))
}

pub fn app() -> Router {
    Router::new()
        .route("/clubs/:club_id/events", get(club_events))
        .route("/clubs/:club_id/addevents", post(add_event))
        .route("/clubs/:club_id/manageevents", get(manage_events))
        .route(
            "/clubs/:club_id/events/:event_id",
            patch(update_status).delete(delete_event),
        )
        .route("/events/upcoming", get(upcoming))
        .route("/events/past", get(past))
        .route("/events/:event_id", get(details))
        .route("/events/register/:event_id", post(register))
}
