//! Persistence seam for users, clubs, events and registrations.
//!
//! Handlers only see [`Store`]. [`postgres::PgStore`] is the production backend;
//! [`memory::MemoryStore`] keeps the same invariants in process.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;

use crate::models::{
    AdminDashboard, Club, ClubSummary, Event, EventStatus, EventWithCount, Position,
    RegistrationDetail, Role, User, UserDashboard,
};

pub mod memory;
pub mod postgres;

/// Number of rows in each dashboard list.
pub const DASHBOARD_LIMIT: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("club already exists")]
    DuplicateClub,
    #[error("event not found")]
    EventNotFound,
    #[error("already registered for this event")]
    AlreadyRegistered,
    #[error("event deletion rolled back")]
    DeletionFailed(#[source] anyhow::Error),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub otp: String,
    pub otp_expires_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewClub {
    pub name: String,
    pub description: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub club_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub venue: Option<String>,
    pub time: Option<String>,
    pub status: EventStatus,
    pub created_by: i32,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Fails with [`StoreError::DuplicateEmail`] when the address is taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<i32>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Marks the user verified and clears the code when `otp` matches and has
    /// not expired at `now`. Returns `false` otherwise.
    async fn verify_otp(&self, email: &str, otp: &str, now: NaiveDateTime) -> StoreResult<bool>;

    /// Fails with [`StoreError::DuplicateClub`] when the name is taken.
    async fn create_club(&self, club: NewClub) -> StoreResult<i32>;

    async fn list_clubs(&self) -> StoreResult<Vec<ClubSummary>>;

    async fn find_club(&self, club_id: i32) -> StoreResult<Option<Club>>;

    async fn create_event(&self, event: NewEvent) -> StoreResult<i32>;

    async fn find_event(&self, event_id: i32) -> StoreResult<Option<Event>>;

    /// Events of a club, newest date first.
    async fn club_events(&self, club_id: i32) -> StoreResult<Vec<Event>>;

    async fn club_events_with_counts(&self, club_id: i32) -> StoreResult<Vec<EventWithCount>>;

    /// Upcoming events soonest first, past events most recent first.
    async fn events_by_status(&self, status: EventStatus) -> StoreResult<Vec<EventWithCount>>;

    /// Returns `false` when the event does not belong to the club.
    async fn update_event_status(
        &self,
        club_id: i32,
        event_id: i32,
        status: EventStatus,
    ) -> StoreResult<bool>;

    /// Deletes the event and all of its registrations atomically. Returns
    /// `false` when the event does not belong to the club.
    async fn delete_event(&self, club_id: i32, event_id: i32) -> StoreResult<bool>;

    async fn create_registration(&self, event_id: i32, user_id: i32) -> StoreResult<i32>;

    async fn event_registrations(&self, event_id: i32) -> StoreResult<Vec<RegistrationDetail>>;

    /// All registrations, or only those of `user_id` when given.
    async fn registrations(&self, user_id: Option<i32>) -> StoreResult<Vec<RegistrationDetail>>;

    /// Returns `false` when the registration is not for an event of the club.
    async fn set_registration_position(
        &self,
        club_id: i32,
        registration_id: i32,
        position: Position,
    ) -> StoreResult<bool>;

    async fn admin_dashboard(&self) -> StoreResult<AdminDashboard>;

    async fn user_dashboard(&self, user_id: i32, today: NaiveDate) -> StoreResult<UserDashboard>;
}

pub type DynStore = Arc<dyn Store>;
