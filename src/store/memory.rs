use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use std::{
    cmp::Reverse,
    collections::HashSet,
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::Mutex;

use super::{NewClub, NewEvent, NewUser, Store, StoreError, StoreResult, DASHBOARD_LIMIT};
use crate::models::{
    AdminDashboard, AdminStats, Club, ClubSummary, Event, EventStatus, EventWithCount, Position,
    Registration, RegistrationDetail, Role, User, UserDashboard, UserStats,
    DEFAULT_REGISTRATION_STATUS,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    clubs: Vec<Club>,
    events: Vec<Event>,
    registrations: Vec<Registration>,
    last_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn event_in_club(&self, club_id: i32, event_id: i32) -> bool {
        self.events
            .iter()
            .any(|e| e.id == event_id && e.club_id == club_id)
    }

    fn count_for(&self, event_id: i32) -> i64 {
        self.registrations
            .iter()
            .filter(|r| r.event_id == event_id)
            .count() as i64
    }

    fn with_counts(&self, events: Vec<Event>) -> Vec<EventWithCount> {
        events
            .into_iter()
            .map(|event| EventWithCount {
                registration_count: self.count_for(event.id),
                event,
            })
            .collect()
    }

    fn detail(&self, r: &Registration) -> Option<RegistrationDetail> {
        let event = self.events.iter().find(|e| e.id == r.event_id)?;
        let user = self.users.iter().find(|u| u.id == r.user_id)?;
        Some(RegistrationDetail {
            id: r.id,
            event_id: r.event_id,
            user_id: r.user_id,
            status: r.status.clone(),
            position: r.position.clone(),
            created_at: r.created_at,
            event_title: event.title.clone(),
            user_name: user.name.clone(),
            user_email: user.email.clone(),
        })
    }

    /// Newest first; ids break ties between rows created in the same instant.
    fn details<'a>(
        &'a self,
        filter: impl Fn(&Registration) -> bool + 'a,
    ) -> Vec<RegistrationDetail> {
        let mut details: Vec<_> = self
            .registrations
            .iter()
            .filter(|r| filter(r))
            .filter_map(|r| self.detail(r))
            .collect();
        details.sort_by_key(|d| Reverse((d.created_at, d.id)));
        details
    }

    fn registered_event_ids(&self, user_id: i32) -> HashSet<i32> {
        self.registrations
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.event_id)
            .collect()
    }
}

fn by_date_desc(events: &mut [Event]) {
    events.sort_by_key(|e| Reverse((e.date, e.id)));
}

fn by_date_asc(events: &mut [Event]) {
    events.sort_by_key(|e| (e.date, e.id));
}

/// An in-process [`Store`].
///
/// Each operation holds one lock over all tables, so the uniqueness checks
/// and the cascade delete are as atomic as their SQL counterparts. The
/// cascade works on a copy of the tables that replaces the originals only
/// once every step succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_cascade: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following event deletion fail after its registrations were
    /// removed from the working copy.
    pub fn fail_cascade_deletes(&self, fail: bool) {
        self.fail_cascade.store(fail, Ordering::SeqCst);
    }

    pub async fn event_count(&self) -> usize {
        self.tables.lock().await.events.len()
    }

    pub async fn registration_count(&self, event_id: i32) -> i64 {
        self.tables.lock().await.count_for(event_id)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<i32> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let id = tables.next_id();
        tables.users.push(User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role.as_str().to_string(),
            is_verified: false,
            otp: Some(user.otp),
            otp_expires_at: Some(user.otp_expires_at),
            created_at: Utc::now().naive_utc(),
        });
        Ok(id)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn verify_otp(&self, email: &str, otp: &str, now: NaiveDateTime) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(user) = tables.users.iter_mut().find(|u| {
            u.email == email
                && u.otp.as_deref() == Some(otp)
                && u.otp_expires_at.map_or(false, |expires| expires > now)
        }) else {
            return Ok(false);
        };
        user.is_verified = true;
        user.otp = None;
        user.otp_expires_at = None;
        Ok(true)
    }

    async fn create_club(&self, club: NewClub) -> StoreResult<i32> {
        let mut tables = self.tables.lock().await;
        if tables.clubs.iter().any(|c| c.name == club.name) {
            return Err(StoreError::DuplicateClub);
        }
        let id = tables.next_id();
        tables.clubs.push(Club {
            id,
            name: club.name,
            description: club.description,
            password_hash: club.password_hash,
        });
        Ok(id)
    }

    async fn list_clubs(&self) -> StoreResult<Vec<ClubSummary>> {
        let tables = self.tables.lock().await;
        Ok(tables.clubs.iter().map(ClubSummary::from).collect())
    }

    async fn find_club(&self, club_id: i32) -> StoreResult<Option<Club>> {
        let tables = self.tables.lock().await;
        Ok(tables.clubs.iter().find(|c| c.id == club_id).cloned())
    }

    async fn create_event(&self, event: NewEvent) -> StoreResult<i32> {
        let mut tables = self.tables.lock().await;
        if !tables.clubs.iter().any(|c| c.id == event.club_id) {
            return Err(anyhow::anyhow!("club {} does not exist", event.club_id).into());
        }
        let id = tables.next_id();
        tables.events.push(Event {
            id,
            club_id: event.club_id,
            title: event.title,
            description: event.description,
            date: event.date,
            venue: event.venue,
            time: event.time,
            status: event.status.as_str().to_string(),
            created_by: event.created_by,
        });
        Ok(id)
    }

    async fn find_event(&self, event_id: i32) -> StoreResult<Option<Event>> {
        let tables = self.tables.lock().await;
        Ok(tables.events.iter().find(|e| e.id == event_id).cloned())
    }

    async fn club_events(&self, club_id: i32) -> StoreResult<Vec<Event>> {
        let tables = self.tables.lock().await;
        let mut events: Vec<_> = tables
            .events
            .iter()
            .filter(|e| e.club_id == club_id)
            .cloned()
            .collect();
        by_date_desc(&mut events);
        Ok(events)
    }

    async fn club_events_with_counts(&self, club_id: i32) -> StoreResult<Vec<EventWithCount>> {
        let events = self.club_events(club_id).await?;
        let tables = self.tables.lock().await;
        Ok(tables.with_counts(events))
    }

    async fn events_by_status(&self, status: EventStatus) -> StoreResult<Vec<EventWithCount>> {
        let tables = self.tables.lock().await;
        let mut events: Vec<_> = tables
            .events
            .iter()
            .filter(|e| e.status == status.as_str())
            .cloned()
            .collect();
        match status {
            EventStatus::Upcoming => by_date_asc(&mut events),
            EventStatus::Past => by_date_desc(&mut events),
        }
        Ok(tables.with_counts(events))
    }

    async fn update_event_status(
        &self,
        club_id: i32,
        event_id: i32,
        status: EventStatus,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(event) = tables
            .events
            .iter_mut()
            .find(|e| e.id == event_id && e.club_id == club_id)
        else {
            return Ok(false);
        };
        event.status = status.as_str().to_string();
        Ok(true)
    }

    async fn delete_event(&self, club_id: i32, event_id: i32) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if !tables.event_in_club(club_id, event_id) {
            return Ok(false);
        }

        let mut working = tables.clone();
        working.registrations.retain(|r| r.event_id != event_id);
        if self.fail_cascade.load(Ordering::SeqCst) {
            return Err(StoreError::DeletionFailed(anyhow::anyhow!(
                "injected failure while deleting event {event_id}"
            )));
        }
        working.events.retain(|e| e.id != event_id);

        *tables = working;
        Ok(true)
    }

    async fn create_registration(&self, event_id: i32, user_id: i32) -> StoreResult<i32> {
        let mut tables = self.tables.lock().await;
        if !tables.events.iter().any(|e| e.id == event_id) {
            return Err(StoreError::EventNotFound);
        }
        if tables
            .registrations
            .iter()
            .any(|r| r.event_id == event_id && r.user_id == user_id)
        {
            return Err(StoreError::AlreadyRegistered);
        }
        let id = tables.next_id();
        tables.registrations.push(Registration {
            id,
            event_id,
            user_id,
            status: DEFAULT_REGISTRATION_STATUS.to_string(),
            position: Position::Participation.as_str().to_string(),
            created_at: Utc::now().naive_utc(),
        });
        Ok(id)
    }

    async fn event_registrations(&self, event_id: i32) -> StoreResult<Vec<RegistrationDetail>> {
        let tables = self.tables.lock().await;
        Ok(tables.details(move |r| r.event_id == event_id))
    }

    async fn registrations(&self, user_id: Option<i32>) -> StoreResult<Vec<RegistrationDetail>> {
        let tables = self.tables.lock().await;
        Ok(tables.details(move |r| user_id.map_or(true, |id| r.user_id == id)))
    }

    async fn set_registration_position(
        &self,
        club_id: i32,
        registration_id: i32,
        position: Position,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(event_id) = tables
            .registrations
            .iter()
            .find(|r| r.id == registration_id)
            .map(|r| r.event_id)
        else {
            return Ok(false);
        };
        if !tables.event_in_club(club_id, event_id) {
            return Ok(false);
        }
        if let Some(registration) = tables
            .registrations
            .iter_mut()
            .find(|r| r.id == registration_id)
        {
            registration.position = position.as_str().to_string();
        }
        Ok(true)
    }

    async fn admin_dashboard(&self) -> StoreResult<AdminDashboard> {
        let tables = self.tables.lock().await;
        let mut recent_events = tables.events.clone();
        by_date_desc(&mut recent_events);
        recent_events.truncate(DASHBOARD_LIMIT as usize);

        let mut recent_registrations = tables.details(|_| true);
        recent_registrations.truncate(DASHBOARD_LIMIT as usize);

        Ok(AdminDashboard {
            stats: AdminStats {
                total_events: tables.events.len() as i64,
                total_users: tables
                    .users
                    .iter()
                    .filter(|u| u.role == Role::User.as_str())
                    .count() as i64,
                total_registrations: tables.registrations.len() as i64,
            },
            recent_events,
            recent_registrations,
        })
    }

    async fn user_dashboard(&self, user_id: i32, today: NaiveDate) -> StoreResult<UserDashboard> {
        let tables = self.tables.lock().await;
        let mine = tables.registered_event_ids(user_id);
        let pick = |keep: &dyn Fn(&Event) -> bool, ascending: bool| {
            let mut events: Vec<_> = tables.events.iter().filter(|e| keep(e)).cloned().collect();
            if ascending {
                by_date_asc(&mut events);
            } else {
                by_date_desc(&mut events);
            }
            events.truncate(DASHBOARD_LIMIT as usize);
            events
        };

        Ok(UserDashboard {
            stats: UserStats {
                total_registrations: mine.len() as i64,
            },
            upcoming_events: pick(&|e| mine.contains(&e.id) && e.date >= today, true),
            past_events: pick(&|e| mine.contains(&e.id) && e.date < today, false),
            available_events: pick(&|e| !mine.contains(&e.id) && e.date >= today, true),
        })
    }
}
