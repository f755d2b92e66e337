use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use diesel::{
    dsl::count_star,
    pg::Pg,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use diesel_async::{
    pooled_connection::{
        deadpool::{Object, Pool, PoolError},
        AsyncDieselConnectionManager,
    },
    scoped_futures::ScopedFutureExt,
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use std::collections::HashMap;

use super::{NewClub, NewEvent, NewUser, Store, StoreError, StoreResult, DASHBOARD_LIMIT};
use crate::{
    models::{
        AdminDashboard, AdminStats, Club, ClubSummary, Event, EventStatus, EventWithCount,
        Position, RegistrationDetail, Role, User, UserDashboard, UserStats,
        DEFAULT_REGISTRATION_STATUS,
    },
    schema::*,
};

pub type DbPool = Pool<AsyncPgConnection>;

pub fn connect_to_db(db_url: &str) -> anyhow::Result<DbPool> {
    let db_config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    Ok(Pool::builder(db_config).build()?)
}

impl From<DieselError> for StoreError {
    fn from(e: DieselError) -> StoreError {
        StoreError::Backend(e.into())
    }
}

impl From<PoolError> for StoreError {
    fn from(e: PoolError) -> StoreError {
        StoreError::Backend(e.into())
    }
}

type DetailColumns = (
    registrations::id,
    registrations::event_id,
    registrations::user_id,
    registrations::status,
    registrations::position,
    registrations::created_at,
    events::title,
    users::name,
    users::email,
);

const DETAIL_COLUMNS: DetailColumns = (
    registrations::id,
    registrations::event_id,
    registrations::user_id,
    registrations::status,
    registrations::position,
    registrations::created_at,
    events::title,
    users::name,
    users::email,
);

#[derive(Default)]
struct DetailFilter {
    event_id: Option<i32>,
    user_id: Option<i32>,
    limit: Option<i64>,
}

/// Postgres-backed [`Store`] on a pooled `diesel-async` connection.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<Object<AsyncPgConnection>> {
        Ok(self.pool.get().await?)
    }
}

async fn with_counts(
    conn: &mut AsyncPgConnection,
    events: Vec<Event>,
) -> StoreResult<Vec<EventWithCount>> {
    let counts: HashMap<i32, i64> = registrations::table
        .filter(registrations::event_id.eq_any(events.iter().map(|e| e.id).collect::<Vec<_>>()))
        .group_by(registrations::event_id)
        .select((registrations::event_id, count_star()))
        .load::<(i32, i64)>(conn)
        .await?
        .into_iter()
        .collect();

    Ok(events
        .into_iter()
        .map(|event| EventWithCount {
            registration_count: counts.get(&event.id).copied().unwrap_or(0),
            event,
        })
        .collect())
}

async fn load_details(
    conn: &mut AsyncPgConnection,
    filter: DetailFilter,
) -> StoreResult<Vec<RegistrationDetail>> {
    let mut query = registrations::table
        .inner_join(events::table)
        .inner_join(users::table)
        .select(DETAIL_COLUMNS)
        .order((registrations::created_at.desc(), registrations::id.desc()))
        .into_boxed::<Pg>();

    if let Some(event_id) = filter.event_id {
        query = query.filter(registrations::event_id.eq(event_id));
    }
    if let Some(user_id) = filter.user_id {
        query = query.filter(registrations::user_id.eq(user_id));
    }
    if let Some(limit) = filter.limit {
        query = query.limit(limit);
    }

    Ok(query.load::<RegistrationDetail>(conn).await?)
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<i32> {
        #[derive(Insertable)]
        #[diesel(table_name = users)]
        struct UserRow<'a> {
            name: &'a str,
            email: &'a str,
            password_hash: &'a str,
            role: &'a str,
            is_verified: bool,
            otp: Option<&'a str>,
            otp_expires_at: Option<NaiveDateTime>,
        }

        let conn = &mut self.conn().await?;

        diesel::insert_into(users::table)
            .values(UserRow {
                name: &user.name,
                email: &user.email,
                password_hash: &user.password_hash,
                role: user.role.as_str(),
                is_verified: false,
                otp: Some(user.otp.as_str()),
                otp_expires_at: Some(user.otp_expires_at),
            })
            .on_conflict(users::email)
            .do_nothing()
            .returning(users::id)
            .get_result::<i32>(conn)
            .await
            .optional()?
            .ok_or(StoreError::DuplicateEmail)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let conn = &mut self.conn().await?;

        Ok(users::table
            .filter(users::email.eq(email))
            .first::<User>(conn)
            .await
            .optional()?)
    }

    async fn verify_otp(&self, email: &str, otp: &str, now: NaiveDateTime) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;

        let updated = diesel::update(
            users::table
                .filter(users::email.eq(email))
                .filter(users::otp.eq(otp))
                .filter(users::otp_expires_at.gt(now)),
        )
        .set((
            users::is_verified.eq(true),
            users::otp.eq(None::<String>),
            users::otp_expires_at.eq(None::<NaiveDateTime>),
        ))
        .execute(conn)
        .await?;

        Ok(updated > 0)
    }

    async fn create_club(&self, club: NewClub) -> StoreResult<i32> {
        #[derive(Insertable)]
        #[diesel(table_name = clubs)]
        struct ClubRow<'a> {
            name: &'a str,
            description: Option<&'a str>,
            password_hash: &'a str,
        }

        let conn = &mut self.conn().await?;

        diesel::insert_into(clubs::table)
            .values(ClubRow {
                name: &club.name,
                description: club.description.as_deref(),
                password_hash: &club.password_hash,
            })
            .on_conflict(clubs::name)
            .do_nothing()
            .returning(clubs::id)
            .get_result::<i32>(conn)
            .await
            .optional()?
            .ok_or(StoreError::DuplicateClub)
    }

    async fn list_clubs(&self) -> StoreResult<Vec<ClubSummary>> {
        let conn = &mut self.conn().await?;

        Ok(clubs::table
            .select((clubs::id, clubs::name, clubs::description))
            .order(clubs::id)
            .load::<ClubSummary>(conn)
            .await?)
    }

    async fn find_club(&self, club_id: i32) -> StoreResult<Option<Club>> {
        let conn = &mut self.conn().await?;

        Ok(clubs::table
            .find(club_id)
            .first::<Club>(conn)
            .await
            .optional()?)
    }

    async fn create_event(&self, event: NewEvent) -> StoreResult<i32> {
        #[derive(Insertable)]
        #[diesel(table_name = events)]
        struct EventRow<'a> {
            club_id: i32,
            title: &'a str,
            description: Option<&'a str>,
            date: NaiveDate,
            venue: Option<&'a str>,
            time: Option<&'a str>,
            status: &'a str,
            created_by: i32,
        }

        let conn = &mut self.conn().await?;

        Ok(diesel::insert_into(events::table)
            .values(EventRow {
                club_id: event.club_id,
                title: &event.title,
                description: event.description.as_deref(),
                date: event.date,
                venue: event.venue.as_deref(),
                time: event.time.as_deref(),
                status: event.status.as_str(),
                created_by: event.created_by,
            })
            .returning(events::id)
            .get_result::<i32>(conn)
            .await?)
    }

    async fn find_event(&self, event_id: i32) -> StoreResult<Option<Event>> {
        let conn = &mut self.conn().await?;

        Ok(events::table
            .find(event_id)
            .first::<Event>(conn)
            .await
            .optional()?)
    }

    async fn club_events(&self, club_id: i32) -> StoreResult<Vec<Event>> {
        let conn = &mut self.conn().await?;

        Ok(events::table
            .filter(events::club_id.eq(club_id))
            .order((events::date.desc(), events::id.desc()))
            .load::<Event>(conn)
            .await?)
    }

    async fn club_events_with_counts(&self, club_id: i32) -> StoreResult<Vec<EventWithCount>> {
        let conn = &mut self.conn().await?;

        let events = events::table
            .filter(events::club_id.eq(club_id))
            .order((events::date.desc(), events::id.desc()))
            .load::<Event>(conn)
            .await?;

        with_counts(conn, events).await
    }

    async fn events_by_status(&self, status: EventStatus) -> StoreResult<Vec<EventWithCount>> {
        let conn = &mut self.conn().await?;

        let query = events::table
            .filter(events::status.eq(status.as_str()))
            .into_boxed::<Pg>();
        let query = match status {
            EventStatus::Upcoming => query.order((events::date.asc(), events::id.asc())),
            EventStatus::Past => query.order((events::date.desc(), events::id.desc())),
        };
        let events = query.load::<Event>(conn).await?;

        with_counts(conn, events).await
    }

    async fn update_event_status(
        &self,
        club_id: i32,
        event_id: i32,
        status: EventStatus,
    ) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;

        let updated = diesel::update(
            events::table
                .filter(events::id.eq(event_id))
                .filter(events::club_id.eq(club_id)),
        )
        .set(events::status.eq(status.as_str()))
        .execute(conn)
        .await?;

        Ok(updated > 0)
    }

    async fn delete_event(&self, club_id: i32, event_id: i32) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;

        conn.transaction::<bool, DieselError, _>(|conn| {
            async move {
                let owned = events::table
                    .filter(events::id.eq(event_id))
                    .filter(events::club_id.eq(club_id))
                    .select(events::id)
                    .first::<i32>(conn)
                    .await
                    .optional()?;
                if owned.is_none() {
                    return Ok(false);
                }

                let removed = diesel::delete(
                    registrations::table.filter(registrations::event_id.eq(event_id)),
                )
                .execute(conn)
                .await?;
                diesel::delete(events::table.find(event_id))
                    .execute(conn)
                    .await?;

                tracing::debug!(event_id, removed, "deleted event with its registrations");
                Ok(true)
            }
            .scope_boxed()
        })
        .await
        .map_err(|e| StoreError::DeletionFailed(e.into()))
    }

    async fn create_registration(&self, event_id: i32, user_id: i32) -> StoreResult<i32> {
        #[derive(Insertable)]
        #[diesel(table_name = registrations)]
        struct RegistrationRow<'a> {
            event_id: i32,
            user_id: i32,
            status: &'a str,
            position: &'a str,
        }

        let conn = &mut self.conn().await?;

        let event = events::table
            .find(event_id)
            .select(events::id)
            .first::<i32>(conn)
            .await
            .optional()?;
        if event.is_none() {
            return Err(StoreError::EventNotFound);
        }

        let inserted = diesel::insert_into(registrations::table)
            .values(RegistrationRow {
                event_id,
                user_id,
                status: DEFAULT_REGISTRATION_STATUS,
                position: Position::Participation.as_str(),
            })
            .on_conflict((registrations::event_id, registrations::user_id))
            .do_nothing()
            .returning(registrations::id)
            .get_result::<i32>(conn)
            .await
            .optional();

        match inserted {
            Ok(Some(id)) => Ok(id),
            Ok(None) => Err(StoreError::AlreadyRegistered),
            // the event was deleted between the lookup and the insert
            Err(DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)) => {
                Err(StoreError::EventNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn event_registrations(&self, event_id: i32) -> StoreResult<Vec<RegistrationDetail>> {
        let conn = &mut self.conn().await?;

        load_details(
            conn,
            DetailFilter {
                event_id: Some(event_id),
                ..Default::default()
            },
        )
        .await
    }

    async fn registrations(&self, user_id: Option<i32>) -> StoreResult<Vec<RegistrationDetail>> {
        let conn = &mut self.conn().await?;

        load_details(
            conn,
            DetailFilter {
                user_id,
                ..Default::default()
            },
        )
        .await
    }

    async fn set_registration_position(
        &self,
        club_id: i32,
        registration_id: i32,
        position: Position,
    ) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;

        let club_events = events::table
            .filter(events::club_id.eq(club_id))
            .select(events::id);
        let updated = diesel::update(
            registrations::table
                .filter(registrations::id.eq(registration_id))
                .filter(registrations::event_id.eq_any(club_events)),
        )
        .set(registrations::position.eq(position.as_str()))
        .execute(conn)
        .await?;

        Ok(updated > 0)
    }

    async fn admin_dashboard(&self) -> StoreResult<AdminDashboard> {
        let conn = &mut self.conn().await?;

        let total_events = events::table.count().get_result::<i64>(conn).await?;
        let total_users = users::table
            .filter(users::role.eq(Role::User.as_str()))
            .count()
            .get_result::<i64>(conn)
            .await?;
        let total_registrations = registrations::table
            .count()
            .get_result::<i64>(conn)
            .await?;

        let recent_events = events::table
            .order((events::date.desc(), events::id.desc()))
            .limit(DASHBOARD_LIMIT)
            .load::<Event>(conn)
            .await?;
        let recent_registrations = load_details(
            conn,
            DetailFilter {
                limit: Some(DASHBOARD_LIMIT),
                ..Default::default()
            },
        )
        .await?;

        Ok(AdminDashboard {
            stats: AdminStats {
                total_events,
                total_users,
                total_registrations,
            },
            recent_events,
            recent_registrations,
        })
    }

    async fn user_dashboard(&self, user_id: i32, today: NaiveDate) -> StoreResult<UserDashboard> {
        let conn = &mut self.conn().await?;

        let total_registrations = registrations::table
            .filter(registrations::user_id.eq(user_id))
            .count()
            .get_result::<i64>(conn)
            .await?;

        let upcoming_events = events::table
            .inner_join(registrations::table)
            .filter(registrations::user_id.eq(user_id))
            .filter(events::date.ge(today))
            .select(events::all_columns)
            .order((events::date.asc(), events::id.asc()))
            .limit(DASHBOARD_LIMIT)
            .load::<Event>(conn)
            .await?;

        let past_events = events::table
            .inner_join(registrations::table)
            .filter(registrations::user_id.eq(user_id))
            .filter(events::date.lt(today))
            .select(events::all_columns)
            .order((events::date.desc(), events::id.desc()))
            .limit(DASHBOARD_LIMIT)
            .load::<Event>(conn)
            .await?;

        let mine = registrations::table
            .filter(registrations::user_id.eq(user_id))
            .select(registrations::event_id);
        let available_events = events::table
            .filter(events::date.ge(today))
            .filter(events::id.ne_all(mine))
            .order((events::date.asc(), events::id.asc()))
            .limit(DASHBOARD_LIMIT)
            .load::<Event>(conn)
            .await?;

        Ok(UserDashboard {
            stats: UserStats {
                total_registrations,
            },
            upcoming_events,
            past_events,
            available_events,
        })
    }
}
