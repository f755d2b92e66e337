use crate::schema::*;
use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_verified: bool,
    pub otp: Option<String>,
    pub otp_expires_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct Club {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub password_hash: String,
}

/// The public face of a club. The password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Serialize)]
pub struct ClubSummary {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

impl From<&Club> for ClubSummary {
    fn from(club: &Club) -> Self {
        Self {
            id: club.id,
            name: club.name.clone(),
            description: club.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Associations, Serialize)]
#[diesel(belongs_to(Club))]
pub struct Event {
    pub id: i32,
    pub club_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub venue: Option<String>,
    pub time: Option<String>,
    pub status: String,
    pub created_by: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventWithCount {
    #[serde(flatten)]
    pub event: Event,
    pub registration_count: i64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Event))]
#[diesel(belongs_to(User))]
pub struct Registration {
    pub id: i32,
    pub event_id: i32,
    pub user_id: i32,
    pub status: String,
    pub position: String,
    pub created_at: NaiveDateTime,
}

/// A registration joined with its event title and registrant.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Serialize)]
pub struct RegistrationDetail {
    pub id: i32,
    pub event_id: i32,
    pub user_id: i32,
    pub status: String,
    pub position: String,
    pub created_at: NaiveDateTime,
    pub event_title: String,
    pub user_name: String,
    pub user_email: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_events: i64,
    pub total_users: i64,
    pub total_registrations: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub stats: AdminStats,
    pub recent_events: Vec<Event>,
    pub recent_registrations: Vec<RegistrationDetail>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_registrations: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDashboard {
    pub stats: UserStats,
    pub upcoming_events: Vec<Event>,
    pub past_events: Vec<Event>,
    pub available_events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    /// Role carried by a session token.
    Role, "role" {
        User => "user",
        Admin => "admin",
    }
);

string_enum!(
    EventStatus, "event status" {
        Upcoming => "upcoming",
        Past => "past",
    }
);

string_enum!(
    /// Placement of a registrant in a competition event.
    Position, "position" {
        Participation => "participation",
        Winner => "winner",
        Runner => "runner",
    }
);

impl Position {
    pub fn title(&self) -> &'static str {
        match self {
            Position::Winner => "Winner",
            Position::Runner => "Runner-up",
            Position::Participation => "Participation",
        }
    }
}

pub const DEFAULT_REGISTRATION_STATUS: &str = "pending";
