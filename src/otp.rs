//! One-time codes that confirm ownership of a signup email address.

use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use std::ops::RangeInclusive;

use crate::email::Mail;

pub const OTP_RANGE: RangeInclusive<u32> = 100_000..=999_999;
pub const OTP_TTL_MINUTES: i64 = 10;

pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(OTP_RANGE).to_string()
}

pub fn expires_at(issued_at: NaiveDateTime) -> NaiveDateTime {
    issued_at + Duration::minutes(OTP_TTL_MINUTES)
}

/// Emails are stored and looked up trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn verification_mail(email: &str, otp: &str) -> Mail {
    Mail {
        to: email.to_string(),
        subject: "Verify your email".to_string(),
        body: format!("Your OTP is {otp}. It is valid for {OTP_TTL_MINUTES} minutes."),
        attachments: Vec::new(),
    }
}
