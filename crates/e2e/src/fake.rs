//! Throwaway test data

use chrono::{Days, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const PASSWORD_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
const PASSWORD_LEN: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FakeUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
    pub created_date: NaiveDate,
}

pub struct FakeData;

impl FakeData {
    /// Unique-per-millisecond address that no account is registered under
    pub fn email() -> String {
        format!("test.user{}@example.com", Utc::now().timestamp_millis())
    }

    pub fn username() -> String {
        format!("testuser_{}", Utc::now().timestamp_millis())
    }

    pub fn password() -> String {
        let mut rng = rand::thread_rng();
        (0..PASSWORD_LEN)
            .map(|_| PASSWORD_CHARS[rng.gen_range(0..PASSWORD_CHARS.len())] as char)
            .collect()
    }

    /// `+1` followed by ten digits
    pub fn phone_number() -> String {
        let mut rng = rand::thread_rng();
        let digits: String = (0..10).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect();
        format!("+1{}", digits)
    }

    /// Random day from Jan 1 of `start_year` through Dec 31 of `end_year`
    pub fn date_between(start_year: i32, end_year: i32) -> Option<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(start_year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(end_year, 12, 31)?;
        let span = (end - start).num_days();
        if span < 0 {
            return None;
        }
        let offset = rand::thread_rng().gen_range(0..=span as u64);
        start.checked_add_days(Days::new(offset))
    }

    pub fn date() -> NaiveDate {
        Self::date_between(2000, 2023).unwrap_or_default()
    }

    pub fn user() -> FakeUser {
        FakeUser {
            username: Self::username(),
            email: Self::email(),
            password: Self::password(),
            phone_number: Self::phone_number(),
            created_date: Self::date(),
        }
    }
}
