//! Domain model module declarations.

use chrono::Utc;

pub mod message;
pub mod presence;
pub mod session;

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
