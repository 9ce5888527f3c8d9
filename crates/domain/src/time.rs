//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for events and relay messages.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Milliseconds since the Unix epoch, the clock used on the relay wire.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
