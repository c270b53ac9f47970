//! Time and timestamp helpers.
//!
//! The persisted document stores all timestamps as unix-epoch milliseconds,
//! so that is the representation used throughout.

use chrono::Utc;

/// Unix-epoch milliseconds, used for `onTime`, `offTime`, `last`,
/// `lastSuccess`, etc.
pub type UnixMillis = i64;

/// Return the current time as unix-epoch milliseconds.
#[must_use]
pub fn now_millis() -> UnixMillis {
    Utc::now().timestamp_millis()
}
