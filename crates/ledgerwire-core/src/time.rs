//! Wire timestamps.
//!
//! Envelopes carry UTC nanoseconds shifted right by six bits, which keeps
//! the value monotonic while fitting comfortably in an `i64`.

use chrono::{DateTime, Utc};

/// Wire timestamp for the current instant.
pub fn wire_timestamp() -> i64 {
    wire_timestamp_at(Utc::now())
}

/// Wire timestamp for `at`. Instants outside the nanosecond range map to 0.
pub fn wire_timestamp_at(at: DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt().map_or(0, |nanos| nanos >> 6)
}
