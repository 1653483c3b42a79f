//! Domain Services
//!
//! Pure reporting-cycle arithmetic. A cycle starts every day at a fixed
//! local time in a fixed UTC offset.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};

/// Start of the cycle containing `now`: today's boundary if the local time
/// of day has reached it, otherwise yesterday's.
pub fn most_recent_cycle_boundary(
    now: DateTime<Utc>,
    boundary: NaiveTime,
    offset: FixedOffset,
) -> DateTime<FixedOffset> {
    let local = now.with_timezone(&offset);
    let today = boundary_on(local.date_naive(), boundary, offset);
    if local >= today {
        today
    } else {
        today - Duration::days(1)
    }
}

/// First boundary strictly after `now`
pub fn next_cycle_boundary(
    now: DateTime<Utc>,
    boundary: NaiveTime,
    offset: FixedOffset,
) -> DateTime<FixedOffset> {
    most_recent_cycle_boundary(now, boundary, offset) + Duration::days(1)
}

fn boundary_on(date: NaiveDate, boundary: NaiveTime, offset: FixedOffset) -> DateTime<FixedOffset> {
    let utc = date.and_time(boundary) - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, offset)
}
