//! UTC reset-boundary arithmetic.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};

/// The next UTC midnight strictly after `now`.
pub(crate) fn next_daily_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + Days::new(1);
    Utc.from_utc_datetime(&tomorrow.and_time(NaiveTime::MIN))
}

/// Midnight UTC on the first of the month after `now`, handling the
/// December → January year rollover.
pub(crate) fn next_monthly_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .expect("first of a month is always a valid date");
    Utc.from_utc_datetime(&first.and_time(NaiveTime::MIN))
}
