use chrono::{DateTime, TimeZone, Timelike, Utc};

pub const MINUTES_IN_DAY: u32 = 1440;
/// Half-width of the time-of-day window, in minutes.
pub const TIME_WINDOW: u32 = 30;

pub const MIN_BOOST: f64 = 0.5;
pub const NEUTRAL_BOOST: f64 = 1.0;

/// Local wall-clock minute of day (`hour * 60 + minute`) for a unix timestamp in milliseconds.
pub fn minute_of_day<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> Option<u32> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|utc| utc.with_timezone(tz))
        .map(|local| local.hour() * 60 + local.minute())
}

pub fn current_minute_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> u32 {
    now.hour() * 60 + now.minute()
}

/// Minutes within `radius` of `current`, wrapping across midnight.
pub fn window_minutes(current: u32, radius: u32) -> Vec<u32> {
    let day = i64::from(MINUTES_IN_DAY);
    let center = i64::from(current % MINUTES_IN_DAY);
    let radius = i64::from(radius.min(MINUTES_IN_DAY / 2));

    (-radius..=radius)
        .map(|offset| ((center + offset + day) % day) as u32)
        .collect()
}

/// `0.5 + nearby / total`, or neutral when the domain has no history.
pub fn boost_from_counts(nearby: i64, total: i64) -> f64 {
    if total <= 0 {
        return NEUTRAL_BOOST;
    }

    let ratio = (nearby.clamp(0, total) as f64) / (total as f64);
    MIN_BOOST + ratio
}
