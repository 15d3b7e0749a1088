use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
pub const TIME_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]");

time::serde::format_description!(pub(crate) pass_date, Date, "[year]-[month]-[day]");
time::serde::format_description!(pub(crate) pass_time, Time, "[hour]:[minute]");

/// The current instant, expressed in the configured event time zone.
pub fn now(offset: UtcOffset) -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(offset)
}

pub fn today(offset: UtcOffset) -> Date {
    now(offset).date()
}

/// Pins a wall-clock date and time to the event time zone.
pub fn at_offset(date: Date, time: Time, offset: UtcOffset) -> OffsetDateTime {
    PrimitiveDateTime::new(date, time).assume_offset(offset)
}

/// Drops seconds and anything finer.
pub fn whole_minutes(time: Time) -> Time {
    Time::from_hms(time.hour(), time.minute(), 0).unwrap_or(time)
}

pub fn parse_date(value: &str) -> Option<Date> {
    Date::parse(value.trim(), DATE_FORMAT).ok()
}

pub fn parse_time(value: &str) -> Option<Time> {
    Time::parse(value.trim(), TIME_FORMAT).ok()
}

/// Parses `+HH:MM` / `-HH:MM`.
pub fn parse_offset(value: &str) -> Option<UtcOffset> {
    let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
    UtcOffset::parse(value.trim(), format).ok()
}
