use std::cmp::Reverse;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time, UtcOffset};

use crate::error::{EqrError, EqrResult};
use crate::util::{at_offset, whole_minutes, TIME_FORMAT};

pub mod attendance;
pub mod pass;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    /// The ID of the event
    pub id: i64,
    /// The name of the event
    pub name: String,
    /// The day the event is held
    pub date: Date,
    /// When members are expected to arrive, if there is a set time
    pub start_time: Option<Time>,
    /// When the event is over, if there is a set time
    pub end_time: Option<Time>,
    /// When the event was created
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Event {
    /// The moment the event starts in the event time zone, if it has a
    /// start time at all.
    pub fn start_datetime(&self, offset: UtcOffset) -> Option<OffsetDateTime> {
        self.start_time
            .map(|start_time| at_offset(self.date, start_time, offset))
    }

    pub fn time_slot(&self) -> String {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => format!(
                "{} - {}",
                start.format(TIME_FORMAT).unwrap_or_default(),
                end.format(TIME_FORMAT).unwrap_or_default()
            ),
            _ => "All day".to_owned(),
        }
    }

    /// Whether changing this event to `update` would make issued passes
    /// carry a stale schedule.
    pub fn schedule_differs(&self, update: &NewEvent) -> bool {
        self.name != update.name
            || self.date != update.date
            || self.start_time != update.start_time
            || self.end_time != update.end_time
    }
}

/// Orderings offered by the event list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSort {
    /// By day, later start first within a day
    #[default]
    Date,
    /// Alphabetically, then by day
    Name,
    /// By day, then earliest start first
    Time,
}

impl EventSort {
    pub fn sort(self, events: &mut [Event]) {
        match self {
            EventSort::Date => events.sort_by_key(|event| (event.date, Reverse(event.start_time))),
            EventSort::Name => events.sort_by(|a, b| (&a.name, a.date).cmp(&(&b.name, b.date))),
            EventSort::Time => events.sort_by_key(|event| (event.date, event.start_time)),
        }
    }
}

impl FromStr for EventSort {
    type Err = EqrError;

    /// Unknown orderings fall back to sorting by date.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim().to_ascii_lowercase().as_str() {
            "name" => EventSort::Name,
            "time" => EventSort::Time,
            _ => EventSort::Date,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewEvent {
    pub name: String,
    pub date: Date,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
}

impl NewEvent {
    /// Validation for a freshly created event: the schedule must be sane
    /// and the date can't already be over.
    pub fn validate(self, today: Date) -> EqrResult<Self> {
        let event = self.validate_edit()?;
        if event.date < today {
            return Err(EqrError::BadRequest(
                "Event date cannot be in the past".to_owned(),
            ));
        }

        Ok(event)
    }

    /// Validation for an edit to an existing event. Past dates are allowed
    /// so old events can be corrected. Times are cut to the minute, the
    /// precision passes carry.
    pub fn validate_edit(self) -> EqrResult<Self> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(EqrError::BadRequest("Event name must not be empty".to_owned()));
        }

        let start_time = self.start_time.map(whole_minutes);
        let end_time = self.end_time.map(whole_minutes);
        if let (Some(start), Some(end)) = (start_time, end_time) {
            if start.hour() >= 12 && end.hour() < 12 {
                return Err(EqrError::BadRequest(
                    "Events cannot span overnight (start PM and end AM)".to_owned(),
                ));
            }
            if start >= end {
                return Err(EqrError::BadRequest(
                    "Start time must be before end time".to_owned(),
                ));
            }
        }

        Ok(Self {
            name,
            date: self.date,
            start_time,
            end_time,
        })
    }
}
