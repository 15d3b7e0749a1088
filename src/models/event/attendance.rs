//! Attendance records and the rules that decide a member's status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::models::event::Event;

/// Minutes after an event's start during which an arrival still counts
/// as on time.
pub const LATE_GRACE_MINUTES: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "attendance_status", rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

impl AttendanceStatus {
    pub const ALL: [Self; 3] = [Self::Present, Self::Late, Self::Absent];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Absent => "absent",
        }
    }

    /// Whether the member showed up at all.
    pub fn is_attended(&self) -> bool {
        !matches!(self, AttendanceStatus::Absent)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value.trim())
            .ok_or_else(|| format!("Invalid status '{}'", value))
    }
}

/// The status an arrival at `arrival` earns for `event`.
///
/// Without a start time there is nothing to be late for. Otherwise the
/// arrival is compared against the event's date and start time in
/// `offset`; up to [`LATE_GRACE_MINUTES`] after the start is `present`,
/// anything later is `late`.
pub fn compute_status(
    event: &Event,
    arrival: OffsetDateTime,
    offset: UtcOffset,
) -> AttendanceStatus {
    let Some(start) = event.start_datetime(offset) else {
        return AttendanceStatus::Present;
    };

    let delta_minutes = (arrival - start).as_seconds_f64() / 60.0;
    if delta_minutes <= LATE_GRACE_MINUTES {
        AttendanceStatus::Present
    } else {
        AttendanceStatus::Late
    }
}

/// An explicitly chosen status always wins, `absent` included. Only an
/// unset status is derived from timing.
pub fn resolve_status(
    explicit: Option<AttendanceStatus>,
    event: &Event,
    arrival: OffsetDateTime,
    offset: UtcOffset,
) -> AttendanceStatus {
    explicit.unwrap_or_else(|| compute_status(event, arrival, offset))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attendance {
    /// The ID of the event this attendance is for
    pub event_id: i64,
    /// The member this attendance belongs to
    pub member_id: String,
    /// Whether the member was present, late, or absent
    pub status: AttendanceStatus,
    /// When the attendance was last recorded
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Headcount for one event. Members with no attendance row count as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub total_members: usize,
    pub present_percentage: u32,
    pub late_percentage: u32,
    pub absent_percentage: u32,
}

impl AttendanceSummary {
    pub fn tally(records: &[Attendance], total_members: usize) -> Self {
        let count = |status| {
            records
                .iter()
                .filter(|record| record.status == status)
                .count()
        };
        let present = count(AttendanceStatus::Present);
        let late = count(AttendanceStatus::Late);
        let absent = total_members.saturating_sub(present + late);

        let percentage = |count: usize| {
            if total_members == 0 {
                0
            } else {
                (count as f64 / total_members as f64 * 100.0).round() as u32
            }
        };

        Self {
            present,
            late,
            absent,
            total_members,
            present_percentage: percentage(present),
            late_percentage: percentage(late),
            absent_percentage: percentage(absent),
        }
    }
}
