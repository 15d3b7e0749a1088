pub mod event;
pub mod member;

pub use event::attendance::{Attendance, AttendanceStatus, AttendanceSummary};
pub use event::pass::Pass;
pub use event::{Event, EventSort, NewEvent};
pub use member::{Member, NewMember};

/// Trims a form value, treating blank input as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
