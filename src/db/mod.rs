//! The storage seam. Every method is one atomic unit against the backing
//! store; upserts are keyed by the record's unique pair and report
//! whether they inserted.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::EqrResult;
use crate::models::{Attendance, AttendanceStatus, Event, Member, NewEvent, NewMember, Pass};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn member(&self, member_id: &str) -> EqrResult<Option<Member>>;

    /// All members, ordered by last then first name.
    async fn members(&self) -> EqrResult<Vec<Member>>;

    /// Fails with a conflict if the ID or email is taken.
    async fn insert_member(&self, member: &NewMember) -> EqrResult<Member>;

    /// Overwrites a member's details, keeping their ID. Fails with a
    /// conflict if the new email belongs to someone else.
    async fn update_member(&self, member_id: &str, member: &NewMember) -> EqrResult<Member>;

    /// Also removes the member's passes and attendance.
    async fn delete_member(&self, member_id: &str) -> EqrResult<bool>;

    /// Deletes every listed member in one unit, returning how many existed.
    async fn delete_members(&self, member_ids: &[String]) -> EqrResult<usize>;

    async fn event(&self, event_id: i64) -> EqrResult<Option<Event>>;

    /// All events, ordered by date.
    async fn events(&self) -> EqrResult<Vec<Event>>;

    async fn insert_event(&self, event: &NewEvent) -> EqrResult<Event>;

    /// Overwrites an event's details. With `clear_passes`, every pass
    /// issued for the event is deleted in the same unit.
    async fn update_event(
        &self,
        event_id: i64,
        event: &NewEvent,
        clear_passes: bool,
    ) -> EqrResult<Event>;

    /// Also removes the event's passes and attendance.
    async fn delete_event(&self, event_id: i64) -> EqrResult<bool>;

    async fn pass(&self, member_id: &str, event_id: i64) -> EqrResult<Option<Pass>>;

    async fn passes_for_event(&self, event_id: i64) -> EqrResult<Vec<Pass>>;

    async fn upsert_pass(
        &self,
        member_id: &str,
        event_id: i64,
        encrypted_data: &str,
        issued_at: OffsetDateTime,
    ) -> EqrResult<(Pass, bool)>;

    async fn attendance(&self, event_id: i64, member_id: &str) -> EqrResult<Option<Attendance>>;

    async fn attendance_for_event(&self, event_id: i64) -> EqrResult<Vec<Attendance>>;

    /// Newest first.
    async fn attendance_for_member(&self, member_id: &str) -> EqrResult<Vec<Attendance>>;

    async fn upsert_attendance(
        &self,
        event_id: i64,
        member_id: &str,
        status: AttendanceStatus,
        timestamp: OffsetDateTime,
    ) -> EqrResult<(Attendance, bool)>;

    /// Upserts a status for each listed member at one event. Either every
    /// record is written or none is.
    async fn record_roster(
        &self,
        event_id: i64,
        statuses: &[(String, AttendanceStatus)],
        timestamp: OffsetDateTime,
    ) -> EqrResult<usize>;
}
