//! Issuing passes and turning scans into attendance.
//!
//! A [Tracker](crate::tracker::Tracker) owns the pass codec and a handle
//! to the [Store](crate::db::Store). Every operation takes plain
//! identifiers and returns a plain result, so any front end (the `eqr`
//! binary, a web handler) can drive it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use time::{Date, Duration, OffsetDateTime, UtcOffset};
use tracing::{info, warn};

use crate::access::Actor;
use crate::config::Config;
use crate::db::Store;
use crate::error::{EqrError, EqrResult};
use crate::models::event::attendance::{compute_status, resolve_status};
use crate::models::{
    Attendance, AttendanceStatus, AttendanceSummary, Event, EventSort, Member, NewEvent,
    NewMember, Pass,
};
use crate::pass::{PassCodec, PassPayload};
use crate::util;

/// How many days ahead a member's dashboard looks for events.
pub const UPCOMING_DAYS: i64 = 7;

/// How many past records a member's dashboard shows.
pub const HISTORY_LIMIT: usize = 10;

pub struct Tracker<S> {
    store: Arc<S>,
    codec: PassCodec,
    utc_offset: UtcOffset,
    derive_scan_status: bool,
}

impl<S> Clone for Tracker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            codec: self.codec.clone(),
            utc_offset: self.utc_offset,
            derive_scan_status: self.derive_scan_status,
        }
    }
}

/// The result of a scan that registered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub attendance: Attendance,
    pub member: Member,
    /// Whether this was the member's first scan for the event
    pub created: bool,
    /// Whether the code was an unencrypted pass from before encryption
    pub legacy: bool,
}

impl ScanOutcome {
    pub fn message(&self) -> String {
        let action = if self.created { "registered" } else { "updated" };
        format!("Attendance {} for {}", action, self.member.full_name())
    }
}

/// One line of a member's attendance history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttendanceHistoryEntry {
    pub event: Event,
    pub attendance: Attendance,
}

impl<S: Store> Tracker<S> {
    pub fn new(store: Arc<S>, config: &Config) -> EqrResult<Self> {
        Ok(Self::with_codec(store, PassCodec::new(config)?, config))
    }

    pub fn with_codec(store: Arc<S>, codec: PassCodec, config: &Config) -> Self {
        Self {
            store,
            codec,
            utc_offset: config.utc_offset,
            derive_scan_status: config.derive_scan_status,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn codec(&self) -> &PassCodec {
        &self.codec
    }

    fn now(&self) -> OffsetDateTime {
        util::now(self.utc_offset)
    }

    async fn load_member(&self, member_id: &str) -> EqrResult<Member> {
        self.store
            .member(member_id)
            .await?
            .ok_or(EqrError::NotFound("member"))
    }

    async fn load_event(&self, event_id: i64) -> EqrResult<Event> {
        self.store
            .event(event_id)
            .await?
            .ok_or(EqrError::NotFound("event"))
    }

    /// Encodes a fresh pass and stores it over any previous one. Nothing
    /// is written if encoding fails.
    async fn issue(&self, member: &Member, event: &Event) -> EqrResult<Pass> {
        let payload = PassPayload::new(member, event, self.now());
        let encrypted_data = self.codec.encode(&payload)?;

        let (pass, created) = self
            .store
            .upsert_pass(&member.member_id, event.id, &encrypted_data, payload.timestamp)
            .await?;
        info!(
            member_id = %member.member_id,
            event_id = event.id,
            created,
            "issued pass"
        );

        Ok(pass)
    }

    pub async fn issue_pass(&self, member_id: &str, event_id: i64) -> EqrResult<Pass> {
        let member = self.load_member(member_id).await?;
        let event = self.load_event(event_id).await?;

        self.issue(&member, &event).await
    }

    pub async fn get_or_issue_pass(&self, member_id: &str, event_id: i64) -> EqrResult<Pass> {
        if let Some(pass) = self.store.pass(member_id, event_id).await? {
            return Ok(pass);
        }

        self.issue_pass(member_id, event_id).await
    }

    /// Issues a pass to each member in turn. A member whose pass can't be
    /// issued is logged and skipped; the return value counts the rest.
    pub async fn bulk_issue_passes(&self, event_id: i64, members: &[Member]) -> EqrResult<usize> {
        let event = self.load_event(event_id).await?;

        let mut issued = 0;
        for member in members {
            match self.issue(member, &event).await {
                Ok(_) => issued += 1,
                Err(err) => warn!(
                    member_id = %member.member_id,
                    event_id,
                    error = %err,
                    "skipping pass that could not be issued"
                ),
            }
        }
        info!(event_id, issued, attempted = members.len(), "bulk issued passes");

        Ok(issued)
    }

    /// Regenerates every member's pass for an event. Staff only.
    pub async fn generate_event_passes(&self, actor: &Actor, event_id: i64) -> EqrResult<usize> {
        actor.ensure_staff()?;
        let members = self.store.members().await?;

        self.bulk_issue_passes(event_id, &members).await
    }

    /// The pass shown on a member's own dashboard, issued on first view.
    pub async fn dashboard_pass(&self, actor: &Actor, event_id: i64) -> EqrResult<Pass> {
        let member_id = actor.member_id()?;

        self.get_or_issue_pass(member_id, event_id).await
    }

    pub fn compute_status(&self, event: &Event, arrival: OffsetDateTime) -> AttendanceStatus {
        compute_status(event, arrival, self.utc_offset)
    }

    /// Registers a scanned code as attendance at `event_id`.
    ///
    /// Tagged codes must decrypt with this tracker's key; untagged codes
    /// are read as legacy JSON. Either way the code has to name a member
    /// and be bound to this event. A repeat scan updates the existing
    /// record.
    pub async fn ingest_scan(&self, event_id: i64, raw: &str) -> EqrResult<ScanOutcome> {
        let outcome = self.register_scan(event_id, raw).await;
        match &outcome {
            Ok(scan) => info!(
                event_id,
                member_id = %scan.member.member_id,
                created = scan.created,
                legacy = scan.legacy,
                status = %scan.attendance.status,
                "scan registered"
            ),
            Err(err) => warn!(event_id, error = %err, "scan rejected"),
        }

        outcome
    }

    async fn register_scan(&self, event_id: i64, raw: &str) -> EqrResult<ScanOutcome> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(EqrError::EmptyScan);
        }

        let event = self.load_event(event_id).await?;
        let scanned = self.codec.classify(raw);
        let claim = scanned.claim().ok_or(EqrError::InvalidPass)?;
        let member_id = claim
            .member_for(event.id)
            .ok_or(EqrError::BindingMismatch)?;
        let member = self.load_member(member_id).await?;

        let arrival = self.now();
        let status = if self.derive_scan_status {
            self.compute_status(&event, arrival)
        } else {
            AttendanceStatus::Present
        };
        let (attendance, created) = self
            .store
            .upsert_attendance(event.id, &member.member_id, status, arrival)
            .await?;

        Ok(ScanOutcome {
            attendance,
            member,
            created,
            legacy: scanned.is_legacy(),
        })
    }

    /// Sets one member's status by hand. With no status given, the status
    /// is derived from the current time.
    pub async fn record_status(
        &self,
        event_id: i64,
        member_id: &str,
        status: Option<AttendanceStatus>,
    ) -> EqrResult<Attendance> {
        let event = self.load_event(event_id).await?;
        let member = self.load_member(member_id).await?;

        let recorded_at = self.now();
        let status = resolve_status(status, &event, recorded_at, self.utc_offset);
        let (attendance, _) = self
            .store
            .upsert_attendance(event.id, &member.member_id, status, recorded_at)
            .await?;

        Ok(attendance)
    }

    /// Saves a whole roster at once. Every member gets a record; members
    /// missing from `statuses` are marked absent. Either the whole roster
    /// is saved or none of it is.
    pub async fn record_statuses(
        &self,
        event_id: i64,
        statuses: &HashMap<String, AttendanceStatus>,
    ) -> EqrResult<usize> {
        let event = self.load_event(event_id).await?;
        let members = self.store.members().await?;

        let roster: Vec<(String, AttendanceStatus)> = members
            .into_iter()
            .map(|member| {
                let status = statuses
                    .get(&member.member_id)
                    .copied()
                    .unwrap_or(AttendanceStatus::Absent);
                (member.member_id, status)
            })
            .collect();
        let recorded = self
            .store
            .record_roster(event.id, &roster, self.now())
            .await?;
        info!(event_id, recorded, "saved attendance roster");

        Ok(recorded)
    }

    pub async fn event_summary(&self, event_id: i64) -> EqrResult<AttendanceSummary> {
        let event = self.load_event(event_id).await?;
        let records = self.store.attendance_for_event(event.id).await?;
        let total_members = self.store.members().await?.len();

        Ok(AttendanceSummary::tally(&records, total_members))
    }

    pub async fn add_member(&self, member: NewMember) -> EqrResult<Member> {
        let member = member.validate()?;
        self.store.insert_member(&member).await
    }

    /// Edits a member's details. The member ID is fixed, since issued
    /// passes carry it.
    pub async fn update_member(&self, member_id: &str, update: NewMember) -> EqrResult<Member> {
        let update = update.validate()?;
        if update.member_id != member_id {
            return Err(EqrError::BadRequest(
                "Member ID cannot be changed".to_owned(),
            ));
        }

        self.store.update_member(member_id, &update).await
    }

    pub async fn events(&self, sort: EventSort) -> EqrResult<Vec<Event>> {
        let mut events = self.store.events().await?;
        sort.sort(&mut events);

        Ok(events)
    }

    /// Events in the coming week the member hasn't yet attended.
    pub async fn upcoming_events(&self, actor: &Actor) -> EqrResult<Vec<Event>> {
        let member = self.load_member(actor.member_id()?).await?;
        let today = util::today(self.utc_offset);
        let last_day = today
            .checked_add(Duration::days(UPCOMING_DAYS))
            .unwrap_or(Date::MAX);

        let attended: HashSet<i64> = self
            .store
            .attendance_for_member(&member.member_id)
            .await?
            .into_iter()
            .filter(|record| record.status.is_attended())
            .map(|record| record.event_id)
            .collect();

        let mut events: Vec<Event> = self
            .store
            .events()
            .await?
            .into_iter()
            .filter(|event| (today..=last_day).contains(&event.date))
            .filter(|event| !attended.contains(&event.id))
            .collect();
        EventSort::Time.sort(&mut events);

        Ok(events)
    }

    /// The member's most recent attendance, latest event first.
    pub async fn attendance_history(
        &self,
        actor: &Actor,
    ) -> EqrResult<Vec<AttendanceHistoryEntry>> {
        let member = self.load_member(actor.member_id()?).await?;
        let records = self.store.attendance_for_member(&member.member_id).await?;
        let events: HashMap<i64, Event> = self
            .store
            .events()
            .await?
            .into_iter()
            .map(|event| (event.id, event))
            .collect();

        let mut history: Vec<AttendanceHistoryEntry> = records
            .into_iter()
            .filter_map(|attendance| {
                let event = events.get(&attendance.event_id)?.clone();
                Some(AttendanceHistoryEntry { event, attendance })
            })
            .collect();
        history.sort_by(|a, b| b.event.date.cmp(&a.event.date));
        history.truncate(HISTORY_LIMIT);

        Ok(history)
    }

    pub async fn add_event(&self, event: NewEvent) -> EqrResult<Event> {
        let event = event.validate(util::today(self.utc_offset))?;
        self.store.insert_event(&event).await
    }

    /// Edits an event. If the schedule changes, passes issued for the old
    /// schedule are deleted so they get reissued; attendance is kept.
    pub async fn update_event(&self, event_id: i64, update: NewEvent) -> EqrResult<Event> {
        let update = update.validate_edit()?;
        let existing = self.load_event(event_id).await?;
        let clear_passes = existing.schedule_differs(&update);

        let updated = self
            .store
            .update_event(event_id, &update, clear_passes)
            .await?;
        if clear_passes {
            info!(event_id, "event schedule changed, cleared issued passes");
        }

        Ok(updated)
    }

    pub async fn remove_member(&self, member_id: &str) -> EqrResult<()> {
        if self.store.delete_member(member_id).await? {
            Ok(())
        } else {
            Err(EqrError::NotFound("member"))
        }
    }

    /// Deletes every listed member that exists, returning how many did.
    pub async fn remove_members(&self, member_ids: &[String]) -> EqrResult<usize> {
        if member_ids.is_empty() {
            return Err(EqrError::BadRequest("No members selected".to_owned()));
        }

        let removed = self.store.delete_members(member_ids).await?;
        info!(removed, selected = member_ids.len(), "removed members");

        Ok(removed)
    }

    pub async fn remove_event(&self, event_id: i64) -> EqrResult<()> {
        if self.store.delete_event(event_id).await? {
            Ok(())
        } else {
            Err(EqrError::NotFound("event"))
        }
    }
}
