use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::db::Store;
use crate::error::{EqrError, EqrResult};
use crate::models::{Attendance, AttendanceStatus, Event, Member, NewEvent, NewMember, Pass};

/// A [`Store`] kept entirely in process. Each call holds the lock for its
/// whole duration, so every method is atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    members: BTreeMap<String, Member>,
    events: BTreeMap<i64, Event>,
    last_event_id: i64,
    passes: HashMap<(String, i64), Pass>,
    attendance: HashMap<(i64, String), Attendance>,
}

impl Tables {
    fn ensure_exists(&self, member_id: &str, event_id: i64) -> EqrResult<()> {
        if !self.members.contains_key(member_id) {
            return Err(EqrError::NotFound("member"));
        }
        if !self.events.contains_key(&event_id) {
            return Err(EqrError::NotFound("event"));
        }

        Ok(())
    }

    /// Whether another member than `except` already uses `email`.
    fn email_taken(&self, email: Option<&String>, except: Option<&str>) -> bool {
        let Some(email) = email else {
            return false;
        };

        self.members.values().any(|other| {
            other.email.as_ref() == Some(email) && Some(other.member_id.as_str()) != except
        })
    }

    fn remove_member(&mut self, member_id: &str) -> bool {
        if self.members.remove(member_id).is_none() {
            return false;
        }

        self.passes.retain(|(member, _), _| member != member_id);
        self.attendance.retain(|(_, member), _| member != member_id);
        true
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn member(&self, member_id: &str) -> EqrResult<Option<Member>> {
        Ok(self.tables.lock().await.members.get(member_id).cloned())
    }

    async fn members(&self) -> EqrResult<Vec<Member>> {
        let tables = self.tables.lock().await;
        let mut members: Vec<Member> = tables.members.values().cloned().collect();
        members.sort_by(|a, b| {
            (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name))
        });

        Ok(members)
    }

    async fn insert_member(&self, member: &NewMember) -> EqrResult<Member> {
        let mut tables = self.tables.lock().await;

        if tables.email_taken(member.email.as_ref(), None)
            || tables.members.contains_key(&member.member_id)
        {
            return Err(EqrError::Conflict(
                "A member with that ID or email already exists".to_owned(),
            ));
        }

        let created = Member {
            member_id: member.member_id.clone(),
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            email: member.email.clone(),
            section: member.section.clone(),
            date_created: OffsetDateTime::now_utc(),
        };
        tables
            .members
            .insert(created.member_id.clone(), created.clone());

        Ok(created)
    }

    async fn update_member(&self, member_id: &str, member: &NewMember) -> EqrResult<Member> {
        let mut tables = self.tables.lock().await;
        if tables.email_taken(member.email.as_ref(), Some(member_id)) {
            return Err(EqrError::Conflict(
                "Another member already uses that email".to_owned(),
            ));
        }

        let existing = tables
            .members
            .get_mut(member_id)
            .ok_or(EqrError::NotFound("member"))?;
        existing.first_name = member.first_name.clone();
        existing.last_name = member.last_name.clone();
        existing.email = member.email.clone();
        existing.section = member.section.clone();

        Ok(existing.clone())
    }

    async fn delete_member(&self, member_id: &str) -> EqrResult<bool> {
        Ok(self.tables.lock().await.remove_member(member_id))
    }

    async fn delete_members(&self, member_ids: &[String]) -> EqrResult<usize> {
        let mut tables = self.tables.lock().await;

        Ok(member_ids
            .iter()
            .filter(|member_id| tables.remove_member(member_id))
            .count())
    }

    async fn event(&self, event_id: i64) -> EqrResult<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&event_id).cloned())
    }

    async fn events(&self) -> EqrResult<Vec<Event>> {
        let tables = self.tables.lock().await;
        let mut events: Vec<Event> = tables.events.values().cloned().collect();
        events.sort_by_key(|event| (event.date, event.id));

        Ok(events)
    }

    async fn insert_event(&self, event: &NewEvent) -> EqrResult<Event> {
        let mut tables = self.tables.lock().await;
        tables.last_event_id += 1;

        let created = Event {
            id: tables.last_event_id,
            name: event.name.clone(),
            date: event.date,
            start_time: event.start_time,
            end_time: event.end_time,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.events.insert(created.id, created.clone());

        Ok(created)
    }

    async fn update_event(
        &self,
        event_id: i64,
        event: &NewEvent,
        clear_passes: bool,
    ) -> EqrResult<Event> {
        let mut tables = self.tables.lock().await;
        let existing = tables
            .events
            .get_mut(&event_id)
            .ok_or(EqrError::NotFound("event"))?;

        existing.name = event.name.clone();
        existing.date = event.date;
        existing.start_time = event.start_time;
        existing.end_time = event.end_time;
        let updated = existing.clone();

        if clear_passes {
            tables.passes.retain(|(_, event), _| *event != event_id);
        }

        Ok(updated)
    }

    async fn delete_event(&self, event_id: i64) -> EqrResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.events.remove(&event_id).is_none() {
            return Ok(false);
        }

        tables.passes.retain(|(_, event), _| *event != event_id);
        tables.attendance.retain(|(event, _), _| *event != event_id);

        Ok(true)
    }

    async fn pass(&self, member_id: &str, event_id: i64) -> EqrResult<Option<Pass>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .passes
            .get(&(member_id.to_owned(), event_id))
            .cloned())
    }

    async fn passes_for_event(&self, event_id: i64) -> EqrResult<Vec<Pass>> {
        let tables = self.tables.lock().await;
        let mut passes: Vec<Pass> = tables
            .passes
            .values()
            .filter(|pass| pass.event_id == event_id)
            .cloned()
            .collect();
        passes.sort_by(|a, b| a.member_id.cmp(&b.member_id));

        Ok(passes)
    }

    async fn upsert_pass(
        &self,
        member_id: &str,
        event_id: i64,
        encrypted_data: &str,
        issued_at: OffsetDateTime,
    ) -> EqrResult<(Pass, bool)> {
        let mut tables = self.tables.lock().await;
        tables.ensure_exists(member_id, event_id)?;

        let key = (member_id.to_owned(), event_id);
        if let Some(pass) = tables.passes.get_mut(&key) {
            pass.encrypted_data = encrypted_data.to_owned();
            pass.updated_at = issued_at;
            return Ok((pass.clone(), false));
        }

        let pass = Pass {
            member_id: member_id.to_owned(),
            event_id,
            encrypted_data: encrypted_data.to_owned(),
            created_at: issued_at,
            updated_at: issued_at,
        };
        tables.passes.insert(key, pass.clone());

        Ok((pass, true))
    }

    async fn attendance(&self, event_id: i64, member_id: &str) -> EqrResult<Option<Attendance>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .attendance
            .get(&(event_id, member_id.to_owned()))
            .cloned())
    }

    async fn attendance_for_event(&self, event_id: i64) -> EqrResult<Vec<Attendance>> {
        let tables = self.tables.lock().await;
        let mut records: Vec<Attendance> = tables
            .attendance
            .values()
            .filter(|record| record.event_id == event_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(records)
    }

    async fn attendance_for_member(&self, member_id: &str) -> EqrResult<Vec<Attendance>> {
        let tables = self.tables.lock().await;
        let mut records: Vec<Attendance> = tables
            .attendance
            .values()
            .filter(|record| record.member_id == member_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(records)
    }

    async fn upsert_attendance(
        &self,
        event_id: i64,
        member_id: &str,
        status: AttendanceStatus,
        timestamp: OffsetDateTime,
    ) -> EqrResult<(Attendance, bool)> {
        let mut tables = self.tables.lock().await;
        tables.ensure_exists(member_id, event_id)?;

        let key = (event_id, member_id.to_owned());
        if let Some(record) = tables.attendance.get_mut(&key) {
            record.status = status;
            record.timestamp = timestamp;
            return Ok((record.clone(), false));
        }

        let record = Attendance {
            event_id,
            member_id: member_id.to_owned(),
            status,
            timestamp,
        };
        tables.attendance.insert(key, record.clone());

        Ok((record, true))
    }

    async fn record_roster(
        &self,
        event_id: i64,
        statuses: &[(String, AttendanceStatus)],
        timestamp: OffsetDateTime,
    ) -> EqrResult<usize> {
        let mut tables = self.tables.lock().await;
        for (member_id, _) in statuses {
            tables.ensure_exists(member_id, event_id)?;
        }

        for (member_id, status) in statuses {
            tables.attendance.insert(
                (event_id, member_id.clone()),
                Attendance {
                    event_id,
                    member_id: member_id.clone(),
                    status: *status,
                    timestamp,
                },
            );
        }

        Ok(statuses.len())
    }
}
