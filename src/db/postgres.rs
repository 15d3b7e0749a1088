use std::future::Future;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use time::OffsetDateTime;
use tracing::warn;

use crate::db::Store;
use crate::error::{EqrError, EqrResult};
use crate::models::{Attendance, AttendanceStatus, Event, Member, NewEvent, NewMember, Pass};

/// How many times an upsert is attempted when it keeps colliding with a
/// concurrent insert of the same key.
pub const MAX_UPSERT_ATTEMPTS: usize = 3;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

const MEMBER_COLUMNS: &str = "member_id, first_name, last_name, email, section, date_created";
const EVENT_COLUMNS: &str = "id, name, date, start_time, end_time, created_at";
const PASS_COLUMNS: &str = "member_id, event_id, encrypted_data, created_at, updated_at";
const ATTENDANCE_COLUMNS: &str = "event_id, member_id, status, timestamp";

const ROSTER_UPSERT: &str = "INSERT INTO attendance (event_id, member_id, status, timestamp)
     VALUES ($1, $2, $3, $4)
     ON CONFLICT (event_id, member_id)
     DO UPDATE SET status = EXCLUDED.status, timestamp = EXCLUDED.timestamp";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str) -> EqrResult<Self> {
        let pool = PgPoolOptions::new().connect(url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> EqrResult<()> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|err| EqrError::Database(err.into()))
    }
}

fn has_code(error: &sqlx::Error, code: &str) -> bool {
    matches!(error, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(code))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    has_code(error, UNIQUE_VIOLATION)
}

/// Runs `attempt` until it stops failing on a unique-key race. A race
/// means another request inserted the same key first, so running the
/// upsert again turns it into an update.
async fn retry_conflicts<T, F, Fut>(what: &str, mut attempt: F) -> EqrResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt().await {
            Err(err) if is_unique_violation(&err) => {
                if attempts >= MAX_UPSERT_ATTEMPTS {
                    return Err(EqrError::Conflict(format!(
                        "{} kept conflicting after {} attempts",
                        what, attempts
                    )));
                }
                warn!(attempts, "{} raced a concurrent insert, retrying", what);
            }
            result => return result.map_err(EqrError::from),
        }
    }
}

/// Splits a `RETURNING ..., (xmax = 0) AS created` row.
fn upserted<T: for<'r> FromRow<'r, PgRow>>(row: PgRow) -> Result<(T, bool), sqlx::Error> {
    let created = row.try_get("created")?;
    Ok((T::from_row(&row)?, created))
}

#[async_trait]
impl Store for PgStore {
    async fn member(&self, member_id: &str) -> EqrResult<Option<Member>> {
        sqlx::query_as::<_, Member>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM member WHERE member_id = $1"
        ))
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn members(&self) -> EqrResult<Vec<Member>> {
        sqlx::query_as::<_, Member>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM member ORDER BY last_name, first_name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn insert_member(&self, member: &NewMember) -> EqrResult<Member> {
        sqlx::query_as::<_, Member>(&format!(
            "INSERT INTO member (member_id, first_name, last_name, email, section)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(&member.member_id)
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.email)
        .bind(&member.section)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                EqrError::Conflict("A member with that ID or email already exists".to_owned())
            } else {
                err.into()
            }
        })
    }

    async fn update_member(&self, member_id: &str, member: &NewMember) -> EqrResult<Member> {
        sqlx::query_as::<_, Member>(&format!(
            "UPDATE member SET first_name = $2, last_name = $3, email = $4, section = $5
             WHERE member_id = $1
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(member_id)
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.email)
        .bind(&member.section)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                EqrError::Conflict("Another member already uses that email".to_owned())
            } else {
                err.into()
            }
        })?
        .ok_or(EqrError::NotFound("member"))
    }

    async fn delete_member(&self, member_id: &str) -> EqrResult<bool> {
        let result = sqlx::query("DELETE FROM member WHERE member_id = $1")
            .bind(member_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_members(&self, member_ids: &[String]) -> EqrResult<usize> {
        let result = sqlx::query("DELETE FROM member WHERE member_id = ANY($1)")
            .bind(member_ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn event(&self, event_id: i64) -> EqrResult<Option<Event>> {
        sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM event WHERE id = $1"))
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn events(&self) -> EqrResult<Vec<Event>> {
        sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM event ORDER BY date, id"))
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn insert_event(&self, event: &NewEvent) -> EqrResult<Event> {
        sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO event (name, date, start_time, end_time)
             VALUES ($1, $2, $3, $4)
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(&event.name)
        .bind(event.date)
        .bind(event.start_time)
        .bind(event.end_time)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn update_event(
        &self,
        event_id: i64,
        event: &NewEvent,
        clear_passes: bool,
    ) -> EqrResult<Event> {
        let mut transaction = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Event>(&format!(
            "UPDATE event SET name = $2, date = $3, start_time = $4, end_time = $5
             WHERE id = $1
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event_id)
        .bind(&event.name)
        .bind(event.date)
        .bind(event.start_time)
        .bind(event.end_time)
        .fetch_optional(&mut transaction)
        .await?
        .ok_or(EqrError::NotFound("event"))?;

        if clear_passes {
            sqlx::query("DELETE FROM pass WHERE event_id = $1")
                .bind(event_id)
                .execute(&mut transaction)
                .await?;
        }

        transaction.commit().await?;
        Ok(updated)
    }

    async fn delete_event(&self, event_id: i64) -> EqrResult<bool> {
        let result = sqlx::query("DELETE FROM event WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn pass(&self, member_id: &str, event_id: i64) -> EqrResult<Option<Pass>> {
        sqlx::query_as::<_, Pass>(&format!(
            "SELECT {PASS_COLUMNS} FROM pass WHERE member_id = $1 AND event_id = $2"
        ))
        .bind(member_id)
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn passes_for_event(&self, event_id: i64) -> EqrResult<Vec<Pass>> {
        sqlx::query_as::<_, Pass>(&format!(
            "SELECT {PASS_COLUMNS} FROM pass WHERE event_id = $1 ORDER BY member_id"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn upsert_pass(
        &self,
        member_id: &str,
        event_id: i64,
        encrypted_data: &str,
        issued_at: OffsetDateTime,
    ) -> EqrResult<(Pass, bool)> {
        let query = format!(
            "INSERT INTO pass (member_id, event_id, encrypted_data, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             ON CONFLICT (member_id, event_id)
             DO UPDATE SET encrypted_data = EXCLUDED.encrypted_data,
                           updated_at = EXCLUDED.updated_at
             RETURNING {PASS_COLUMNS}, (xmax = 0) AS created"
        );
        let pool = &self.pool;
        let query = query.as_str();

        retry_conflicts("pass upsert", move || async move {
            let mut transaction = pool.begin().await?;
            let row = sqlx::query(query)
                .bind(member_id)
                .bind(event_id)
                .bind(encrypted_data)
                .bind(issued_at)
                .fetch_one(&mut transaction)
                .await?;
            transaction.commit().await?;

            upserted::<Pass>(row)
        })
        .await
    }

    async fn attendance(&self, event_id: i64, member_id: &str) -> EqrResult<Option<Attendance>> {
        sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE event_id = $1 AND member_id = $2"
        ))
        .bind(event_id)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn attendance_for_event(&self, event_id: i64) -> EqrResult<Vec<Attendance>> {
        sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance
             WHERE event_id = $1 ORDER BY timestamp DESC"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn attendance_for_member(&self, member_id: &str) -> EqrResult<Vec<Attendance>> {
        sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance
             WHERE member_id = $1 ORDER BY timestamp DESC"
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn upsert_attendance(
        &self,
        event_id: i64,
        member_id: &str,
        status: AttendanceStatus,
        timestamp: OffsetDateTime,
    ) -> EqrResult<(Attendance, bool)> {
        let query = format!(
            "INSERT INTO attendance (event_id, member_id, status, timestamp)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (event_id, member_id)
             DO UPDATE SET status = EXCLUDED.status, timestamp = EXCLUDED.timestamp
             RETURNING {ATTENDANCE_COLUMNS}, (xmax = 0) AS created"
        );
        let pool = &self.pool;
        let query = query.as_str();

        retry_conflicts("attendance upsert", move || async move {
            let mut transaction = pool.begin().await?;
            let row = sqlx::query(query)
                .bind(event_id)
                .bind(member_id)
                .bind(status)
                .bind(timestamp)
                .fetch_one(&mut transaction)
                .await?;
            transaction.commit().await?;

            upserted::<Attendance>(row)
        })
        .await
    }

    async fn record_roster(
        &self,
        event_id: i64,
        statuses: &[(String, AttendanceStatus)],
        timestamp: OffsetDateTime,
    ) -> EqrResult<usize> {
        let pool = &self.pool;

        retry_conflicts("attendance roster", move || async move {
            let mut transaction = pool.begin().await?;
            let event = sqlx::query("SELECT 1 FROM event WHERE id = $1")
                .bind(event_id)
                .fetch_optional(&mut transaction)
                .await?;
            if event.is_none() {
                return Ok(Err(EqrError::NotFound("event")));
            }

            for (member_id, status) in statuses {
                let result = sqlx::query(ROSTER_UPSERT)
                    .bind(event_id)
                    .bind(member_id)
                    .bind(*status)
                    .bind(timestamp)
                    .execute(&mut transaction)
                    .await;
                match result {
                    // dropping the transaction rolls back the rows before it
                    Err(err) if has_code(&err, FOREIGN_KEY_VIOLATION) => {
                        return Ok(Err(EqrError::NotFound("member")));
                    }
                    result => {
                        result?;
                    }
                }
            }

            transaction.commit().await?;
            Ok(Ok(statuses.len()))
        })
        .await?
    }
}
