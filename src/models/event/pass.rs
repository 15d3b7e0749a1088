use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The stored pass for one member at one event. Only the newest pass is
/// kept; issuing again overwrites it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Pass {
    /// The member the pass was issued to
    pub member_id: String,
    /// The event the pass admits the member to
    pub event_id: i64,
    /// The envelope printed into the scannable code
    pub encrypted_data: String,
    /// When a pass was first issued for this member and event
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the pass was last reissued
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
