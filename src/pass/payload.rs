use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};

use crate::models::{Event, Member};

/// What a pass says once it has been decrypted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassPayload {
    pub member_id: String,
    pub event_id: i64,
    pub event_name: String,
    #[serde(with = "crate::util::pass_date")]
    pub event_date: Date,
    #[serde(with = "crate::util::pass_time::option")]
    pub event_start_time: Option<Time>,
    #[serde(with = "crate::util::pass_time::option")]
    pub event_end_time: Option<Time>,
    /// When the pass was issued
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl PassPayload {
    /// Snapshots the event schedule at issue time.
    pub fn new(member: &Member, event: &Event, issued_at: OffsetDateTime) -> Self {
        Self {
            member_id: member.member_id.clone(),
            event_id: event.id,
            event_name: event.name.clone(),
            event_date: event.date,
            event_start_time: event.start_time,
            event_end_time: event.end_time,
            timestamp: issued_at,
        }
    }
}

/// Older codes held plain JSON. Identifiers may have been written as
/// numbers, floats or strings. Any other JSON value is kept so the code
/// still parses and then fails to bind.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseId {
    Number(i64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

impl LooseId {
    fn as_integer(&self) -> Option<i64> {
        match self {
            LooseId::Number(number) => Some(*number),
            // `i64::MAX as f64` rounds up to 2^63, hence the strict bound
            LooseId::Float(float)
                if float.fract() == 0.0
                    && *float >= i64::MIN as f64
                    && *float < i64::MAX as f64 =>
            {
                Some(*float as i64)
            }
            LooseId::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LegacyPass {
    #[serde(default)]
    pub member_id: Option<LooseId>,
    #[serde(default)]
    pub event_id: Option<LooseId>,
}

impl LegacyPass {
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// The identifiers a scanned code claims, whatever format it came in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassClaim {
    pub member_id: Option<String>,
    pub event_id: Option<i64>,
}

impl PassClaim {
    /// The claimed member, if the code names one and was made for
    /// `event_id`.
    pub fn member_for(&self, event_id: i64) -> Option<&str> {
        match (&self.member_id, self.event_id) {
            (Some(member_id), Some(claimed)) if claimed == event_id => Some(member_id),
            _ => None,
        }
    }
}

impl From<&PassPayload> for PassClaim {
    fn from(payload: &PassPayload) -> Self {
        Self {
            member_id: Some(payload.member_id.trim().to_owned()).filter(|id| !id.is_empty()),
            event_id: Some(payload.event_id),
        }
    }
}

impl From<&LegacyPass> for PassClaim {
    fn from(legacy: &LegacyPass) -> Self {
        let member_id = match &legacy.member_id {
            Some(LooseId::Text(text)) => Some(text.trim().to_owned()).filter(|id| !id.is_empty()),
            Some(other) => other.as_integer().map(|number| number.to_string()),
            None => None,
        };
        let event_id = legacy.event_id.as_ref().and_then(LooseId::as_integer);

        Self {
            member_id,
            event_id,
        }
    }
}

/// How a scanned string was understood.
#[derive(Clone, Debug, PartialEq)]
pub enum ScanPayload {
    /// A tagged, authenticated pass
    Decoded(PassPayload),
    /// Untagged plain JSON from before passes were encrypted
    Legacy(LegacyPass),
    /// Neither
    Invalid,
}

impl ScanPayload {
    pub fn claim(&self) -> Option<PassClaim> {
        match self {
            ScanPayload::Decoded(payload) => Some(payload.into()),
            ScanPayload::Legacy(legacy) => Some(legacy.into()),
            ScanPayload::Invalid => None,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, ScanPayload::Legacy(_))
    }
}
