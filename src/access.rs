//! Who is asking.
//!
//! Identity is established elsewhere; callers hand the tracker an
//! [Actor](crate::access::Actor) describing the already authenticated
//! user. The only distinction drawn is staff versus everyone else.

use serde::{Deserialize, Serialize};

use crate::error::{EqrError, EqrResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "memberId", rename_all = "lowercase")]
pub enum Actor {
    /// A facilitator who manages events and passes
    Staff,
    /// A regular member, identified by their member ID
    Member(String),
}

impl Actor {
    pub fn is_staff(&self) -> bool {
        matches!(self, Actor::Staff)
    }

    pub fn ensure_staff(&self) -> EqrResult<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(EqrError::Forbidden(
                "Only staff may manage event passes".to_owned(),
            ))
        }
    }

    /// The member ID of a non-staff actor. Staff have no pass of their own.
    pub fn member_id(&self) -> EqrResult<&str> {
        match self {
            Actor::Member(member_id) => Ok(member_id),
            Actor::Staff => Err(EqrError::Forbidden(
                "Staff accounts do not have attendance passes".to_owned(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_gate_each_side() {
        let member = Actor::Member("20230000001".to_owned());

        assert!(Actor::Staff.ensure_staff().is_ok());
        assert!(matches!(member.ensure_staff(), Err(EqrError::Forbidden(_))));
        assert_eq!(member.member_id().unwrap(), "20230000001");
        assert!(matches!(Actor::Staff.member_id(), Err(EqrError::Forbidden(_))));
    }
}
