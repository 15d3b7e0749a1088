use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{EqrError, EqrResult};
use crate::models::non_blank;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    /// The member's 11 digit identifier, which must be unique
    pub member_id: String,
    /// The member's first name
    pub first_name: String,
    /// The member's last name
    pub last_name: String,
    /// The member's email, unique across members if present
    pub email: Option<String>,
    /// The section the member belongs to
    pub section: Option<String>,
    /// When the member was added
    #[serde(with = "time::serde::rfc3339")]
    pub date_created: OffsetDateTime,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A member as submitted by a facilitator, before validation.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewMember {
    pub member_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub section: Option<String>,
}

fn member_id_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^\d{11}$").unwrap())
}

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

fn section_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z0-9]{4,6}$").unwrap())
}

impl NewMember {
    /// Normalizes the form values and checks the identifier format.
    /// Email uniqueness is left to the store.
    pub fn validate(self) -> EqrResult<Self> {
        let member_id = self.member_id.trim().to_owned();
        if !member_id_regex().is_match(&member_id) {
            return Err(EqrError::BadRequest(
                "Member ID must be exactly 11 digits".to_owned(),
            ));
        }

        let first_name = self.first_name.trim().to_owned();
        if first_name.is_empty() {
            return Err(EqrError::BadRequest("First name must not be empty".to_owned()));
        }
        let last_name = self.last_name.trim().to_owned();
        if last_name.is_empty() {
            return Err(EqrError::BadRequest("Last name must not be empty".to_owned()));
        }

        let email = non_blank(self.email);
        if let Some(email) = &email {
            if !email_regex().is_match(email) {
                return Err(EqrError::BadRequest(format!(
                    "{} is not a valid email address",
                    email
                )));
            }
        }

        let section = non_blank(self.section);
        if let Some(section) = &section {
            if !section_regex().is_match(section) {
                return Err(EqrError::BadRequest(
                    "Section must be 4 to 6 letters or digits".to_owned(),
                ));
            }
        }

        Ok(Self {
            member_id,
            first_name,
            last_name,
            email,
            section,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_member() -> NewMember {
        NewMember {
            member_id: "20230000001".to_owned(),
            first_name: "Maria".to_owned(),
            last_name: "Santos".to_owned(),
            email: Some("  ".to_owned()),
            section: Some("BSIT3A".to_owned()),
        }
    }

    #[test]
    fn blank_email_becomes_none() {
        let member = new_member().validate().unwrap();
        assert_eq!(member.email, None);
        assert_eq!(member.section.as_deref(), Some("BSIT3A"));
    }

    #[test]
    fn member_id_must_be_eleven_digits() {
        for bad in ["2023000000", "202300000012", "2023000000a", ""] {
            let member = NewMember {
                member_id: bad.to_owned(),
                ..new_member()
            };
            assert!(matches!(member.validate(), Err(EqrError::BadRequest(_))), "{bad}");
        }
    }

    #[test]
    fn rejects_bad_email_and_section() {
        let bad_email = NewMember {
            email: Some("maria.santos".to_owned()),
            ..new_member()
        };
        assert!(bad_email.validate().is_err());

        let bad_section = NewMember {
            section: Some("A1".to_owned()),
            ..new_member()
        };
        assert!(bad_section.validate().is_err());

        let no_last_name = NewMember {
            last_name: " ".to_owned(),
            ..new_member()
        };
        assert!(no_last_name.validate().is_err());
    }
}
