use std::env;

use time::UtcOffset;

use crate::error::{EqrError, EqrResult};
use crate::util::parse_offset;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const PASS_KEY: &str = "EQR_PASS_KEY";
pub const SECRET_KEY: &str = "SECRET_KEY";
pub const UTC_OFFSET: &str = "EQR_UTC_OFFSET";
pub const DERIVE_SCAN_STATUS: &str = "EQR_DERIVE_SCAN_STATUS";

/// Where the pass key comes from.
#[derive(Clone)]
pub enum KeySource {
    /// A base64url-encoded 32 byte key, used as-is.
    Explicit(String),
    /// The application secret, hashed into key material.
    Secret(String),
}

#[derive(Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub key_source: KeySource,
    /// The time zone event dates and start times are written in
    pub utc_offset: UtcOffset,
    /// Whether scans compute present/late instead of always recording present
    pub derive_scan_status: bool,
}

impl Config {
    pub fn from_env() -> EqrResult<Self> {
        dotenv::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from any variable source, so tests don't have to
    /// touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> EqrResult<Self> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let key_source = match (non_empty(PASS_KEY), non_empty(SECRET_KEY)) {
            (Some(key), _) => KeySource::Explicit(key),
            (None, Some(secret)) => KeySource::Secret(secret),
            (None, None) => {
                return Err(EqrError::Configuration(format!(
                    "Neither {} nor {} is set",
                    PASS_KEY, SECRET_KEY
                )))
            }
        };

        let utc_offset = match non_empty(UTC_OFFSET) {
            Some(value) => parse_offset(&value).ok_or_else(|| {
                EqrError::Configuration(format!(
                    "{} must look like +08:00, got {}",
                    UTC_OFFSET, value
                ))
            })?,
            None => UtcOffset::UTC,
        };

        let derive_scan_status = match non_empty(DERIVE_SCAN_STATUS) {
            Some(value) => value.trim().parse().map_err(|_| {
                EqrError::Configuration(format!("{} must be true or false", DERIVE_SCAN_STATUS))
            })?,
            None => false,
        };

        Ok(Self {
            database_url: non_empty(DATABASE_URL),
            key_source,
            utc_offset,
            derive_scan_status,
        })
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            database_url: None,
            key_source: KeySource::Secret(secret.into()),
            utc_offset: UtcOffset::UTC,
            derive_scan_status: false,
        }
    }

    pub fn database_url(&self) -> EqrResult<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| EqrError::Configuration(format!("{} is not set", DATABASE_URL)))
    }
}
