//! Encrypted event passes and attendance tracking.
//!
//! Members receive one pass per event: a tagged, authenticated-encrypted
//! token meant to be printed as a scannable code. Scanning a pass at the
//! door records the member's attendance for that event.

pub mod access;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod models;
pub mod pass;
pub mod tracker;
pub mod util;

pub use access::Actor;
pub use config::Config;
pub use error::{EncodingError, EqrError, EqrResult};
pub use tracker::{AttendanceHistoryEntry, ScanOutcome, Tracker};
