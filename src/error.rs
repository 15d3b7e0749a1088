//! Error handling for the attendance core.
//!
//! Every fallible operation returns [`EqrResult`]. Rejections a scanning
//! or issuing client should show to a person (bad pass, wrong event,
//! unknown member) have their own variants so the caller can tell them
//! apart without string matching.

use serde_json::{json, Value};
use thiserror::Error;

/// The error enum for all error handling across the crate.
///
/// See each variant for its corresponding status code
/// and JSON error body.
#[derive(Debug, Error)]
pub enum EqrError {
    /// \[500\] Required configuration was missing or malformed.
    ///
    /// ```json
    /// {
    ///     "message": "configuration error",
    ///     "statusCode": 500,
    ///     "error": <what was missing>
    /// }
    /// ```
    #[error("configuration error")]
    Configuration(String),
    /// \[500\] A pass could not be built for a member.
    ///
    /// ```json
    /// {
    ///     "message": "failed to issue pass",
    ///     "statusCode": 500,
    ///     "error": <reason>
    /// }
    /// ```
    #[error("failed to issue pass")]
    Encoding(#[from] EncodingError),
    /// \[400\] The scanner sent nothing.
    ///
    /// ```json
    /// {
    ///     "message": "no scan data provided",
    ///     "statusCode": 400
    /// }
    /// ```
    #[error("no scan data provided")]
    EmptyScan,
    /// \[400\] The scanned text was neither a readable pass nor a legacy pass.
    ///
    /// ```json
    /// {
    ///     "message": "invalid pass format",
    ///     "statusCode": 400
    /// }
    /// ```
    #[error("invalid pass format")]
    InvalidPass,
    /// \[400\] The pass was readable but belongs to another event, or
    /// names no member.
    ///
    /// ```json
    /// {
    ///     "message": "invalid or expired pass for this event",
    ///     "statusCode": 400
    /// }
    /// ```
    #[error("invalid or expired pass for this event")]
    BindingMismatch,
    /// \[404\] The referenced record does not exist.
    ///
    /// ```json
    /// {
    ///     "message": "member not found",
    ///     "statusCode": 404
    /// }
    /// ```
    #[error("{0} not found")]
    NotFound(&'static str),
    /// \[400\] A record failed validation.
    ///
    /// ```json
    /// {
    ///     "message": "bad request",
    ///     "statusCode": 400,
    ///     "reason": <reason>
    /// }
    /// ```
    #[error("bad request")]
    BadRequest(String),
    /// \[403\] The acting user may not perform this operation.
    ///
    /// ```json
    /// {
    ///     "message": "access forbidden",
    ///     "statusCode": 403,
    ///     "reason": <reason>
    /// }
    /// ```
    #[error("access forbidden")]
    Forbidden(String),
    /// \[409\] A unique key was already taken, or an upsert kept racing
    /// after every retry.
    ///
    /// ```json
    /// {
    ///     "message": "conflict",
    ///     "statusCode": 409,
    ///     "reason": <reason>
    /// }
    /// ```
    #[error("conflict")]
    Conflict(String),
    /// \[500\] An error occurred while talking to the database.
    ///
    /// ```json
    /// {
    ///     "message": "database error",
    ///     "statusCode": 500,
    ///     "error": <error message>
    /// }
    /// ```
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

/// Why a payload could not be turned into a pass.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("payload has no member id")]
    MissingMemberId,
    #[error("payload could not be serialized: {0}")]
    Serialize(String),
    #[error("payload could not be encrypted")]
    Encrypt,
    #[error("pass is {0} bytes, more than a scannable code can hold")]
    TooLarge(usize),
}

/// The return type for all fallible operations.
pub type EqrResult<T> = Result<T, EqrError>;

impl EqrError {
    pub fn status(&self) -> u16 {
        match self {
            EqrError::EmptyScan
            | EqrError::InvalidPass
            | EqrError::BindingMismatch
            | EqrError::BadRequest(_) => 400,
            EqrError::Forbidden(_) => 403,
            EqrError::NotFound(_) => 404,
            EqrError::Conflict(_) => 409,
            EqrError::Configuration(_) | EqrError::Encoding(_) | EqrError::Database(_) => 500,
        }
    }

    pub fn as_response(&self) -> (u16, Value) {
        let mut json_val = match self {
            EqrError::Configuration(error) => json!({ "error": error }),
            EqrError::Encoding(error) => json!({ "error": error.to_string() }),
            EqrError::BadRequest(reason)
            | EqrError::Forbidden(reason)
            | EqrError::Conflict(reason) => json!({ "reason": reason }),
            EqrError::Database(error) => json!({ "error": error.to_string() }),
            EqrError::EmptyScan
            | EqrError::InvalidPass
            | EqrError::BindingMismatch
            | EqrError::NotFound(_) => json!({}),
        };

        let status_code = self.status();
        json_val["statusCode"] = json!(status_code);
        json_val["message"] = json!(self.to_string());

        (status_code, json_val)
    }
}
