//! Turning pass payloads into scannable strings and back.
//!
//! Envelope: `EQR1:` + base64url(nonce || ciphertext || tag) where the
//! plaintext is the JSON of a [`PassPayload`].

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use tracing::debug;

use crate::config::Config;
use crate::crypto::{PassCipher, PassKey};
use crate::error::{EncodingError, EqrResult};

pub mod payload;

pub use payload::{LegacyPass, PassClaim, PassPayload, ScanPayload};

/// Identifies the envelope format and version.
pub const ENVELOPE_TAG: &str = "EQR1:";

/// Byte capacity of the largest scannable code (version 40, low error
/// correction, byte mode).
pub const MAX_PASS_LEN: usize = 2953;

/// The part of `raw` after the envelope tag. The tag is compared exactly,
/// before anything is decoded or decrypted.
pub fn envelope_body(raw: &str) -> Option<&str> {
    raw.strip_prefix(ENVELOPE_TAG)
}

#[derive(Clone)]
pub struct PassCodec {
    cipher: PassCipher,
}

impl PassCodec {
    pub fn new(config: &Config) -> EqrResult<Self> {
        Ok(Self::with_key(&PassKey::from_config(config)?))
    }

    pub fn with_key(key: &PassKey) -> Self {
        Self {
            cipher: key.cipher(),
        }
    }

    pub fn encode(&self, payload: &PassPayload) -> Result<String, EncodingError> {
        if payload.member_id.trim().is_empty() {
            return Err(EncodingError::MissingMemberId);
        }

        let json =
            serde_json::to_vec(payload).map_err(|err| EncodingError::Serialize(err.to_string()))?;
        let sealed = self.cipher.seal(&json).ok_or(EncodingError::Encrypt)?;
        let envelope = format!("{}{}", ENVELOPE_TAG, URL_SAFE.encode(sealed));

        if envelope.len() > MAX_PASS_LEN {
            return Err(EncodingError::TooLarge(envelope.len()));
        }

        Ok(envelope)
    }

    /// `None` for anything that isn't an intact pass made with this key.
    /// Callers can't and shouldn't tell the reasons apart.
    pub fn decode(&self, raw: &str) -> Option<PassPayload> {
        if raw.is_empty() {
            return None;
        }
        let body = envelope_body(raw)?;

        let sealed = URL_SAFE.decode(body).ok()?;
        let Some(json) = self.cipher.open(&sealed) else {
            debug!("pass failed authentication");
            return None;
        };

        serde_json::from_slice(&json).ok()
    }

    pub fn verify(&self, raw: &str, expected_event_id: i64, expected_member_id: &str) -> bool {
        self.decode(raw).map_or(false, |payload| {
            payload.event_id == expected_event_id && payload.member_id == expected_member_id
        })
    }

    /// Decides which kind of code was scanned. Tagged input is only ever
    /// treated as an encrypted pass; untagged input is tried as legacy JSON.
    pub fn classify(&self, raw: &str) -> ScanPayload {
        if envelope_body(raw).is_some() {
            return self
                .decode(raw)
                .map_or(ScanPayload::Invalid, ScanPayload::Decoded);
        }

        LegacyPass::parse(raw).map_or(ScanPayload::Invalid, ScanPayload::Legacy)
    }
}
