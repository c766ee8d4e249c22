//! The per-value secret envelope.
//!
//! A [`Payload`] is one secret value moving through encode/encrypt state
//! transitions: plaintext, base64(plaintext), or base64(ciphertext).
//! Every operation consumes the payload and returns a new one — there is
//! no in-place mutation and no lock, so payloads can be fanned out
//! across concurrent tasks freely.
//!
//! The `encoded` flag is process-local state, never persisted. The
//! persisted shape is [`SecretRow`]; converting from it via
//! [`Payload::from_stored`] is the one normalization point where the
//! flag is set, immediately at the storage boundary. No other code may
//! rely on the flag's default.
//!
//! [`Payload::decrypt`]'s contract is "always returns base64(plaintext)",
//! never raw bytes: a freshly decrypted payload is re-encoded before it
//! is handed back.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use keyfort_storage::SecretRow;

use crate::error::{CryptoError, PayloadError};
use crate::sealing::{self, SymmetricKey};

/// A single secret value and its envelope state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    value: String,
    exposable: bool,
    /// Whether `value` currently holds base64 (of plaintext or of
    /// ciphertext). Transient — see the module docs.
    encoded: bool,
}

impl Payload {
    /// Wrap a plaintext value.
    #[must_use]
    pub fn new(value: impl Into<String>, exposable: bool) -> Self {
        Self {
            value: value.into(),
            exposable,
            encoded: false,
        }
    }

    /// Normalize a stored row into a payload.
    ///
    /// Stored values are always base64(ciphertext), so the transient
    /// `encoded` flag is set here — the single storage-boundary
    /// normalization step.
    #[must_use]
    pub fn from_stored(row: SecretRow) -> Self {
        Self {
            value: row.value,
            exposable: row.exposable,
            encoded: true,
        }
    }

    /// Convert into the persistable row, dropping the transient flag.
    /// Only encrypted payloads may be persisted; the snapshot service
    /// encrypts every payload before calling this.
    #[must_use]
    pub fn into_stored(self) -> SecretRow {
        SecretRow {
            value: self.value,
            exposable: self.exposable,
        }
    }

    /// The current value string (plaintext or base64, per state).
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the value may be shown in plaintext to UI clients.
    #[must_use]
    pub const fn exposable(&self) -> bool {
        self.exposable
    }

    /// Whether the value currently holds base64.
    #[must_use]
    pub const fn is_encoded(&self) -> bool {
        self.encoded
    }

    /// Base64-encode the value.
    ///
    /// Encoding an already-encoded payload double-encodes it; callers
    /// track state through the returned payloads rather than guessing.
    #[must_use]
    pub fn encode(self) -> Self {
        Self {
            value: BASE64.encode(self.value.as_bytes()),
            exposable: self.exposable,
            encoded: true,
        }
    }

    /// Base64-decode the value back to a plaintext string.
    ///
    /// # Errors
    ///
    /// - [`PayloadError::InvalidEncoding`] if the value is not valid
    ///   base64.
    /// - [`PayloadError::InvalidPlaintext`] if the decoded bytes are not
    ///   UTF-8 — decoding ciphertext bytes to a string is a caller bug.
    pub fn decode(self) -> Result<Self, PayloadError> {
        let bytes = decode_base64(&self.value)?;
        let value = String::from_utf8(bytes).map_err(|_| PayloadError::InvalidPlaintext)?;
        Ok(Self {
            value,
            exposable: self.exposable,
            encoded: false,
        })
    }

    /// Encrypt the value under an org key.
    ///
    /// Decodes first if currently encoded, seals, and stores the result
    /// as base64(ciphertext).
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InvalidEncoding`] if an encoded value is
    /// not valid base64, or [`PayloadError::Crypto`] if sealing fails.
    pub fn encrypt(self, org_key: &SymmetricKey) -> Result<Self, PayloadError> {
        let plaintext = if self.encoded {
            decode_base64(&self.value)?
        } else {
            self.value.into_bytes()
        };

        let sealed = sealing::seal_symmetric(&plaintext, org_key)?;
        Ok(Self {
            value: BASE64.encode(sealed),
            exposable: self.exposable,
            encoded: true,
        })
    }

    /// Decrypt the value under an org key.
    ///
    /// The result always holds base64(plaintext) — raw secret bytes are
    /// never handed back directly.
    ///
    /// # Errors
    ///
    /// - [`PayloadError::InvalidEncoding`] if an encoded value is not
    ///   valid base64.
    /// - [`PayloadError::Crypto`] with
    ///   [`CryptoError::AuthenticationFailed`] on a wrong key or
    ///   tampered ciphertext.
    pub fn decrypt(self, org_key: &SymmetricKey) -> Result<Self, PayloadError> {
        let ciphertext = if self.encoded {
            decode_base64(&self.value)?
        } else {
            self.value.into_bytes()
        };

        let plaintext = sealing::open_symmetric(&ciphertext, org_key)?;
        Ok(Self {
            value: BASE64.encode(plaintext),
            exposable: self.exposable,
            encoded: true,
        })
    }
}

fn decode_base64(value: &str) -> Result<Vec<u8>, PayloadError> {
    BASE64
        .decode(value)
        .map_err(|e| PayloadError::InvalidEncoding {
            reason: e.to_string(),
        })
}

// ── Bulk operations ──────────────────────────────────────────────────

/// Encrypt every payload in a map under one org key.
///
/// All-or-nothing: the first failure aborts the whole batch and nothing
/// partial is returned.
///
/// # Errors
///
/// Propagates the first [`PayloadError`] encountered.
pub fn encrypt_map(
    payloads: BTreeMap<String, Payload>,
    org_key: &SymmetricKey,
) -> Result<BTreeMap<String, Payload>, PayloadError> {
    payloads
        .into_iter()
        .map(|(key, payload)| Ok((key, payload.encrypt(org_key)?)))
        .collect()
}

/// Decrypt every payload in a map under one org key.
///
/// All-or-nothing, like [`encrypt_map`]. Every returned payload holds
/// base64(plaintext).
///
/// # Errors
///
/// Propagates the first [`PayloadError`] encountered — an undecryptable
/// value fails the whole batch rather than being skipped.
pub fn decrypt_map(
    payloads: BTreeMap<String, Payload>,
    org_key: &SymmetricKey,
) -> Result<BTreeMap<String, Payload>, PayloadError> {
    payloads
        .into_iter()
        .map(|(key, payload)| Ok((key, payload.decrypt(org_key)?)))
        .collect()
}
