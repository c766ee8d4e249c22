//! Error types for `keyfort-core`.
//!
//! One enum per domain, each variant carrying enough context to diagnose
//! the problem without a debugger. Error messages never include key
//! material, passwords, or secret values.
//!
//! The engine fails closed: any ambiguous or undecryptable state is an
//! error, never a fallback to a default or empty secret value.

use keyfort_storage::StorageError;

/// Errors from the sealing primitives.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AEAD open failed: wrong key, corrupted data, or tampered tag.
    #[error("authentication failed: ciphertext was not produced under this key or has been modified")]
    AuthenticationFailed,

    /// The blob is too short to contain the expected framing.
    #[error("corrupt ciphertext: expected at least {expected} bytes, got {actual}")]
    CorruptCiphertext { expected: usize, actual: usize },

    /// AEAD seal failed.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    /// Key derivation (HKDF or Argon2id) failed.
    #[error("key derivation failed: {reason}")]
    KeyDerivation { reason: String },
}

/// Errors from payload encode/encrypt state transitions.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The value is not valid base64.
    #[error("invalid encoding: {reason}")]
    InvalidEncoding { reason: String },

    /// Decrypted bytes are not valid UTF-8 — the payload cannot have
    /// been produced by this engine.
    #[error("decrypted value is not valid UTF-8")]
    InvalidPlaintext,

    /// A sealing primitive failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Errors from deployment configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configured server key could not be parsed.
    #[error("invalid server key: {reason}")]
    InvalidServerKey { reason: String },
}

/// Errors from keypair issuance and recovery.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The password did not recover the private key. Deliberately
    /// indistinguishable between the two unwrap layers.
    #[error("invalid password")]
    InvalidPassword,

    /// The record references a KDF parameter version this build does
    /// not know.
    #[error("unknown KDF version {version}")]
    UnknownKdfVersion { version: u8 },

    /// The member key record was not found.
    #[error("member key record not found")]
    NotFound,

    /// Key derivation failed for a reason other than a wrong password.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from org-key distribution.
#[derive(Debug, thiserror::Error)]
pub enum OrgKeyError {
    /// No sealed copy exists for the requested principal.
    #[error("org key copy not found for organization {org_id}")]
    NotFound { org_id: uuid::Uuid },

    /// The organization already has a provisioned key. The org key is
    /// generated exactly once; there is no rotation path.
    #[error("organization {org_id} already has an org key")]
    AlreadyProvisioned { org_id: uuid::Uuid },

    /// A sealed copy did not open to a 32-byte key.
    #[error("sealed org key copy opened to {actual} bytes, expected 32")]
    MalformedKey { actual: usize },

    /// Keypair recovery failed.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// A sealing primitive failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from snapshot operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The environment, version, or key was not found.
    #[error("secret not found")]
    NotFound,

    /// The write lost the version race and exhausted its retries.
    #[error("snapshot write conflict for environment {env_id} after {attempts} attempts")]
    Conflict { env_id: uuid::Uuid, attempts: u32 },

    /// A payload transition failed.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from environment token issuance and validation.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// No record matches the presented token's hash — the token was
    /// revoked or never issued. The ciphertext may still be
    /// mathematically valid; without the server-held key it is inert.
    #[error("token revoked or unknown")]
    Revoked,

    /// The token's expiry has passed.
    #[error("token expired at {expired_at}")]
    Expired { expired_at: String },

    /// The token is bound to a different organization's environment.
    #[error("token is not valid for organization {org_id}")]
    WrongOrganization { org_id: uuid::Uuid },

    /// The presented bytes did not open under the stored key.
    #[error("token authentication failed")]
    AuthenticationFailed,

    /// A sealing primitive failed during issuance.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from the invite flow.
#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    /// The invite was not found.
    #[error("invite not found")]
    NotFound,

    /// The invite was already accepted.
    #[error("invite already accepted")]
    AlreadyAccepted,

    /// The inviter's password did not recover their org-key copy.
    #[error("invalid password")]
    InvalidPassword,

    /// Org-key decryption or re-sealing failed.
    #[error(transparent)]
    OrgKey(#[from] OrgKeyError),

    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
