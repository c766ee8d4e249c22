//! Typed storage records.
//!
//! These are the shapes that cross the storage boundary — decoded once,
//! here, so the crypto and versioning core never touches dynamic JSON.
//! All key material in these records is ciphertext, with one exception:
//! [`TokenRecord::key`] is the server-held ephemeral key that makes
//! environment tokens revocable, and it is redacted from `Debug` output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Secrets ──────────────────────────────────────────────────────────

/// One secret value as persisted inside a snapshot row.
///
/// `value` always holds base64-encoded ciphertext at rest. The transient
/// "is this value currently base64" flag lives on the core payload type,
/// not here — it is process-local state, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRow {
    /// Base64-encoded ciphertext.
    pub value: String,
    /// Whether the value may be shown in plaintext to UI clients.
    pub exposable: bool,
}

/// The complete key/value map of an environment's secrets at one version.
///
/// Snapshots are append-only and each carries a full copy of every key,
/// not a diff. Versions start at 1 and are strictly increasing per
/// environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub env_id: Uuid,
    pub version: u32,
    pub data: BTreeMap<String, SecretRow>,
    pub created_at: DateTime<Utc>,
}

// ── Member keys ──────────────────────────────────────────────────────

/// A user's keypair record as persisted at signup.
///
/// Immutable after creation — there is no rotation path. The private key
/// and protection key are stored only as AEAD ciphertext; the salt feeds
/// the password KDF on recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberKeyRecord {
    pub user_id: Uuid,
    /// X25519 public key (32 bytes).
    pub public_key: [u8; 32],
    /// Private key sealed under the protection key.
    pub encrypted_private_key: Vec<u8>,
    /// Protection key sealed under the password-derived key.
    pub encrypted_protection_key: Vec<u8>,
    /// Salt for the password KDF (32 bytes).
    pub salt: [u8; 32],
    /// Which pinned KDF parameter set issued this record.
    pub kdf_version: u8,
}

// ── Org key copies ───────────────────────────────────────────────────

/// The principal an org-key copy is sealed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Principal {
    /// A human member, sealed to their personal public key.
    Member(Uuid),
    /// The server copy, sealed to the fixed deployment keypair.
    Server,
}

// ── Environment tokens ───────────────────────────────────────────────

/// Server-side state for a revocable environment token.
///
/// The emitted token ciphertext is never stored — only its SHA-256 hash
/// (the lookup key) and the ephemeral key needed to open it. Deleting
/// this record invalidates the token even though the ciphertext stays
/// mathematically valid.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: Uuid,
    pub org_id: Uuid,
    pub env_id: Uuid,
    /// The server-held ephemeral key that opens the token ciphertext.
    pub key: [u8; 32],
    /// Hex-encoded SHA-256 of the emitted token bytes.
    pub hash: String,
    pub expires_at: DateTime<Utc>,
    pub name: String,
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("id", &self.id)
            .field("org_id", &self.org_id)
            .field("env_id", &self.env_id)
            .field("key", &"[REDACTED]")
            .field("hash", &self.hash)
            .field("expires_at", &self.expires_at)
            .field("name", &self.name)
            .finish()
    }
}

// ── Invites ──────────────────────────────────────────────────────────

/// Role granted to an invited member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Developer,
    Viewer,
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Developer => write!(f, "developer"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

/// A pending or accepted invitation carrying the org key re-sealed to
/// the invitee. All crypto happens at create time; accepting only copies
/// `sealed_org_key` into the member's org-key-copy row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteRecord {
    pub id: Uuid,
    pub org_id: Uuid,
    pub role: MemberRole,
    pub invitee_email: String,
    pub invitee_user_id: Uuid,
    /// The org key sealed to the invitee's public key (80 bytes).
    pub sealed_org_key: Vec<u8>,
    pub invited_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;

    #[test]
    fn snapshot_row_wire_shape() {
        let mut data = BTreeMap::new();
        data.insert(
            "DB_URL".to_owned(),
            SecretRow {
                value: "bm9uY2UuLi4=".to_owned(),
                exposable: false,
            },
        );
        let snapshot = Snapshot {
            env_id: Uuid::nil(),
            version: 3,
            data,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["data"]["DB_URL"]["value"], "bm9uY2UuLi4=");
        assert_eq!(json["data"]["DB_URL"]["exposable"], false);

        let back: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn member_role_serializes_lowercase() {
        let json = serde_json::to_string(&MemberRole::Developer).unwrap();
        assert_eq!(json, "\"developer\"");
        assert_eq!(MemberRole::Admin.to_string(), "admin");
    }
}
