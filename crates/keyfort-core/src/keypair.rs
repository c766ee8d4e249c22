//! Keypair issuance and password-based recovery.
//!
//! Every user gets one X25519 keypair at signup, wrapped in two layers:
//! the private key is sealed under a random protection key, and the
//! protection key is sealed under an Argon2id password-derived key. The
//! password is never stored in any form; knowing it is necessary and
//! sufficient to recover the private key. Records are immutable after
//! creation — there is no rotation path.

use std::sync::Arc;

use keyfort_storage::{MemberKeyRecord, Store};
use rand::RngCore;
use tracing::info;
use uuid::Uuid;

use crate::error::{CryptoError, KeyError};
use crate::kdf::{self, KdfVersion, CURRENT_KDF_VERSION};
use crate::sealing::{self, PrivateKey, PublicKey, SymmetricKey};

/// The result of issuing a keypair.
///
/// The plaintext `private_key` exists only here, in memory, returned
/// once to the caller. Everything else is safe to persist.
#[derive(Debug)]
pub struct GeneratedKeyPair {
    pub public_key: PublicKey,
    /// Private key sealed under the protection key (72 bytes).
    pub encrypted_private_key: Vec<u8>,
    /// Protection key sealed under the password-derived key (72 bytes).
    pub encrypted_protection_key: Vec<u8>,
    /// Salt for the password KDF.
    pub salt: [u8; 32],
    /// The parameter set the password key was derived under.
    pub kdf_version: KdfVersion,
    /// The plaintext private key. Never persisted; zeroized on drop.
    pub private_key: PrivateKey,
}

impl GeneratedKeyPair {
    /// The persistable record for this keypair. Everything in it is
    /// safe to store; the plaintext private key stays behind.
    #[must_use]
    pub fn to_record(&self, user_id: Uuid) -> MemberKeyRecord {
        MemberKeyRecord {
            user_id,
            public_key: *self.public_key.as_bytes(),
            encrypted_private_key: self.encrypted_private_key.clone(),
            encrypted_protection_key: self.encrypted_protection_key.clone(),
            salt: self.salt,
            kdf_version: self.kdf_version.tag(),
        }
    }
}

/// Generate a password-protected keypair.
///
/// # Errors
///
/// Returns [`KeyError::Crypto`] if key derivation or sealing fails.
pub fn generate_key_pair(password: &str) -> Result<GeneratedKeyPair, KeyError> {
    let private_key = PrivateKey::generate();
    let public_key = private_key.public_key();

    let protection_key = SymmetricKey::generate();
    let encrypted_private_key = sealing::seal_symmetric(private_key.as_bytes(), &protection_key)
        .map_err(KeyError::Crypto)?;

    let mut salt = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let password_key = kdf::derive_password_key(password, &salt, CURRENT_KDF_VERSION)?;
    let encrypted_protection_key =
        sealing::seal_symmetric(protection_key.as_bytes(), &password_key)
            .map_err(KeyError::Crypto)?;

    Ok(GeneratedKeyPair {
        public_key,
        encrypted_private_key,
        encrypted_protection_key,
        salt,
        kdf_version: CURRENT_KDF_VERSION,
        private_key,
    })
}

/// Recover a private key from a password and the persisted record.
///
/// Re-derives the password key and unwraps both layers. A wrong password
/// fails [`KeyError::InvalidPassword`] — it can never produce a
/// wrong-but-plausible key, because each unwrap is authenticated.
///
/// # Errors
///
/// - [`KeyError::InvalidPassword`] if either unwrap fails
///   authentication.
/// - [`KeyError::UnknownKdfVersion`] if the record was issued under a
///   parameter set this build does not carry.
/// - [`KeyError::Crypto`] if a stored blob is structurally malformed.
pub fn recover_private_key(
    password: &str,
    record: &MemberKeyRecord,
) -> Result<PrivateKey, KeyError> {
    let version = KdfVersion::from_tag(record.kdf_version).ok_or(KeyError::UnknownKdfVersion {
        version: record.kdf_version,
    })?;

    let password_key = kdf::derive_password_key(password, &record.salt, version)?;

    let protection_key_bytes =
        open_as_password(&record.encrypted_protection_key, &password_key)?;
    let protection_key = SymmetricKey::from_bytes(to_key_array(protection_key_bytes)?);

    let private_key_bytes = open_as_password(&record.encrypted_private_key, &protection_key)?;
    Ok(PrivateKey::from_bytes(to_key_array(private_key_bytes)?))
}

/// Open a wrap layer, reading an authentication failure as a wrong
/// password. Structural corruption stays a crypto error — that is a
/// damaged record, not a bad password.
fn open_as_password(blob: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, KeyError> {
    match sealing::open_symmetric(blob, key) {
        Ok(plaintext) => Ok(plaintext),
        Err(CryptoError::AuthenticationFailed) => Err(KeyError::InvalidPassword),
        Err(e) => Err(KeyError::Crypto(e)),
    }
}

fn to_key_array(bytes: Vec<u8>) -> Result<[u8; 32], KeyError> {
    let len = bytes.len();
    <[u8; 32]>::try_from(bytes).map_err(|_| {
        KeyError::Crypto(CryptoError::CorruptCiphertext {
            expected: 32,
            actual: len,
        })
    })
}

/// Issues keypairs at signup and recovers them later, persisting the
/// records through the store.
pub struct KeyPairService {
    store: Arc<dyn Store>,
}

impl KeyPairService {
    /// Create a new keypair service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Issue a keypair for a new user and persist its record.
    ///
    /// Returns the full [`GeneratedKeyPair`], plaintext private key
    /// included — the caller's one chance to hand it to the session.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Crypto`] on derivation/sealing failure or
    /// [`KeyError::Storage`] if persistence fails.
    pub async fn register(
        &self,
        user_id: Uuid,
        password: &str,
    ) -> Result<GeneratedKeyPair, KeyError> {
        let pair = generate_key_pair(password)?;
        self.store.put_member_key_record(pair.to_record(user_id)).await?;
        info!(%user_id, "member keypair issued");
        Ok(pair)
    }

    /// Fetch a member's key record.
    ///
    /// # Errors
    ///
    /// - [`KeyError::NotFound`] if the user has no record.
    /// - [`KeyError::Storage`] if the backend fails.
    pub async fn record(&self, user_id: Uuid) -> Result<MemberKeyRecord, KeyError> {
        self.store
            .get_member_key_record(user_id)
            .await?
            .ok_or(KeyError::NotFound)
    }

    /// Recover a member's private key from their password.
    ///
    /// # Errors
    ///
    /// As [`recover_private_key`], plus [`KeyError::NotFound`] if the
    /// user has no record.
    pub async fn recover(&self, user_id: Uuid, password: &str) -> Result<PrivateKey, KeyError> {
        let record = self.record(user_id).await?;
        recover_private_key(password, &record)
    }
}

impl std::fmt::Debug for KeyPairService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPairService").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── issuance ─────────────────────────────────────────────────────

    #[test]
    fn generated_key_pair_has_expected_shapes() {
        let pair = generate_key_pair("correct-horse").unwrap();
        assert_eq!(pair.salt.len(), 32);
        // 24-byte nonce + 32-byte key + 16-byte tag.
        assert_eq!(pair.encrypted_private_key.len(), 72);
        assert_eq!(pair.encrypted_protection_key.len(), 72);
        assert_eq!(pair.public_key, pair.private_key.public_key());
        assert_eq!(pair.kdf_version, KdfVersion::V1);
    }

    #[test]
    fn two_generations_are_independent() {
        let a = generate_key_pair("pw").unwrap();
        let b = generate_key_pair("pw").unwrap();
        assert_ne!(a.public_key, b.public_key);
        assert_ne!(a.salt, b.salt);
    }

    // ── recovery ─────────────────────────────────────────────────────

    #[test]
    fn recover_with_correct_password() {
        let pair = generate_key_pair("correct-horse").unwrap();
        let original = *pair.private_key.as_bytes();
        let record = pair.to_record(Uuid::new_v4());

        let recovered = recover_private_key("correct-horse", &record).unwrap();
        assert_eq!(recovered.as_bytes(), &original);
    }

    #[test]
    fn recover_with_wrong_password_fails() {
        let record = generate_key_pair("correct-horse")
            .unwrap()
            .to_record(Uuid::new_v4());

        let result = recover_private_key("battery-staple", &record);
        assert!(matches!(result, Err(KeyError::InvalidPassword)));
    }

    #[test]
    fn recover_unknown_kdf_version_fails() {
        let mut record = generate_key_pair("pw").unwrap().to_record(Uuid::new_v4());
        record.kdf_version = 99;

        let result = recover_private_key("pw", &record);
        assert!(matches!(
            result,
            Err(KeyError::UnknownKdfVersion { version: 99 })
        ));
    }

    #[test]
    fn recover_truncated_record_is_corrupt_not_invalid_password() {
        let mut record = generate_key_pair("pw").unwrap().to_record(Uuid::new_v4());
        record.encrypted_protection_key.truncate(10);

        let result = recover_private_key("pw", &record);
        assert!(matches!(
            result,
            Err(KeyError::Crypto(CryptoError::CorruptCiphertext { .. }))
        ));
    }

    // ── service ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn register_persists_record_and_recover_roundtrips() {
        let service = KeyPairService::new(Arc::new(keyfort_storage::MemoryStore::new()));
        let user_id = Uuid::new_v4();

        let pair = service.register(user_id, "correct-horse").await.unwrap();
        let record = service.record(user_id).await.unwrap();
        assert_eq!(record.public_key, *pair.public_key.as_bytes());

        let recovered = service.recover(user_id, "correct-horse").await.unwrap();
        assert_eq!(recovered.as_bytes(), pair.private_key.as_bytes());
    }

    #[tokio::test]
    async fn recover_unknown_user_fails_not_found() {
        let service = KeyPairService::new(Arc::new(keyfort_storage::MemoryStore::new()));
        let result = service.recover(Uuid::new_v4(), "pw").await;
        assert!(matches!(result, Err(KeyError::NotFound)));
    }
}
