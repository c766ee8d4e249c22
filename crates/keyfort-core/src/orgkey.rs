//! Org-key creation and per-principal distribution.
//!
//! Each organization has one 32-byte symmetric key that encrypts all of
//! its secrets. The key itself is never persisted — only sealed copies
//! are: one per member (sealed to that member's public key) and one
//! server copy (sealed to the fixed deployment keypair). Interactive
//! sessions open the member copy with a password-recovered private key;
//! headless operations open the server copy without any password in the
//! loop.
//!
//! The org key is generated exactly once per organization. There is no
//! rotation path.

use std::sync::Arc;

use keyfort_storage::{MemberKeyRecord, Principal, Store};
use tracing::info;
use uuid::Uuid;

use crate::config::ServerKeyPair;
use crate::error::{CryptoError, OrgKeyError};
use crate::keypair;
use crate::sealing::{self, PublicKey, SymmetricKey};

/// Generate a fresh org key.
///
/// Callers are responsible for sealing it to every principal before it
/// goes out of scope — the plaintext key must never be persisted.
#[must_use]
pub fn create_org_key() -> SymmetricKey {
    SymmetricKey::generate()
}

/// Seal an org key to a member's public key.
///
/// Returns the 80-byte sealed blob stored as that member's copy.
///
/// # Errors
///
/// Returns [`CryptoError`] if sealing fails.
pub fn grant_member_access(
    org_key: &SymmetricKey,
    member_public: &PublicKey,
) -> Result<Vec<u8>, CryptoError> {
    sealing::seal_anonymous(org_key.as_bytes(), member_public)
}

/// Seal an org key to the server's public key.
///
/// Returns the 80-byte sealed blob stored as the org's server copy.
///
/// # Errors
///
/// Returns [`CryptoError`] if sealing fails.
pub fn grant_server_access(
    org_key: &SymmetricKey,
    server_public: &PublicKey,
) -> Result<Vec<u8>, CryptoError> {
    sealing::seal_anonymous(org_key.as_bytes(), server_public)
}

/// Open a member's org-key copy using their password.
///
/// Recovers the member's private key from the password, then opens the
/// sealed copy. Fails [`crate::error::KeyError::InvalidPassword`] (via
/// [`OrgKeyError::Key`]) on a wrong password and
/// [`CryptoError::AuthenticationFailed`] if the copy was not sealed to
/// this member.
///
/// # Errors
///
/// See above; storage is not involved — both inputs are caller-supplied.
pub fn decrypt_member_key(
    password: &str,
    record: &MemberKeyRecord,
    member_copy: &[u8],
) -> Result<SymmetricKey, OrgKeyError> {
    let private_key = keypair::recover_private_key(password, record)?;
    let public_key = PublicKey::from_bytes(record.public_key);

    let key_bytes = sealing::open_anonymous(member_copy, &public_key, &private_key)?;
    to_org_key(key_bytes)
}

/// Distributes org keys through the store.
///
/// Holds the fixed server keypair from deployment config. Construct one
/// at startup and pass it to call sites — services take their
/// dependencies explicitly.
pub struct OrgKeyService {
    store: Arc<dyn Store>,
    server_keys: ServerKeyPair,
}

impl OrgKeyService {
    /// Create a new org-key service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, server_keys: ServerKeyPair) -> Self {
        Self { store, server_keys }
    }

    /// The server's public key (for sealing new copies).
    #[must_use]
    pub fn server_public(&self) -> &PublicKey {
        self.server_keys.public()
    }

    /// Provision an organization's key: generate it, seal a copy to the
    /// creator and a copy to the server, persist both, and return the
    /// plaintext key for immediate use.
    ///
    /// # Errors
    ///
    /// - [`OrgKeyError::AlreadyProvisioned`] if the org already has a
    ///   key — the org key is generated exactly once.
    /// - [`OrgKeyError::Crypto`] / [`OrgKeyError::Storage`] on sealing
    ///   or persistence failure.
    pub async fn provision_org(
        &self,
        org_id: Uuid,
        creator_user_id: Uuid,
        creator_public: &PublicKey,
    ) -> Result<SymmetricKey, OrgKeyError> {
        let existing = self
            .store
            .get_org_key_copy(org_id, Principal::Server)
            .await?;
        if existing.is_some() {
            return Err(OrgKeyError::AlreadyProvisioned { org_id });
        }

        let org_key = create_org_key();
        let member_copy = grant_member_access(&org_key, creator_public)?;
        let server_copy = grant_server_access(&org_key, self.server_keys.public())?;

        self.store
            .put_org_key_copy(org_id, Principal::Member(creator_user_id), member_copy)
            .await?;
        self.store
            .put_org_key_copy(org_id, Principal::Server, server_copy)
            .await?;

        info!(%org_id, %creator_user_id, "org key provisioned");

        Ok(org_key)
    }

    /// Fetch a member's sealed copy.
    ///
    /// # Errors
    ///
    /// - [`OrgKeyError::NotFound`] if the member has no copy for this org.
    /// - [`OrgKeyError::Storage`] if the backend fails.
    pub async fn member_copy(&self, org_id: Uuid, user_id: Uuid) -> Result<Vec<u8>, OrgKeyError> {
        self.store
            .get_org_key_copy(org_id, Principal::Member(user_id))
            .await?
            .ok_or(OrgKeyError::NotFound { org_id })
    }

    /// Open the org's server copy with the fixed deployment keypair.
    ///
    /// This is the headless path: no user password is involved, and the
    /// plaintext org key exists only for the duration of the operation.
    ///
    /// # Errors
    ///
    /// - [`OrgKeyError::NotFound`] if the org has no server copy.
    /// - [`OrgKeyError::Crypto`] if the copy does not open under the
    ///   deployment keypair.
    pub async fn get_server_org_key(&self, org_id: Uuid) -> Result<SymmetricKey, OrgKeyError> {
        let copy = self
            .store
            .get_org_key_copy(org_id, Principal::Server)
            .await?
            .ok_or(OrgKeyError::NotFound { org_id })?;

        let key_bytes = sealing::open_anonymous(
            &copy,
            self.server_keys.public(),
            self.server_keys.private(),
        )?;
        to_org_key(key_bytes)
    }
}

impl std::fmt::Debug for OrgKeyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrgKeyService").finish_non_exhaustive()
    }
}

fn to_org_key(bytes: Vec<u8>) -> Result<SymmetricKey, OrgKeyError> {
    let len = bytes.len();
    let array: [u8; 32] =
        bytes
            .try_into()
            .map_err(|_| OrgKeyError::MalformedKey { actual: len })?;
    Ok(SymmetricKey::from_bytes(array))
}
