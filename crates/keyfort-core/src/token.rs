//! Revocable environment tokens.
//!
//! An environment token lets a non-interactive caller (CI, sync jobs)
//! obtain the org key scoped to one environment. The token bytes are the
//! org key sealed under a random ephemeral key `K` that only the server
//! keeps; possession of the ciphertext alone is useless. What looks like
//! a static bearer credential is therefore instantly revocable: delete
//! the stored record and the token is inert, even though the ciphertext
//! stays mathematically valid.
//!
//! # Security model
//!
//! - Tokens are never stored — only `SHA-256(token)` (the lookup key)
//!   and `K`. The token bytes are returned once at issuance.
//! - Lookup is by hash; the stored hash is re-compared in constant time.
//! - Expiry is checked before any decryption work.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use keyfort_storage::{Store, TokenRecord};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::info;
use uuid::Uuid;

use crate::error::{CryptoError, TokenError};
use crate::sealing::{self, SymmetricKey};

/// Issues and validates revocable environment tokens.
pub struct TokenService {
    store: Arc<dyn Store>,
}

impl TokenService {
    /// Create a new token service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Issue a token granting `env_id`-scoped access to `org_key`.
    ///
    /// Returns the 72-byte token ciphertext. This is the only moment
    /// the ephemeral key and the token coexist outside storage; the
    /// token itself is never persisted.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Crypto`] if sealing fails or
    /// [`TokenError::Storage`] if persistence fails.
    pub async fn issue(
        &self,
        org_key: &SymmetricKey,
        org_id: Uuid,
        env_id: Uuid,
        expires_at: DateTime<Utc>,
        name: &str,
    ) -> Result<Vec<u8>, TokenError> {
        let ephemeral = SymmetricKey::generate();
        let token = sealing::seal_symmetric(org_key.as_bytes(), &ephemeral)?;
        let hash = hash_token(&token);

        let record = TokenRecord {
            id: Uuid::new_v4(),
            org_id,
            env_id,
            key: *ephemeral.as_bytes(),
            hash: hash.clone(),
            expires_at,
            name: name.to_owned(),
        };
        self.store.put_token_record(record).await?;

        info!(
            %org_id,
            %env_id,
            name,
            hash_prefix = &hash[..8],
            "environment token issued"
        );

        Ok(token)
    }

    /// Validate a presented token and recover the org key it carries.
    ///
    /// Returns the org key and the environment the token is bound to.
    /// The caller must scope every subsequent operation to that
    /// environment.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Revoked`] if no record matches the token's hash
    ///   (revoked or never issued).
    /// - [`TokenError::WrongOrganization`] if the token belongs to a
    ///   different organization.
    /// - [`TokenError::Expired`] if the expiry has passed.
    /// - [`TokenError::AuthenticationFailed`] if the bytes do not open
    ///   under the stored key.
    pub async fn validate(
        &self,
        presented: &[u8],
        org_id: Uuid,
    ) -> Result<(SymmetricKey, Uuid), TokenError> {
        let hash = hash_token(presented);
        let record = self
            .store
            .get_token_record_by_hash(&hash)
            .await?
            .ok_or(TokenError::Revoked)?;

        // The store looked up by hash already; re-compare in constant
        // time so a backend with loose key matching cannot weaken this.
        if record.hash.as_bytes().ct_eq(hash.as_bytes()).unwrap_u8() == 0 {
            return Err(TokenError::Revoked);
        }

        if record.org_id != org_id {
            return Err(TokenError::WrongOrganization { org_id });
        }

        if Utc::now() > record.expires_at {
            return Err(TokenError::Expired {
                expired_at: record.expires_at.to_rfc3339(),
            });
        }

        let ephemeral = SymmetricKey::from_bytes(record.key);
        let org_key_bytes = match sealing::open_symmetric(presented, &ephemeral) {
            Ok(bytes) => bytes,
            Err(CryptoError::AuthenticationFailed) => {
                return Err(TokenError::AuthenticationFailed)
            }
            Err(e) => return Err(TokenError::Crypto(e)),
        };

        let len = org_key_bytes.len();
        let array: [u8; 32] = org_key_bytes.try_into().map_err(|_| {
            TokenError::Crypto(CryptoError::CorruptCiphertext {
                expected: 32,
                actual: len,
            })
        })?;

        Ok((SymmetricKey::from_bytes(array), record.env_id))
    }

    /// Revoke a token by deleting its record. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Storage`] if the backend fails.
    pub async fn revoke(&self, token_id: Uuid) -> Result<(), TokenError> {
        self.store.delete_token_record(token_id).await?;
        info!(%token_id, "environment token revoked");
        Ok(())
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

/// Hash token bytes with SHA-256, returning the hex-encoded digest used
/// as the storage lookup key.
#[must_use]
pub fn hash_token(token: &[u8]) -> String {
    hex::encode(Sha256::digest(token))
}
