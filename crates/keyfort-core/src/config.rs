//! Deployment configuration.
//!
//! The server keypair is deployment configuration, not application
//! logic: one fixed X25519 keypair per deployment, held in config, used
//! to seal the server copy of every org key. It is constructed once at
//! startup and passed explicitly into the services that need it — there
//! is no global registry.
//!
//! The Argon2id cost parameters are configuration in the same sense,
//! pinned per version in [`crate::kdf::KdfVersion`].

use crate::error::ConfigError;
use crate::sealing::{PrivateKey, PublicKey};

/// The fixed server keypair for a deployment.
///
/// Org keys sealed to `public` can be opened with `private` for
/// headless operations (CI pushes, token issuance) without a user
/// password in the loop.
#[derive(Debug)]
pub struct ServerKeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl ServerKeyPair {
    /// Build from an existing private key.
    #[must_use]
    pub fn new(private: PrivateKey) -> Self {
        Self {
            public: private.public_key(),
            private,
        }
    }

    /// Generate a fresh keypair. Intended for tests and first-boot
    /// provisioning; production deployments load a persisted key via
    /// [`from_hex`](Self::from_hex).
    #[must_use]
    pub fn generate() -> Self {
        Self::new(PrivateKey::generate())
    }

    /// Load the private key from a hex string (64 hex chars), as wired
    /// through environment configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidServerKey`] if the string is not
    /// exactly 32 bytes of hex.
    pub fn from_hex(private_hex: &str) -> Result<Self, ConfigError> {
        let bytes = hex::decode(private_hex).map_err(|e| ConfigError::InvalidServerKey {
            reason: e.to_string(),
        })?;
        let len = bytes.len();
        let array: [u8; 32] =
            bytes
                .try_into()
                .map_err(|_| ConfigError::InvalidServerKey {
                    reason: format!("expected 32 bytes, got {len}"),
                })?;
        Ok(Self::new(PrivateKey::from_bytes(array)))
    }

    /// The server's public key.
    #[must_use]
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// The server's private key.
    #[must_use]
    pub fn private(&self) -> &PrivateKey {
        &self.private
    }
}
