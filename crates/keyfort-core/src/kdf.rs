//! Password key derivation with pinned, versioned Argon2id parameters.
//!
//! The password-derived key wraps the protection key, which wraps the
//! private key. Recovery of previously issued keys therefore depends on
//! re-deriving the exact same password key — so the cost parameters are
//! pinned per version and every member key record stores the version it
//! was issued under. Changing parameters means adding a new version,
//! never mutating an existing one.

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::sealing::SymmetricKey;

/// A pinned Argon2id parameter set.
///
/// Cost is tuned so derivation stays in the tens-of-milliseconds range:
/// this work is synchronous and blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KdfVersion {
    /// Argon2id, t=3, m=32768 KiB, p=4, 32-byte output.
    V1 = 1,
}

/// The version used for newly issued keys.
pub const CURRENT_KDF_VERSION: KdfVersion = KdfVersion::V1;

impl KdfVersion {
    /// Look up a version by its persisted tag.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::V1),
            _ => None,
        }
    }

    /// The tag persisted in member key records.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    fn params(self) -> Result<Params, CryptoError> {
        let (t_cost, m_cost, p_cost) = match self {
            Self::V1 => (3, 32 * 1024, 4),
        };
        Params::new(m_cost, t_cost, p_cost, Some(32)).map_err(|e| CryptoError::KeyDerivation {
            reason: e.to_string(),
        })
    }
}

/// Derive a 256-bit password key from a password and salt.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if the Argon2 computation
/// fails (invalid parameters or salt length).
pub fn derive_password_key(
    password: &str,
    salt: &[u8; 32],
    version: KdfVersion,
) -> Result<SymmetricKey, CryptoError> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, version.params()?);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut output)
        .map_err(|e| CryptoError::KeyDerivation {
            reason: e.to_string(),
        })?;

    let key = SymmetricKey::from_bytes(output);
    output.zeroize();
    Ok(key)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn same_password_and_salt_derive_same_key() {
        let salt = [0x42; 32];
        let a = derive_password_key("correct-horse", &salt, KdfVersion::V1).unwrap();
        let b = derive_password_key("correct-horse", &salt, KdfVersion::V1).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_password_derives_different_key() {
        let salt = [0x42; 32];
        let a = derive_password_key("correct-horse", &salt, KdfVersion::V1).unwrap();
        let b = derive_password_key("battery-staple", &salt, KdfVersion::V1).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_salt_derives_different_key() {
        let a = derive_password_key("correct-horse", &[0x01; 32], KdfVersion::V1).unwrap();
        let b = derive_password_key("correct-horse", &[0x02; 32], KdfVersion::V1).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn version_tags_roundtrip() {
        assert_eq!(KdfVersion::from_tag(1), Some(KdfVersion::V1));
        assert_eq!(KdfVersion::from_tag(0), None);
        assert_eq!(KdfVersion::from_tag(99), None);
        assert_eq!(CURRENT_KDF_VERSION.tag(), 1);
    }
}
