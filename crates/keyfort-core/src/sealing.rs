//! Sealing primitives for Keyfort.
//!
//! Provides the two encryption shapes everything else is built from:
//! symmetric AEAD sealing with XChaCha20-Poly1305, and anonymous
//! asymmetric sealing (sealed-box style) over X25519. All functions are
//! pure and stateless — safe to call concurrently from any number of
//! tasks.
//!
//! # Security model
//!
//! - Symmetric blobs are `nonce (24 bytes) || ciphertext || tag (16 bytes)`,
//!   with a fresh `OsRng` nonce per seal. Nonce reuse under one key is
//!   forbidden; the 192-bit space makes random nonces safe.
//! - Anonymous blobs are `ephemeral pubkey (32 bytes) || ciphertext ||
//!   tag (16 bytes)`. The AEAD key and nonce are derived with HKDF-SHA256
//!   from the X25519 shared secret, bound to both public keys. The nonce
//!   carries no entropy of its own — the fresh ephemeral secret per seal
//!   provides it. The sender is not recoverable by the recipient.
//! - All secret key types are zeroized on drop and redacted in `Debug`.

use std::fmt;

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Nonce length for XChaCha20-Poly1305 (192 bits).
pub const NONCE_LEN: usize = 24;

/// Poly1305 authentication tag length.
pub const TAG_LEN: usize = 16;

/// X25519 key length.
pub const KEY_LEN: usize = 32;

/// Minimum symmetric blob: nonce + tag.
const MIN_SEALED_LEN: usize = NONCE_LEN + TAG_LEN;

/// Minimum anonymous blob: ephemeral pubkey + tag.
const MIN_ANONYMOUS_LEN: usize = KEY_LEN + TAG_LEN;

/// HKDF output for the sealed-box construction: 32-byte key + 24-byte nonce.
const SEALED_BOX_OKM_LEN: usize = KEY_LEN + NONCE_LEN;

// ── Key types ────────────────────────────────────────────────────────

/// A 256-bit symmetric key, zeroized on drop.
///
/// Used for org keys, protection keys, password-derived keys, and the
/// server-held ephemeral keys behind environment tokens. The inner bytes
/// never appear in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a new random key using the OS CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Borrow the raw key bytes.
    ///
    /// Use with care — the caller must not log or persist these bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// An X25519 public key (32 bytes). Freely copyable and printable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey([u8; KEY_LEN]);

impl PublicKey {
    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    fn to_dalek(self) -> x25519_dalek::PublicKey {
        x25519_dalek::PublicKey::from(self.0)
    }
}

/// An X25519 private key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; KEY_LEN]);

impl PrivateKey {
    /// Create from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a new random private key.
    #[must_use]
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(rand::rngs::OsRng).to_bytes())
    }

    /// Derive the corresponding public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        let secret = StaticSecret::from(self.0);
        PublicKey(*x25519_dalek::PublicKey::from(&secret).as_bytes())
    }

    /// Borrow the raw key bytes.
    ///
    /// Use with care — the caller must not log or persist these bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

// ── Symmetric sealing ────────────────────────────────────────────────

/// Seal plaintext under a symmetric key with a fresh random nonce.
///
/// Returns `nonce (24 bytes) || ciphertext || tag (16 bytes)`.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
pub fn seal_symmetric(plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Open a blob produced by [`seal_symmetric`].
///
/// # Errors
///
/// - [`CryptoError::CorruptCiphertext`] if the blob is shorter than
///   nonce + tag.
/// - [`CryptoError::AuthenticationFailed`] on tag mismatch (wrong key,
///   corrupted data, or tampering).
pub fn open_symmetric(blob: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < MIN_SEALED_LEN {
        return Err(CryptoError::CorruptCiphertext {
            expected: MIN_SEALED_LEN,
            actual: blob.len(),
        });
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

// ── Anonymous sealing ────────────────────────────────────────────────

/// Seal plaintext to a recipient's public key, sealed-box style.
///
/// Returns `ephemeral pubkey (32 bytes) || ciphertext || tag (16 bytes)`.
/// Only the holder of the matching private key can open the blob, and
/// nothing in it identifies the sender.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the AEAD operation fails, or
/// [`CryptoError::KeyDerivation`] if HKDF expansion fails.
pub fn seal_anonymous(plaintext: &[u8], recipient: &PublicKey) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = EphemeralSecret::random_from_rng(rand::rngs::OsRng);
    let ephemeral_public = x25519_dalek::PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&recipient.to_dalek());

    let (key, nonce) = derive_box_key(
        shared.as_bytes(),
        ephemeral_public.as_bytes(),
        recipient.as_bytes(),
    )?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })?;

    let mut blob = Vec::with_capacity(KEY_LEN + ciphertext.len());
    blob.extend_from_slice(ephemeral_public.as_bytes());
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Open a blob produced by [`seal_anonymous`].
///
/// # Errors
///
/// - [`CryptoError::CorruptCiphertext`] if the blob is shorter than
///   ephemeral pubkey + tag.
/// - [`CryptoError::AuthenticationFailed`] on tag mismatch (wrong
///   recipient key, corrupted data, or tampering).
pub fn open_anonymous(
    blob: &[u8],
    recipient_public: &PublicKey,
    recipient_private: &PrivateKey,
) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < MIN_ANONYMOUS_LEN {
        return Err(CryptoError::CorruptCiphertext {
            expected: MIN_ANONYMOUS_LEN,
            actual: blob.len(),
        });
    }

    let (ephemeral_bytes, ciphertext) = blob.split_at(KEY_LEN);
    let mut ephemeral_public = [0u8; KEY_LEN];
    ephemeral_public.copy_from_slice(ephemeral_bytes);

    let secret = StaticSecret::from(*recipient_private.as_bytes());
    let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(ephemeral_public));

    let (key, nonce) = derive_box_key(
        shared.as_bytes(),
        &ephemeral_public,
        recipient_public.as_bytes(),
    )?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(&nonce), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Derive the sealed-box AEAD key and nonce from an X25519 shared secret.
///
/// HKDF-SHA256 with `info = ephemeral pubkey || recipient pubkey` binds
/// the derivation to this exact key pairing. The nonce needs no entropy
/// of its own: the ephemeral secret is fresh per seal.
fn derive_box_key(
    shared: &[u8; KEY_LEN],
    ephemeral_public: &[u8; KEY_LEN],
    recipient_public: &[u8; KEY_LEN],
) -> Result<(SymmetricKey, [u8; NONCE_LEN]), CryptoError> {
    let mut info = [0u8; KEY_LEN * 2];
    info[..KEY_LEN].copy_from_slice(ephemeral_public);
    info[KEY_LEN..].copy_from_slice(recipient_public);

    let hk = Hkdf::<Sha256>::new(None, shared);
    let mut okm = [0u8; SEALED_BOX_OKM_LEN];
    hk.expand(&info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation {
            reason: e.to_string(),
        })?;

    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&okm[..KEY_LEN]);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&okm[KEY_LEN..]);
    okm.zeroize();

    Ok((SymmetricKey::from_bytes(key), nonce))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── symmetric ────────────────────────────────────────────────────

    #[test]
    fn symmetric_roundtrip() {
        let key = SymmetricKey::generate();
        let plaintext = b"secret data for keyfort";
        let blob = seal_symmetric(plaintext, &key).unwrap();
        let opened = open_symmetric(&blob, &key).unwrap();
        assert_eq!(plaintext.as_slice(), opened.as_slice());
    }

    #[test]
    fn symmetric_blob_layout() {
        let key = SymmetricKey::generate();
        let blob = seal_symmetric(&[0u8; 32], &key).unwrap();
        // 24-byte nonce + 32-byte ciphertext + 16-byte tag.
        assert_eq!(blob.len(), 72);
    }

    #[test]
    fn symmetric_empty_plaintext() {
        let key = SymmetricKey::generate();
        let blob = seal_symmetric(b"", &key).unwrap();
        assert_eq!(blob.len(), NONCE_LEN + TAG_LEN);
        assert!(open_symmetric(&blob, &key).unwrap().is_empty());
    }

    #[test]
    fn symmetric_wrong_key_fails() {
        let blob = seal_symmetric(b"secret", &SymmetricKey::generate()).unwrap();
        let result = open_symmetric(&blob, &SymmetricKey::generate());
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn symmetric_too_short_fails() {
        let key = SymmetricKey::generate();
        let result = open_symmetric(&[0u8; 39], &key);
        assert!(matches!(
            result,
            Err(CryptoError::CorruptCiphertext {
                expected: 40,
                actual: 39
            })
        ));
    }

    #[test]
    fn symmetric_every_byte_flip_fails_auth() {
        let key = SymmetricKey::generate();
        let blob = seal_symmetric(b"tamper target", &key).unwrap();
        for i in 0..blob.len() {
            let mut tampered = blob.clone();
            tampered[i] ^= 0x01;
            let result = open_symmetric(&tampered, &key);
            assert!(
                matches!(result, Err(CryptoError::AuthenticationFailed)),
                "byte {i} flip was not caught"
            );
        }
    }

    #[test]
    fn symmetric_fresh_nonce_per_seal() {
        let key = SymmetricKey::generate();
        let a = seal_symmetric(b"same data", &key).unwrap();
        let b = seal_symmetric(b"same data", &key).unwrap();
        assert_ne!(a, b);
    }

    // ── anonymous ────────────────────────────────────────────────────

    #[test]
    fn anonymous_roundtrip() {
        let private = PrivateKey::generate();
        let public = private.public_key();
        let blob = seal_anonymous(b"for your eyes only", &public).unwrap();
        let opened = open_anonymous(&blob, &public, &private).unwrap();
        assert_eq!(opened, b"for your eyes only");
    }

    #[test]
    fn anonymous_blob_layout() {
        let public = PrivateKey::generate().public_key();
        let blob = seal_anonymous(&[0u8; 32], &public).unwrap();
        // 32-byte ephemeral pubkey + 32-byte ciphertext + 16-byte tag.
        assert_eq!(blob.len(), 80);
    }

    #[test]
    fn anonymous_wrong_recipient_fails() {
        let private = PrivateKey::generate();
        let public = private.public_key();
        let other = PrivateKey::generate();

        let blob = seal_anonymous(b"secret", &public).unwrap();
        let result = open_anonymous(&blob, &other.public_key(), &other);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn anonymous_too_short_fails() {
        let private = PrivateKey::generate();
        let result = open_anonymous(&[0u8; 47], &private.public_key(), &private);
        assert!(matches!(
            result,
            Err(CryptoError::CorruptCiphertext {
                expected: 48,
                actual: 47
            })
        ));
    }

    #[test]
    fn anonymous_every_byte_flip_fails_auth() {
        let private = PrivateKey::generate();
        let public = private.public_key();
        let blob = seal_anonymous(b"tamper target", &public).unwrap();
        for i in 0..blob.len() {
            let mut tampered = blob.clone();
            tampered[i] ^= 0x01;
            let result = open_anonymous(&tampered, &public, &private);
            assert!(
                matches!(result, Err(CryptoError::AuthenticationFailed)),
                "byte {i} flip was not caught"
            );
        }
    }

    #[test]
    fn anonymous_two_seals_differ() {
        let public = PrivateKey::generate().public_key();
        let a = seal_anonymous(b"same", &public).unwrap();
        let b = seal_anonymous(b"same", &public).unwrap();
        // Fresh ephemeral key per seal.
        assert_ne!(a, b);
    }

    // ── key types ────────────────────────────────────────────────────

    #[test]
    fn public_key_derivation_is_stable() {
        let private = PrivateKey::generate();
        assert_eq!(private.public_key(), private.public_key());
    }

    #[test]
    fn secret_key_debug_redacts_bytes() {
        let sym = format!("{:?}", SymmetricKey::generate());
        let private = format!("{:?}", PrivateKey::generate());
        assert!(sym.contains("[REDACTED]"));
        assert!(private.contains("[REDACTED]"));
    }
}
