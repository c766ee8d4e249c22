//! Core library for Keyfort.
//!
//! Implements the key/encryption engine of the platform: sealing
//! primitives, password-protected keypair issuance, org-key
//! distribution, the per-value secret envelope, versioned secret
//! snapshots, revocable environment tokens, and the invite
//! re-encryption flow. This crate depends on `keyfort-storage` for the
//! record store trait and knows nothing about transports or request
//! handling.
//!
//! # Key hierarchy
//!
//! ```text
//! password ──Argon2id──▶ password key
//!                            │ wraps
//!                            ▼
//!                      protection key
//!                            │ wraps
//!                            ▼
//!                     member private key ◀─── sealed org-key copies
//!                                                  │
//!                                                  ▼
//!                                               org key
//!                                                  │ seals
//!                                                  ▼
//!                                           secret payloads
//! ```
//!
//! Services are constructed once at startup with their dependencies
//! passed in explicitly; there is no global registry.

pub mod config;
pub mod error;
pub mod invite;
pub mod kdf;
pub mod keypair;
pub mod orgkey;
pub mod payload;
pub mod sealing;
pub mod snapshot;
pub mod token;
