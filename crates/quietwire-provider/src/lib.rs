//! Quietwire software crypto provider
//!
//! A self-contained [`CryptoProvider`] implementation backed by an
//! in-memory directory, for tests and local development. Production
//! deployments substitute a provider backed by a real key directory; the
//! core compiles against the trait only and never depends on this crate.
//!
//! # Design
//!
//! - Per-identity static x25519 agreement keypair and ed25519 signing
//!   keypair, generated on first bind and reused on re-bind (the local
//!   keystore plays the role of a device key storage)
//! - `register()` publishes the public halves to the shared directory;
//!   re-registration reports `AlreadyRegistered`
//! - Messages travel as a CBOR envelope (base64-encoded): both agreement
//!   keys, AEAD nonce, ciphertext, and an ed25519 signature over the rest
//! - Key derivation: HKDF-SHA256 over the static Diffie-Hellman shared
//!   secret, bound to both parties' public keys
//!
//! # Security Properties
//!
//! - Sender Authentication: the signature is verified against the
//!   directory-published signing key (or the local key for own messages)
//!   before any plaintext is released
//! - Tamper Evidence: any modified envelope byte fails either the
//!   signature check or the AEAD tag
//!
//! [`CryptoProvider`]: quietwire_core::CryptoProvider

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
mod software;

pub use software::{SoftwareProvider, SoftwareSession};
