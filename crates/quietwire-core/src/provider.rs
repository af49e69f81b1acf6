//! Crypto provider capability.
//!
//! The `CryptoProvider` trait is the seam between this core and the
//! external cryptosystem (key generation, directory registration, and
//! authenticated encryption). The core treats every value crossing this
//! boundary as opaque: ciphertexts are unparsed strings and key material
//! is unparsed bytes.
//!
//! # Invariants
//!
//! Implementations MUST guarantee:
//!
//! 1. `auth_decrypt` verifies sender authentication before releasing any
//!    plaintext. Tampered or unverifiable input fails; altered plaintext is
//!    never returned.
//! 2. `register` reports an already-registered identity as
//!    [`ProviderError::AlreadyRegistered`], distinguishable from real
//!    failures. The session manager normalizes it to success.
//! 3. The token supplier passed to [`CryptoProvider::bind`] may be invoked
//!    on every provider call; implementations must not cache a token past
//!    its usefulness.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Identity, KeyRecord, TokenSupplier};

/// Errors reported by a crypto provider.
///
/// These are provider-boundary errors; the core translates them into its
/// own taxonomy ([`crate::CoreError`]) before anything reaches a caller.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The identity already has published key material in the directory.
    ///
    /// Not a real failure: registration is idempotent one level up.
    #[error("identity is already registered")]
    AlreadyRegistered,

    /// An identity has no published key material in the directory.
    #[error("identity not found in directory: {0}")]
    IdentityNotFound(Identity),

    /// The supplied authentication token was rejected or unusable.
    #[error("token rejected: {reason}")]
    Token {
        /// Provider's description of the token problem.
        reason: String,
    },

    /// A cryptographic operation failed (decode, verify, encrypt, decrypt).
    #[error("cryptographic operation failed: {reason}")]
    Crypto {
        /// Provider's description of the failure.
        reason: String,
    },

    /// The provider or its backing services could not be reached.
    #[error("provider unavailable: {reason}")]
    Unavailable {
        /// Provider's description of the outage.
        reason: String,
    },
}

/// External capability performing key management and authenticated
/// encryption for one messaging participant.
///
/// Binding yields a [`ProviderSession`] scoped to a single identity; all
/// further operations go through that session. One provider instance may
/// be bound many times (for different identities or after
/// re-initialization).
#[async_trait]
pub trait CryptoProvider: Send + Sync + 'static {
    /// Session type produced by [`CryptoProvider::bind`].
    type Session: ProviderSession;

    /// Bind a provider session for one identity.
    ///
    /// When `identity` is `None` the provider derives it from the embedded
    /// claim of the supplied token. The claim format is provider-specific,
    /// which is why derivation lives behind this trait rather than in the
    /// core.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Token`] if the token carries no usable
    /// identity claim, or other variants for provider-side failures.
    async fn bind(
        &self,
        identity: Option<Identity>,
        supplier: Arc<dyn TokenSupplier>,
    ) -> Result<Self::Session, ProviderError>;
}

/// Provider operations bound to a single identity.
#[async_trait]
pub trait ProviderSession: Send + Sync + 'static {
    /// The identity this session is bound to.
    fn identity(&self) -> &Identity;

    /// Publish this identity's key material to the directory.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::AlreadyRegistered`] if key material for
    /// this identity is already published.
    async fn register(&self) -> Result<(), ProviderError>;

    /// Resolve published key material for the given identities.
    ///
    /// The returned map contains every identity the directory knows; the
    /// caller enforces all-or-nothing semantics. Providers MAY instead fail
    /// early with [`ProviderError::IdentityNotFound`] for a missing entry.
    async fn lookup(
        &self,
        identities: &[Identity],
    ) -> Result<HashMap<Identity, KeyRecord>, ProviderError>;

    /// Encrypt `text` for the holder of `recipient`, binding this session's
    /// identity into the result so the recipient can verify origin.
    async fn auth_encrypt(&self, text: &str, recipient: &KeyRecord)
    -> Result<String, ProviderError>;

    /// Decrypt `text`, verifying sender authentication first.
    ///
    /// With `sender` present the message is verified against that
    /// published key; with `None` it is treated as authored by this
    /// session itself and verified against locally held material only.
    async fn auth_decrypt(
        &self,
        text: &str,
        sender: Option<&KeyRecord>,
    ) -> Result<String, ProviderError>;
}
