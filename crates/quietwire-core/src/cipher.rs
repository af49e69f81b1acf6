//! Message cipher.
//!
//! Authenticated encrypt/decrypt of short text payloads against the bound
//! session. Three operations:
//!
//! - `encrypt`: resolve the recipient's key, then provider
//!   authenticated-encrypt binding the sender identity into the result
//! - `decrypt_own`: decrypt a message this session authored; no lookup,
//!   self-authentication uses only locally held material
//! - `decrypt_from_sender`: resolve the sender's key, verify, decrypt;
//!   unverified plaintext is never released

use std::sync::Arc;

use crate::directory::{Directory, DirectoryError};
use crate::error::CoreError;
use crate::provider::{CryptoProvider, ProviderSession};
use crate::session::SessionManager;
use crate::types::Identity;

/// Authenticated encryption over the bound session and directory.
pub struct MessageCipher<P: CryptoProvider> {
    sessions: Arc<SessionManager<P>>,
    directory: Directory<P>,
}

impl<P: CryptoProvider> MessageCipher<P> {
    /// Create a cipher over the given session manager.
    pub fn new(sessions: Arc<SessionManager<P>>) -> Self {
        let directory = Directory::new(Arc::clone(&sessions));
        Self { sessions, directory }
    }

    /// The directory view this cipher resolves keys through.
    pub fn directory(&self) -> &Directory<P> {
        &self.directory
    }

    /// Encrypt `plaintext` for `recipient`, binding the sender identity
    /// into the ciphertext so the recipient can verify origin.
    ///
    /// # Errors
    ///
    /// [`CoreError::SessionNotReady`], [`CoreError::UserNotFound`], or
    /// [`CoreError::EncryptionFailed`] with the provider's detail.
    pub async fn encrypt(
        &self,
        plaintext: &str,
        recipient: &Identity,
    ) -> Result<String, CoreError> {
        let session = self.sessions.ready().await?;
        let record = self
            .directory
            .lookup_one(recipient)
            .await
            .map_err(|e| classify(e, CoreError::encryption_failed))?;

        session.handle().auth_encrypt(plaintext, &record).await.map_err(|e| {
            tracing::warn!(recipient = %recipient, error = %e, "encrypt failed");
            CoreError::EncryptionFailed { detail: e.to_string() }
        })
    }

    /// Decrypt a message this session itself authored.
    ///
    /// Requires no directory lookup: self-authentication uses only locally
    /// held key material.
    ///
    /// # Errors
    ///
    /// [`CoreError::SessionNotReady`] or [`CoreError::DecryptionFailed`].
    pub async fn decrypt_own(&self, ciphertext: &str) -> Result<String, CoreError> {
        let session = self.sessions.ready().await?;
        session.handle().auth_decrypt(ciphertext, None).await.map_err(|e| {
            tracing::debug!(error = %e, "own-message decrypt failed");
            CoreError::DecryptionFailed { detail: e.to_string() }
        })
    }

    /// Decrypt a message from `sender`, verifying its authentication
    /// against the sender's published key before releasing plaintext.
    ///
    /// # Errors
    ///
    /// [`CoreError::SessionNotReady`], [`CoreError::UserNotFound`] for an
    /// unknown sender, or [`CoreError::DecryptionFailed`] for any decode
    /// or verification failure.
    pub async fn decrypt_from_sender(
        &self,
        ciphertext: &str,
        sender: &Identity,
    ) -> Result<String, CoreError> {
        let session = self.sessions.ready().await?;
        let record = self
            .directory
            .lookup_one(sender)
            .await
            .map_err(|e| classify(e, CoreError::decryption_failed))?;

        session.handle().auth_decrypt(ciphertext, Some(&record)).await.map_err(|e| {
            tracing::debug!(sender = %sender, error = %e, "decrypt failed");
            CoreError::DecryptionFailed { detail: e.to_string() }
        })
    }
}

impl CoreError {
    fn encryption_failed(detail: String) -> Self {
        Self::EncryptionFailed { detail }
    }

    fn decryption_failed(detail: String) -> Self {
        Self::DecryptionFailed { detail }
    }
}

/// Map a directory failure into the taxonomy of the calling operation.
fn classify(error: DirectoryError, on_provider: fn(String) -> CoreError) -> CoreError {
    match error {
        DirectoryError::NotReady => CoreError::SessionNotReady,
        DirectoryError::UserNotFound(identity) => CoreError::UserNotFound { identity },
        DirectoryError::Provider(e) => on_provider(e.to_string()),
    }
}

impl<P: CryptoProvider> std::fmt::Debug for MessageCipher<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCipher").finish_non_exhaustive()
    }
}
