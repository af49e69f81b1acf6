//! Core error taxonomy.

use thiserror::Error;

use crate::types::Identity;

/// Every failure a command can terminate with.
///
/// Each variant maps to a stable wire code (see [`CoreError::code`]) so
/// the bridge can deliver structured `{code, message}` failures. Provider
/// detail strings are carried as free text; nothing provider-shaped leaks
/// past this enum.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A key-capable operation was issued before the session reached
    /// `Ready` (or before any session was bound at all).
    #[error("session not ready for key operations")]
    SessionNotReady,

    /// The provider refused to publish this identity's key material.
    ///
    /// The session stays eligible for another attempt; there is no
    /// poisoned state. "Already registered" is never surfaced this way.
    #[error("registration failed: {detail}")]
    RegistrationFailed {
        /// Provider's detail message.
        detail: String,
    },

    /// An identity has no published key material in the directory.
    #[error("user not found in directory: {identity}")]
    UserNotFound {
        /// The missing identity.
        identity: Identity,
    },

    /// Authenticated encryption failed.
    #[error("encryption failed: {detail}")]
    EncryptionFailed {
        /// Provider's detail message.
        detail: String,
    },

    /// Decryption or sender verification failed.
    ///
    /// Covers every decode and verification failure: unverified plaintext
    /// is never returned under any other variant.
    #[error("decryption failed: {detail}")]
    DecryptionFailed {
        /// Provider's detail message.
        detail: String,
    },

    /// A required argument was missing or malformed.
    ///
    /// Raised before any cryptographic or network call.
    #[error("bad argument: {detail}")]
    BadArgument {
        /// What was wrong with the arguments.
        detail: String,
    },

    /// The dispatched command name is not part of the command surface.
    #[error("no such command: {name}")]
    NoSuchCommand {
        /// The unknown command name.
        name: String,
    },

    /// A provider-bound call exceeded its deadline.
    ///
    /// Emitted by the bridge so a hung provider can never leave a
    /// responder uninvoked.
    #[error("provider call timed out after {after_ms} ms")]
    ProviderTimeout {
        /// The deadline that was exceeded, in milliseconds.
        after_ms: u64,
    },
}

impl CoreError {
    /// Stable wire code for this failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotReady => "SESSION_NOT_READY",
            Self::RegistrationFailed { .. } => "REGISTRATION_FAILED",
            Self::UserNotFound { .. } => "USER_NOT_FOUND",
            Self::EncryptionFailed { .. } => "ENCRYPTION_FAILED",
            Self::DecryptionFailed { .. } => "DECRYPTION_FAILED",
            Self::BadArgument { .. } => "BAD_ARGUMENT",
            Self::NoSuchCommand { .. } => "NO_SUCH_COMMAND",
            Self::ProviderTimeout { .. } => "PROVIDER_TIMEOUT",
        }
    }
}
