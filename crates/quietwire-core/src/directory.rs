//! Public key directory lookup.
//!
//! Resolves identities to their published key material through the bound
//! provider session. Lookups are all-or-nothing: callers ask for the full
//! set of recipients they need, and any missing identity fails the whole
//! batch. Results are fetched fresh on every call; nothing is cached on
//! this side of the provider boundary.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::provider::{CryptoProvider, ProviderError, ProviderSession};
use crate::session::SessionManager;
use crate::types::{Identity, KeyRecord};

/// Failures from a directory lookup.
///
/// Kept separate from [`crate::CoreError`] because the caller decides how
/// a provider-side failure is classified: a lookup on the encrypt path
/// becomes `ENCRYPTION_FAILED`, on the decrypt path `DECRYPTION_FAILED`.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No `Ready` session to query through.
    #[error("session not ready for key operations")]
    NotReady,

    /// A requested identity has no published key material.
    #[error("user not found in directory: {0}")]
    UserNotFound(Identity),

    /// The provider failed for a reason other than a missing identity.
    #[error(transparent)]
    Provider(ProviderError),
}

/// Identity → published key material resolution.
pub struct Directory<P: CryptoProvider> {
    sessions: Arc<SessionManager<P>>,
}

impl<P: CryptoProvider> Directory<P> {
    /// Create a directory view over the given session manager.
    pub fn new(sessions: Arc<SessionManager<P>>) -> Self {
        Self { sessions }
    }

    /// Resolve published key material for every requested identity.
    ///
    /// # Errors
    ///
    /// - [`DirectoryError::NotReady`] before the session reaches `Ready`
    /// - [`DirectoryError::UserNotFound`] naming the first identity absent
    ///   from the directory; no partial map is ever returned
    /// - [`DirectoryError::Provider`] for other provider failures
    pub async fn lookup(
        &self,
        identities: &[Identity],
    ) -> Result<HashMap<Identity, KeyRecord>, DirectoryError> {
        let session = self.sessions.ready().await.map_err(|_| DirectoryError::NotReady)?;

        let records = session.handle().lookup(identities).await.map_err(|e| match e {
            ProviderError::IdentityNotFound(identity) => DirectoryError::UserNotFound(identity),
            other => DirectoryError::Provider(other),
        })?;

        // Providers may return the subset they found; enforce the batch
        // contract here.
        for identity in identities {
            if !records.contains_key(identity) {
                tracing::debug!(identity = %identity, "lookup miss");
                return Err(DirectoryError::UserNotFound(identity.clone()));
            }
        }

        Ok(records)
    }

    /// Resolve a single identity.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Directory::lookup`], plus
    /// [`DirectoryError::Provider`] if the provider omits the identity
    /// without flagging it missing.
    pub async fn lookup_one(&self, identity: &Identity) -> Result<KeyRecord, DirectoryError> {
        let mut records = self.lookup(std::slice::from_ref(identity)).await?;
        records.remove(identity).ok_or_else(|| {
            DirectoryError::Provider(ProviderError::Crypto {
                reason: format!("provider returned no record for {identity}"),
            })
        })
    }
}

impl<P: CryptoProvider> std::fmt::Debug for Directory<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory").finish_non_exhaustive()
    }
}
