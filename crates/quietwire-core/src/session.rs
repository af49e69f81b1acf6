//! Identity session manager.
//!
//! Owns the single bound session for this core instance: the identity,
//! its token-refresh capability, the provider handle, and the
//! registration state machine (`Uninitialized → Initializing → Ready`).
//!
//! ## Responsibilities
//!
//! - Session Lifecycle: bind and wholesale-replace the session
//! - Idempotent Registration: "already registered" is success, not error
//! - Readiness Gating: key-capable operations only against a `Ready`
//!   session

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::provider::{CryptoProvider, ProviderError, ProviderSession};
use crate::types::{Identity, TokenSupplier};

/// Registration state of the bound session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session bound yet.
    #[default]
    Uninitialized,
    /// Session bound; key material not yet published.
    Initializing,
    /// Key material published; key-capable operations accepted.
    Ready,
}

/// The bound session: identity, token capability, provider handle, state.
///
/// Sessions are cheap to clone (shared fields) so callers can snapshot
/// the current session, drop the manager's lock, and run long provider
/// calls against the snapshot.
pub struct Session<S> {
    identity: Identity,
    supplier: Arc<dyn TokenSupplier>,
    handle: Arc<S>,
    state: SessionState,
}

impl<S> Session<S> {
    /// The identity this session is bound to.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Registration state at the time this snapshot was taken.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The bound provider session.
    pub fn handle(&self) -> &S {
        &self.handle
    }

    /// The token capability bound at initialization.
    pub fn supplier(&self) -> &Arc<dyn TokenSupplier> {
        &self.supplier
    }
}

impl<S> Clone for Session<S> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            supplier: Arc::clone(&self.supplier),
            handle: Arc::clone(&self.handle),
            state: self.state,
        }
    }
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("state", &self.state)
            .finish()
    }
}

/// Owns the session slot and makes registration idempotent.
///
/// One instance represents at most one identity at a time. The slot is a
/// read-mostly shared resource: lookups and cipher operations clone the
/// current session under a read lock; only [`SessionManager::initialize`]
/// writes, replacing the session wholesale.
pub struct SessionManager<P: CryptoProvider> {
    provider: P,
    slot: RwLock<Option<Session<P::Session>>>,
}

impl<P: CryptoProvider> SessionManager<P> {
    /// Create a manager over the given provider. No session is bound yet.
    pub fn new(provider: P) -> Self {
        Self { provider, slot: RwLock::new(None) }
    }

    /// Current registration state.
    pub async fn state(&self) -> SessionState {
        self.slot.read().await.as_ref().map_or(SessionState::Uninitialized, Session::state)
    }

    /// Identity of the bound session, if any.
    pub async fn identity(&self) -> Option<Identity> {
        self.slot.read().await.as_ref().map(|s| s.identity().clone())
    }

    /// Bind a new session, atomically replacing any prior one.
    ///
    /// When `identity` is `None` the provider derives it from the token's
    /// embedded claim. The new session starts in `Initializing`; call
    /// [`SessionManager::register`] to reach `Ready`.
    ///
    /// # Atomicity
    ///
    /// The slot is swapped wholesale under the write lock. Operations
    /// already in flight hold a clone of the previous session and complete
    /// entirely against it; operations dispatched after this call observe
    /// only the new one. No operation ever sees a torn mix.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BadArgument`] if the provider rejects the
    /// token (for example: no identity claim to derive from), or
    /// [`CoreError::RegistrationFailed`] for other bind failures.
    pub async fn initialize(
        &self,
        identity: Option<Identity>,
        supplier: Arc<dyn TokenSupplier>,
    ) -> Result<(), CoreError> {
        let handle = self.provider.bind(identity, Arc::clone(&supplier)).await.map_err(|e| {
            match e {
                ProviderError::Token { reason } => CoreError::BadArgument { detail: reason },
                other => CoreError::RegistrationFailed { detail: other.to_string() },
            }
        })?;

        let session = Session {
            identity: handle.identity().clone(),
            supplier,
            handle: Arc::new(handle),
            state: SessionState::Initializing,
        };

        let mut slot = self.slot.write().await;
        if let Some(previous) = slot.as_ref() {
            tracing::info!(
                previous = %previous.identity(),
                identity = %session.identity(),
                "replacing bound session"
            );
        } else {
            tracing::info!(identity = %session.identity(), "session bound");
        }
        *slot = Some(session);

        Ok(())
    }

    /// Publish this identity's key material to the directory.
    ///
    /// Idempotent: a provider report of "already registered" is treated
    /// as success. Any other provider failure surfaces as
    /// `REGISTRATION_FAILED` and leaves the session in `Initializing`,
    /// eligible for another attempt.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionNotReady`] if no session is bound, or
    /// [`CoreError::RegistrationFailed`] with the provider's detail.
    pub async fn register(&self) -> Result<(), CoreError> {
        let session =
            self.slot.read().await.as_ref().cloned().ok_or(CoreError::SessionNotReady)?;

        match session.handle().register().await {
            Ok(()) => {}
            Err(ProviderError::AlreadyRegistered) => {
                tracing::debug!(identity = %session.identity(), "already registered, treating as success");
            }
            Err(e) => {
                tracing::warn!(identity = %session.identity(), error = %e, "registration failed");
                return Err(CoreError::RegistrationFailed { detail: e.to_string() });
            }
        }

        // Promote to Ready, but only if the slot still holds the session we
        // registered. A racing re-initialization must not inherit readiness.
        let mut slot = self.slot.write().await;
        if let Some(current) = slot.as_mut() {
            if Arc::ptr_eq(&current.handle, &session.handle) {
                current.state = SessionState::Ready;
                tracing::debug!(identity = %current.identity(), "session ready");
            }
        }

        Ok(())
    }

    /// Snapshot the bound session if it has reached `Ready`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionNotReady`] when no session is bound or
    /// registration has not completed.
    pub async fn ready(&self) -> Result<Session<P::Session>, CoreError> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some(session) if session.state() == SessionState::Ready => Ok(session.clone()),
            _ => Err(CoreError::SessionNotReady),
        }
    }
}

impl<P: CryptoProvider> std::fmt::Debug for SessionManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::types::{KeyRecord, StaticToken, Token};

    /// Provider double with a shared in-memory directory and injectable
    /// registration failures.
    #[derive(Default)]
    struct MockProvider {
        registered: Arc<Mutex<HashSet<Identity>>>,
        fail_register: Arc<AtomicBool>,
        register_calls: Arc<AtomicUsize>,
    }

    struct MockSession {
        identity: Identity,
        registered: Arc<Mutex<HashSet<Identity>>>,
        fail_register: Arc<AtomicBool>,
        register_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CryptoProvider for MockProvider {
        type Session = MockSession;

        async fn bind(
            &self,
            identity: Option<Identity>,
            supplier: Arc<dyn TokenSupplier>,
        ) -> Result<Self::Session, ProviderError> {
            let identity = match identity {
                Some(identity) => identity,
                None => {
                    let token = supplier.token();
                    let (_, claim) = token.as_str().split_once('@').ok_or_else(|| {
                        ProviderError::Token { reason: "no identity claim".to_string() }
                    })?;
                    Identity::new(claim)
                }
            };
            Ok(MockSession {
                identity,
                registered: Arc::clone(&self.registered),
                fail_register: Arc::clone(&self.fail_register),
                register_calls: Arc::clone(&self.register_calls),
            })
        }
    }

    #[async_trait]
    impl ProviderSession for MockSession {
        fn identity(&self) -> &Identity {
            &self.identity
        }

        async fn register(&self) -> Result<(), ProviderError> {
            self.register_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_register.load(Ordering::SeqCst) {
                return Err(ProviderError::Unavailable { reason: "backend down".to_string() });
            }
            if !self.registered.lock().unwrap().insert(self.identity.clone()) {
                return Err(ProviderError::AlreadyRegistered);
            }
            Ok(())
        }

        async fn lookup(
            &self,
            identities: &[Identity],
        ) -> Result<std::collections::HashMap<Identity, KeyRecord>, ProviderError> {
            let registered = self.registered.lock().unwrap();
            let mut records = std::collections::HashMap::new();
            for identity in identities {
                if registered.contains(identity) {
                    records.insert(
                        identity.clone(),
                        KeyRecord { identity: identity.clone(), material: vec![1] },
                    );
                }
            }
            Ok(records)
        }

        async fn auth_encrypt(
            &self,
            text: &str,
            recipient: &KeyRecord,
        ) -> Result<String, ProviderError> {
            Ok(format!("enc[{}→{}]:{}", self.identity, recipient.identity, text))
        }

        async fn auth_decrypt(
            &self,
            text: &str,
            _sender: Option<&KeyRecord>,
        ) -> Result<String, ProviderError> {
            text.split_once(':')
                .map(|(_, rest)| rest.to_string())
                .ok_or_else(|| ProviderError::Crypto { reason: "bad envelope".to_string() })
        }
    }

    fn supplier(token: &str) -> Arc<dyn TokenSupplier> {
        Arc::new(StaticToken::new(Token::new(token)))
    }

    #[tokio::test]
    async fn starts_uninitialized() {
        let manager = SessionManager::new(MockProvider::default());
        assert_eq!(manager.state().await, SessionState::Uninitialized);
        assert!(manager.identity().await.is_none());
        assert!(matches!(manager.ready().await, Err(CoreError::SessionNotReady)));
    }

    #[tokio::test]
    async fn initialize_then_register_reaches_ready() {
        let manager = SessionManager::new(MockProvider::default());

        manager.initialize(Some(Identity::new("alice")), supplier("t1")).await.unwrap();
        assert_eq!(manager.state().await, SessionState::Initializing);
        assert!(matches!(manager.ready().await, Err(CoreError::SessionNotReady)));

        manager.register().await.unwrap();
        assert_eq!(manager.state().await, SessionState::Ready);
        assert_eq!(manager.ready().await.unwrap().identity(), &Identity::new("alice"));
    }

    #[tokio::test]
    async fn identity_derived_from_token_claim() {
        let manager = SessionManager::new(MockProvider::default());
        manager.initialize(None, supplier("secret@bob")).await.unwrap();
        assert_eq!(manager.identity().await, Some(Identity::new("bob")));
    }

    #[tokio::test]
    async fn claimless_token_is_bad_argument() {
        let manager = SessionManager::new(MockProvider::default());
        let result = manager.initialize(None, supplier("no-claim")).await;
        assert!(matches!(result, Err(CoreError::BadArgument { .. })));
    }

    #[tokio::test]
    async fn register_is_idempotent_sequentially() {
        let manager = SessionManager::new(MockProvider::default());
        manager.initialize(Some(Identity::new("alice")), supplier("t1")).await.unwrap();

        manager.register().await.unwrap();
        manager.register().await.unwrap();
        assert_eq!(manager.state().await, SessionState::Ready);
    }

    #[tokio::test]
    async fn register_is_idempotent_concurrently() {
        let manager = Arc::new(SessionManager::new(MockProvider::default()));
        manager.initialize(Some(Identity::new("alice")), supplier("t1")).await.unwrap();

        let (a, b) = tokio::join!(manager.register(), manager.register());
        a.unwrap();
        b.unwrap();
        assert_eq!(manager.state().await, SessionState::Ready);
    }

    #[tokio::test]
    async fn failed_registration_is_retryable() {
        let provider = MockProvider::default();
        let fail = Arc::clone(&provider.fail_register);
        let calls = Arc::clone(&provider.register_calls);
        let manager = SessionManager::new(provider);
        manager.initialize(Some(Identity::new("alice")), supplier("t1")).await.unwrap();

        fail.store(true, Ordering::SeqCst);
        let result = manager.register().await;
        assert!(matches!(result, Err(CoreError::RegistrationFailed { .. })));
        assert_eq!(manager.state().await, SessionState::Initializing);

        // No poison state: the same session registers fine once the
        // provider recovers.
        fail.store(false, Ordering::SeqCst);
        manager.register().await.unwrap();
        assert_eq!(manager.state().await, SessionState::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn registration_failure_carries_provider_detail() {
        let provider = MockProvider::default();
        provider.fail_register.store(true, Ordering::SeqCst);
        let manager = SessionManager::new(provider);
        manager.initialize(Some(Identity::new("alice")), supplier("t1")).await.unwrap();

        let err = manager.register().await.unwrap_err();
        assert!(err.to_string().contains("backend down"));
    }

    #[tokio::test]
    async fn initialize_replaces_session_wholesale() {
        let manager = SessionManager::new(MockProvider::default());
        manager.initialize(Some(Identity::new("alice")), supplier("t1")).await.unwrap();
        manager.register().await.unwrap();

        manager.initialize(Some(Identity::new("carol")), supplier("t2")).await.unwrap();
        assert_eq!(manager.identity().await, Some(Identity::new("carol")));
        // Replacement does not inherit the prior session's readiness.
        assert_eq!(manager.state().await, SessionState::Initializing);
    }

    #[tokio::test]
    async fn register_does_not_promote_a_replacement_session() {
        let manager = Arc::new(SessionManager::new(MockProvider::default()));
        manager.initialize(Some(Identity::new("alice")), supplier("t1")).await.unwrap();

        // Snapshot-based register against the alice session, completed
        // after a re-initialization swapped the slot to carol.
        let alice = manager.slot.read().await.as_ref().cloned().unwrap();
        manager.initialize(Some(Identity::new("carol")), supplier("t2")).await.unwrap();
        alice.handle().register().await.unwrap();

        assert_eq!(manager.state().await, SessionState::Initializing);
    }

    #[tokio::test]
    async fn in_flight_snapshot_survives_replacement() {
        let manager = SessionManager::new(MockProvider::default());
        manager.initialize(Some(Identity::new("alice")), supplier("t1")).await.unwrap();
        manager.register().await.unwrap();

        let snapshot = manager.ready().await.unwrap();
        manager.initialize(Some(Identity::new("carol")), supplier("t2")).await.unwrap();

        // The snapshot still answers for alice; no torn mix.
        assert_eq!(snapshot.identity(), &Identity::new("alice"));
        let recipient = KeyRecord { identity: Identity::new("bob"), material: vec![1] };
        let ciphertext = snapshot.handle().auth_encrypt("hi", &recipient).await.unwrap();
        assert!(ciphertext.contains("alice"));
    }
}
