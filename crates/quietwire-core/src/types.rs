//! Identity, key material, and token capability types.

use std::fmt;
use std::sync::Arc;

/// Stable opaque string naming a chat participant.
///
/// Identities are compared byte-for-byte; the core attaches no further
/// meaning to their contents. Cloning is cheap (shared allocation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(Arc<str>);

impl Identity {
    /// Create an identity from any string-like value.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Identity {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// Published key material for one identity, as resolved through the
/// directory.
///
/// The material is opaque to the core: it is produced by the crypto
/// provider on registration and consumed by the provider on encrypt and
/// verify. The core only routes it.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// The identity this record was published for.
    pub identity: Identity,
    /// Opaque published key material.
    pub material: Vec<u8>,
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("identity", &self.identity)
            .field("material", &format_args!("<{} bytes>", self.material.len()))
            .finish()
    }
}

/// Authentication token handed to the crypto provider.
///
/// # Security
///
/// The `Debug` impl redacts the token value to prevent accidental logging
/// of credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Wrap a raw token string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw token value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the token carries no content at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<redacted {} bytes>)", self.0.len())
    }
}

/// Single-method capability supplying the current authentication token.
///
/// The provider invokes this whenever it needs a fresh token (for example
/// on expiry), so implementations must be callable repeatedly for the
/// lifetime of the session without reconstructing it. Hosts that rotate
/// tokens implement this over their own refresh machinery; hosts with a
/// fixed token can use [`StaticToken`].
pub trait TokenSupplier: Send + Sync + 'static {
    /// Return the current token.
    fn token(&self) -> Token;
}

impl<F> TokenSupplier for F
where
    F: Fn() -> Token + Send + Sync + 'static,
{
    fn token(&self) -> Token {
        self()
    }
}

/// Token supplier that always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticToken(Token);

impl StaticToken {
    /// Create a supplier over a fixed token.
    pub fn new(token: Token) -> Self {
        Self(token)
    }
}

impl TokenSupplier for StaticToken {
    fn token(&self) -> Token {
        self.0.clone()
    }
}
