//! Quietwire core
//!
//! The session-owning core of the Quietwire end-to-end encryption layer.
//! It binds one participant identity to an external crypto provider,
//! makes directory registration idempotent, resolves recipient and sender
//! keys, and performs authenticated encrypt/decrypt of short text payloads.
//!
//! # Architecture
//!
//! ```text
//! quietwire-bridge (command surface)
//!   └─ MessageCipher        (encrypt / decrypt-own / decrypt-from-sender)
//!        ├─ Directory       (identity → published key material)
//!        └─ SessionManager  (bound identity, registration state)
//!             └─ CryptoProvider (external capability, not implemented here)
//! ```
//!
//! The core never touches the network itself: every remote effect goes
//! through the [`CryptoProvider`] capability, which callers supply. The
//! crate therefore has no runtime dependency beyond `tokio::sync`.
//!
//! # Components
//!
//! - [`SessionManager`]: owns the single bound session; registration is
//!   idempotent at this boundary
//! - [`Directory`]: all-or-nothing batch key lookup
//! - [`MessageCipher`]: authenticated encryption against the bound session
//! - [`CoreError`]: the complete failure taxonomy with stable wire codes

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cipher;
mod directory;
mod error;
pub mod provider;
mod session;
mod types;

pub use cipher::MessageCipher;
pub use directory::{Directory, DirectoryError};
pub use error::CoreError;
pub use provider::{CryptoProvider, ProviderError, ProviderSession};
pub use session::{Session, SessionManager, SessionState};
pub use types::{Identity, KeyRecord, StaticToken, Token, TokenSupplier};
