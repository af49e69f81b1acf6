//! Quietwire command bridge
//!
//! Dispatches named commands from a UI layer to the core and delivers
//! exactly one response per command through a single-use responder.
//!
//! # Command surface
//!
//! | name            | arguments              | success value      |
//! |-----------------|------------------------|--------------------|
//! | `initSession`   | `token`, opt. `user`   | boolean            |
//! | `encrypt`       | `otherUser`, `text`    | ciphertext string  |
//! | `decryptMine`   | `text`                 | plaintext string   |
//! | `decryptTheirs` | `text`, `otherUser`    | plaintext string   |
//!
//! # Scheduling contract
//!
//! Handlers that may block on the crypto provider run on the tokio worker
//! pool; the reply travels back over a oneshot channel, so the caller
//! resumes on its own execution context. Provider-bound commands carry a
//! bounded deadline: a hung provider yields `PROVIDER_TIMEOUT`, never a
//! permanently uninvoked responder.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bridge;
mod command;

pub use bridge::{BridgeConfig, CommandBridge};
pub use command::{CommandArgs, CommandFailure, CommandReply, CommandRequest, Responder, ReplyValue};
